//! Command-line interface definitions for Weekly Brief.
//!
//! Flags override the matching settings from the YAML configuration file.
//! A few can also be supplied through environment variables.

use clap::Parser;

use crate::models::SourceKind;

/// Collect, rank and summarize a week of news for a set of topics.
///
/// # Examples
///
/// ```sh
/// # Defaults: built-in sources, reports under ./reports
/// weekly_brief -o ./reports
///
/// # Custom topics, API sources only, no generation service
/// weekly_brief -o ./reports --topic OpenAI --topic "generative AI" --kind api --no-llm
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Output directory for JSON reports
    #[arg(short, long, env = "WEEKLY_BRIEF_OUTPUT_DIR")]
    pub output_dir: String,

    /// Optional path to a YAML configuration file
    #[arg(short, long, env = "WEEKLY_BRIEF_CONFIG")]
    pub config: Option<String>,

    /// Topic to score items against (repeatable; replaces configured topics)
    #[arg(short, long = "topic")]
    pub topics: Vec<String>,

    /// Lookback window in days
    #[arg(short, long)]
    pub days: Option<i64>,

    /// Number of items to keep and summarize
    #[arg(long)]
    pub top_n: Option<usize>,

    /// Only collect sources of this kind (repeatable)
    #[arg(short, long = "kind", value_enum)]
    pub kinds: Vec<SourceKind>,

    /// Base URL of the Ollama server
    #[arg(long, env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Generation model name
    #[arg(long)]
    pub model: Option<String>,

    /// Skip the generation service and use fallback summaries
    #[arg(long)]
    pub no_llm: bool,
}
