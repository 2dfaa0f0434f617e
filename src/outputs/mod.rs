//! Report output.
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! └── 2025-06-20/
//!     ├── brief_090000.json
//!     └── brief_180000.json
//! ```

pub mod json;
