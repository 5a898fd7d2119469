//! File tools bounded by the path guard.
//!
//! - `jsonl.rs`: handle-based paging over JSONL inputs
//! - `ops.rs`: read, write, list, search and count

pub mod jsonl;
pub mod ops;

pub use jsonl::{raw_message, JsonlFiles};
pub use ops::{line_count, list_directory_contents, read_file_content, search_files, write_file_content, write_json};
