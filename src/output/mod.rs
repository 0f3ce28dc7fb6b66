//! Output module for reporting on the novel database
//!
//! This module handles:
//! - Loading repository statistics
//! - Printing them for the `--stats` mode

pub mod stats;

pub use stats::{load_statistics, print_statistics, NovelStatistics};
