//! CLI command implementations for herakles-procinf.
//!
//! This module provides implementations for all CLI subcommands:
//! - `query`: Aggregate one metric for a process name
//! - `item` / `items`: Agent item key evaluation and listing
//! - `check`: System validation
//! - `config`: Configuration file generation
//! - `test`: Timed runs of every metric, optionally against expected totals
//! - `generate`: Synthetic process table generation

pub mod check;
pub mod config;
pub mod generate;
pub mod item;
pub mod query;
pub mod test;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use generate::command_generate_fixture;
pub use item::{command_item, command_items};
pub use query::command_query;
pub use test::command_test;
