//! Herakles Process Memory Aggregation Library
//!
//! Sums one memory metric over every process sharing a short executable name,
//! optionally restricted to processes owned by one user. Reads the text
//! process table of Linux (`/proc/<pid>/stat` + `maps`) or the binary one of
//! Solaris (`/proc/<pid>/psinfo` + `map`).
//!
//! # Metrics
//!
//! - **vmrss**: Resident set size
//! - **allmap**: Every mapped region
//! - **rwmap**: Readable and writable regions
//! - **shmap**: Shared regions
//!
//! # Usage
//!
//! ```rust,no_run
//! use herakles_procinf::{aggregate, Metric};
//!
//! let rss = aggregate("java", Some("tomcat"), Metric::ResidentMemory);
//! println!("java (tomcat) resident: {} bytes", rss);
//! ```
//!
//! A result of `0` is ambiguous by contract. Use
//! [`Aggregator::aggregate_with_stats`] to tell "no such process" from an
//! unknown user or an unreadable process table.

pub mod aggregate;
pub mod error;
pub mod fixture;
pub mod item;
pub mod process;

// Re-export main types for convenience
pub use aggregate::{aggregate, Aggregation, AggregationRequest, Aggregator, Metric, ScanStats};
pub use error::{ItemError, RequestError};
pub use item::{find_item, ItemDef, ItemRequest, ITEMS};
