//! Query command implementation.
//!
//! Prints the aggregated total in bytes on stdout.

use anyhow::Result;
use herakles_procinf::{AggregationRequest, Metric};
use tracing::info;

use crate::config::Config;

/// Aggregates `metric` for `name` and prints the total.
pub fn command_query(
    name: String,
    user: Option<String>,
    metric: Metric,
    stats: bool,
    config: &Config,
) -> Result<()> {
    let request = AggregationRequest::new(name, config.effective_user(user), metric)?;
    let aggregator = config.aggregator()?;

    let result = aggregator.aggregate_with_stats(&request);
    info!(
        "{} of '{}' over {} processes: {} bytes",
        metric,
        request.process_name(),
        result.stats.processes_matched,
        result.total
    );

    println!("{}", result.total);
    if stats {
        println!("{}", serde_json::to_string_pretty(&result.stats)?);
    }
    Ok(())
}
