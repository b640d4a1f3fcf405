//! Test command implementation.
//!
//! Runs every metric for one process name and displays timings and totals.

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Instant;

use herakles_procinf::fixture::Expected;
use herakles_procinf::{Aggregation, AggregationRequest, Metric};

use crate::config::Config;

/// Runs all metrics `iterations` times, optionally checking the last run
/// against a fixture manifest.
pub fn command_test(
    name: Option<String>,
    user: Option<String>,
    iterations: usize,
    verbose: bool,
    expect: Option<PathBuf>,
    config: &Config,
) -> Result<()> {
    println!("🧪 Herakles Process Memory Aggregator - Test Mode");
    println!("=================================================");

    let expected = match &expect {
        Some(path) => Some(Expected::load(path)?),
        None => None,
    };
    let name = match (name, &expected) {
        (Some(n), _) => n,
        (None, Some(e)) => e.name.clone(),
        (None, None) => bail!("A process name is required (--name or --expect)"),
    };
    let user = config.effective_user(user);
    let aggregator = config.aggregator()?;

    println!(
        "   🎯 Target: '{}'{}",
        name,
        user.as_deref()
            .map(|u| format!(" owned by '{}'", u))
            .unwrap_or_default()
    );
    println!(
        "   📁 Table: {} ({})",
        config.proc_root().display(),
        aggregator.backend().name()
    );

    let mut last: Vec<(Metric, Aggregation)> = Vec::new();
    for iteration in 1..=iterations.max(1) {
        println!("\n🔄 Iteration {}/{}:", iteration, iterations.max(1));
        last.clear();

        for metric in Metric::ALL {
            let request = AggregationRequest::new(name.as_str(), user.clone(), metric)?;
            let start = Instant::now();
            let result = aggregator.aggregate_with_stats(&request);
            let duration = start.elapsed();

            println!(
                "   ├─ {:<6} {:>16} bytes  ({} processes, {:.2}ms)",
                metric.as_str(),
                result.total,
                result.stats.processes_matched,
                duration.as_secs_f64() * 1000.0
            );
            if verbose {
                let s = &result.stats;
                println!(
                    "   │  ├─ Entries: {} seen, {} rejected, {} unreadable, {} other names",
                    s.entries_seen, s.entries_rejected, s.records_unreadable, s.name_mismatches
                );
                if metric.is_mapping() {
                    println!(
                        "   │  └─ Regions: {} counted, {} ignored, {} skipped, {} interrupted",
                        s.regions_counted,
                        s.regions_ignored,
                        s.regions_skipped,
                        s.streams_interrupted
                    );
                }
                if s.linked_matches > 0 {
                    println!(
                        "   │  ⚠️  {} match(es) via symlinked entries, counted again",
                        s.linked_matches
                    );
                }
                if s.unknown_user {
                    println!("   │  ⚠️  Unknown user");
                }
                if s.table_unavailable {
                    println!("   │  ⚠️  Process table unavailable");
                }
            }
            last.push((metric, result));
        }
    }

    if let Some(expected) = expected {
        println!("\n📋 Expected totals ({}):", expected.generated_at);
        if config.page_size.is_some_and(|p| p != expected.page_size) {
            println!(
                "   ⚠️  Manifest assumes page size {}, configured {:?}",
                expected.page_size, config.page_size
            );
        }
        let mut mismatches = 0;
        for (metric, result) in &last {
            let want = expected.totals.get(*metric);
            if want == result.total {
                println!("   ✅ {:<6} {}", metric.as_str(), want);
            } else {
                println!(
                    "   ❌ {:<6} expected {}, got {}",
                    metric.as_str(),
                    want,
                    result.total
                );
                mismatches += 1;
            }
        }
        if mismatches > 0 {
            println!("\n❌ {} metric(s) differ from the manifest", mismatches);
            std::process::exit(1);
        }
    }

    println!("\n✅ Test completed successfully");
    Ok(())
}
