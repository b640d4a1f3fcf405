//! Item commands.
//!
//! Evaluates agent item keys and lists the supported ones.

use anyhow::Result;
use herakles_procinf::{ItemRequest, ITEMS};
use tracing::debug;

use crate::config::Config;

/// Evaluates one item key and prints its value.
///
/// Item errors are printed on stdout like a value would be, and the process
/// exits with status 1.
pub fn command_item(key: &str, config: &Config) -> Result<()> {
    let aggregator = config.aggregator()?;
    let value = ItemRequest::parse(key).and_then(|req| {
        debug!("Evaluating item {} with {:?}", req.key, req.params);
        req.evaluate(&aggregator)
    });

    match value {
        Ok(v) => {
            println!("{}", v);
            Ok(())
        }
        Err(e) => {
            println!("{}", e);
            std::process::exit(1);
        }
    }
}

/// Lists supported item keys with their test parameters.
pub fn command_items() -> Result<()> {
    println!("📋 Supported item keys");
    println!("======================");
    for item in ITEMS {
        println!("\n{}[{}]", item.key, item.test_params);
        println!("   ├─ Metric: {}", item.metric);
        println!("   └─ {}", item.description);
    }
    println!("\nParameters: <process name>[,<user name>]");
    Ok(())
}
