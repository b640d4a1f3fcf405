//! Check command implementation.
//!
//! Validates system requirements and configuration.

use anyhow::Result;

use crate::config::{validate_effective_config, Config};
use crate::startup_checks::{check_process_decodes, check_proc_access, check_user_privileges};

/// Validates system requirements and configuration.
pub fn command_check(memory: bool, proc: bool, all: bool, config: &Config) -> Result<()> {
    println!("🔍 Herakles Process Memory Aggregator - System Check");
    println!("====================================================");
    if let Some(built) = option_env!("VERGEN_BUILD_TIMESTAMP") {
        println!("   Build: {}", built);
    }

    let mut all_ok = true;

    // Check configuration first, the other checks depend on it
    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => {
            println!("   ✅ Configuration is valid");
        }
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            println!("\n📋 Summary:");
            println!("   ❌ Some checks failed - please review warnings");
            std::process::exit(1);
        }
    }

    let aggregator = config.aggregator()?;
    println!(
        "   ✅ Backend: {} ({})",
        aggregator.backend().name(),
        config.proc_root().display()
    );

    if proc || all {
        println!("\n📁 Checking process table...");
        match check_proc_access(&aggregator) {
            Ok(n) => println!("   ✅ Can read {} process entries", n),
            Err(e) => {
                println!("   ❌ {}", e);
                all_ok = false;
            }
        }
        if check_user_privileges() {
            println!("   ✅ Running as root");
        } else {
            println!("   ⚠️  Not running as root - user-filtered totals may be incomplete");
        }
    }

    if memory || all {
        println!("\n💾 Checking memory metrics accessibility...");
        let own = std::process::id().to_string();
        match check_process_decodes(&aggregator, &own) {
            Ok(scan) => {
                println!(
                    "   ✅ Record decoded: {} (PID: {}), resident {} KB",
                    scan.record.name,
                    scan.record.pid,
                    scan.resident_bytes / 1024
                );
                println!(
                    "   ✅ {} regions mapped, {} KB total",
                    scan.regions,
                    scan.mapped_bytes / 1024
                );
                if scan.skipped > 0 {
                    println!("   ⚠️  {} malformed regions skipped", scan.skipped);
                }
            }
            Err(e) => {
                println!("   ❌ {}", e);
                all_ok = false;
            }
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - system is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}
