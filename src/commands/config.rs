//! Config command implementation.
//!
//! Generates configuration files in various formats.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(output: Option<PathBuf>, format: ConfigFormat, commented: bool) -> Result<()> {
    let config = Config::default();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from("herakles-procinf.yaml"),
    };

    let mut content = render_config(&config, format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Herakles Process Memory Aggregator Configuration
# ==================================================
#
# Process Table
# -------------
# proc_root: "/proc"           # Root of the process table (fixtures work too)
# platform: "auto"             # auto, linux (stat + maps) or solaris (psinfo + map)
# page_size: null              # Bytes per page for resident sizes (null = system)
# hex_alphabet: "legacy"       # legacy accepts a-h in addresses, strict only a-f
#
# Performance Tuning
# ------------------
# read_buffer_kb: 16           # Read buffer per opened process file (1-1024)
#
# Queries
# -------
# default_user: null           # Owner filter applied when a query names none
#
# Logging
# -------
# log_level: "warn"            # off, error, warn, info, debug, trace (stderr)
"#;

    format!("{comments}\n{yaml}")
}
