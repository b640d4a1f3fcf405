//! CLI arguments and subcommands for herakles-procinf.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use herakles_procinf::Metric;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Metric selection on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MetricArg {
    /// Resident set size
    #[value(alias = "vmrss")]
    Rss,
    /// All mapped regions
    #[value(alias = "map")]
    Allmap,
    /// Readable and writable regions
    #[value(alias = "rw")]
    Rwmap,
    /// Shared regions
    #[value(alias = "shared")]
    Shmap,
}

impl From<MetricArg> for Metric {
    fn from(m: MetricArg) -> Self {
        match m {
            MetricArg::Rss => Metric::ResidentMemory,
            MetricArg::Allmap => Metric::AllMappings,
            MetricArg::Rwmap => Metric::ReadWriteMappings,
            MetricArg::Shmap => Metric::SharedMappings,
        }
    }
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-procinf",
    about = "Aggregated memory usage of all processes sharing a name",
    long_about = "Aggregated memory usage of all processes sharing a name.\n\n\
                  Sums resident memory or mapped region sizes (all, shared, read-write) over \
                  every process with the given short executable name, optionally restricted \
                  to one owning user. Reads the Linux or Solaris /proc process table.",
    author = "Michael Moll <exporter@herakles.now> - Herakles",
    version = "0.1.0",
    propagate_version = true,
    after_help = "More info: https://www.herakles.now — Support: exporter@herakles.now"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log level (logs go to stderr)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Process table root (default: /proc)
    #[arg(long)]
    pub proc_root: Option<PathBuf>,

    /// Process table format: auto, linux or solaris
    #[arg(long)]
    pub platform: Option<String>,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Aggregate one metric and print the total in bytes
    Query {
        /// Short executable name to match
        #[arg(short = 'n', long)]
        name: String,

        /// Only count processes owned by this user
        #[arg(short = 'u', long)]
        user: Option<String>,

        /// Metric to aggregate
        #[arg(short = 'm', long, value_enum, default_value = "rss")]
        metric: MetricArg,

        /// Also print scan statistics as JSON
        #[arg(long)]
        stats: bool,
    },

    /// Evaluate an agent item key, e.g. procinf.vmrss[java,tomcat]
    Item {
        /// Item key with parameters
        key: String,
    },

    /// List supported agent item keys
    Items,

    /// Validate configuration and system requirements
    Check {
        /// Check memory accessibility
        #[arg(long)]
        memory: bool,

        /// Check process table access
        #[arg(long)]
        proc: bool,

        /// Check all system requirements
        #[arg(long)]
        all: bool,
    },

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Run every metric for a process name and report timings
    Test {
        /// Short executable name to match (default: the name in --expect)
        #[arg(short = 'n', long)]
        name: Option<String>,

        /// Only count processes owned by this user
        #[arg(short = 'u', long)]
        user: Option<String>,

        /// Number of test iterations
        #[arg(short = 'i', long, default_value_t = 1)]
        iterations: usize,

        /// Show scan statistics per metric
        #[arg(long)]
        verbose: bool,

        /// Compare totals against an expected.json manifest
        #[arg(long)]
        expect: Option<PathBuf>,
    },

    /// Generate a synthetic process table with expected totals
    GenerateFixture {
        /// Output directory
        #[arg(short = 'o', long)]
        output: PathBuf,

        /// Number of processes carrying the target name
        #[arg(long, default_value_t = 8)]
        processes: usize,

        /// Target process name
        #[arg(long, default_value = "java")]
        name: String,

        /// Random seed for reproducible tables
        #[arg(long)]
        seed: Option<u64>,

        /// Write the Solaris binary format instead of Linux text
        #[arg(long)]
        binary: bool,
    },
}
