//! herakles-procinf - version 0.1.0
//!
//! Aggregated per-name process memory with tracing logging.
//! This is the main entry point that resolves configuration and dispatches subcommands.

mod cli;
mod commands;
mod config;
mod startup_checks;

use anyhow::Result;
use clap::{CommandFactory, Parser, ValueEnum};
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;

use cli::{Args, Commands, LogLevel};
use commands::{
    command_check, command_config, command_generate_fixture, command_item, command_items,
    command_query, command_test,
};
use config::{resolve_config, show_config, validate_effective_config, Config, DEFAULT_LOG_LEVEL};

/// Effective log level: CLI > config file > default.
fn resolve_log_level(config: &Config, args: &Args) -> LogLevel {
    args.log_level
        .or_else(|| {
            config
                .log_level
                .as_deref()
                .and_then(|s| LogLevel::from_str(s, true).ok())
        })
        .or_else(|| LogLevel::from_str(DEFAULT_LOG_LEVEL, true).ok())
        .unwrap_or(LogLevel::Warn)
}

/// Initializes tracing logging subsystem with configured log level.
///
/// Logs go to stderr so stdout carries only command output.
fn setup_logging(config: &Config, args: &Args) {
    let log_level = resolve_log_level(config, args);
    let filter = match log_level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    debug!("Logging initialized with level: {:?}", log_level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Main application entry point.
fn main() -> Result<()> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format);
    }

    let command = match &args.command {
        Some(c) => c,
        None => {
            Args::command().print_help()?;
            println!();
            return Ok(());
        }
    };

    // Writing a default config must work even when the current one is broken
    if let Commands::Config {
        output,
        format,
        commented,
    } = command
    {
        return command_config(output.clone(), *format, *commented);
    }

    let config = load_validated_config(&args)?;
    setup_logging(&config, &args);

    match command {
        Commands::Query {
            name,
            user,
            metric,
            stats,
        } => command_query(name.clone(), user.clone(), (*metric).into(), *stats, &config),

        Commands::Item { key } => command_item(key, &config),

        Commands::Items => command_items(),

        Commands::Check { memory, proc, all } => command_check(*memory, *proc, *all, &config),

        Commands::Test {
            name,
            user,
            iterations,
            verbose,
            expect,
        } => command_test(
            name.clone(),
            user.clone(),
            *iterations,
            *verbose,
            expect.clone(),
            &config,
        ),

        Commands::GenerateFixture {
            output,
            processes,
            name,
            seed,
            binary,
        } => command_generate_fixture(
            output.clone(),
            *processes,
            name.clone(),
            *seed,
            *binary,
            &config,
        ),

        Commands::Config { .. } => unreachable!("Config handled above"),
    }
}
