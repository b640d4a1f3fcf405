//! Configuration management for herakles-procinf.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat};
use anyhow::{anyhow, bail, Context, Result};
use herakles_procinf::process::{
    backend_for, BackendOptions, FsProcessTable, HexAlphabet, Platform, SystemUsers,
    DEFAULT_PROC_ROOT,
};
use herakles_procinf::Aggregator;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// Default configuration constants
pub const DEFAULT_READ_BUFFER_KB: usize = 16;
pub const MAX_READ_BUFFER_KB: usize = 1024;
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Config file locations tried when no `-c` is given.
pub const DEFAULT_CONFIG_PATHS: [&str; 6] = [
    "/etc/herakles/procinf.yaml",
    "/etc/herakles/procinf.yml",
    "/etc/herakles/procinf.json",
    "./herakles-procinf.yaml",
    "./herakles-procinf.yml",
    "./herakles-procinf.json",
];

/// Configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Process table
    #[serde(alias = "proc-root")]
    pub proc_root: Option<PathBuf>,
    /// "auto" | "linux" | "solaris"
    pub platform: Option<String>,
    /// Bytes per page for resident sizes; null = system page size
    #[serde(alias = "page-size")]
    pub page_size: Option<u64>,
    /// "legacy" (0-9, a-h) | "strict" (0-9, a-f)
    #[serde(alias = "hex-alphabet")]
    pub hex_alphabet: Option<String>,

    // Performance tuning
    #[serde(alias = "read-buffer-kb")]
    pub read_buffer_kb: Option<usize>,

    // Queries
    /// User applied when a query names none
    #[serde(alias = "default-user")]
    pub default_user: Option<String>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proc_root: Some(PathBuf::from(DEFAULT_PROC_ROOT)),
            platform: Some("auto".into()),
            page_size: None,
            hex_alphabet: Some(HexAlphabet::default().to_string()),
            read_buffer_kb: Some(DEFAULT_READ_BUFFER_KB),
            default_user: None,
            log_level: Some(DEFAULT_LOG_LEVEL.into()),
        }
    }
}

impl Config {
    pub fn proc_root(&self) -> PathBuf {
        self.proc_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROC_ROOT))
    }

    pub fn platform(&self) -> Result<Platform> {
        Platform::from_config(self.platform.as_deref()).map_err(|e| anyhow!(e))
    }

    pub fn hex_alphabet(&self) -> Result<HexAlphabet> {
        match self.hex_alphabet.as_deref() {
            Some(s) => s.parse().map_err(|e: String| anyhow!(e)),
            None => Ok(HexAlphabet::default()),
        }
    }

    pub fn backend_options(&self) -> Result<BackendOptions> {
        let buffer_kb = self.read_buffer_kb.unwrap_or(DEFAULT_READ_BUFFER_KB);
        let buffer_bytes = buffer_kb
            .checked_mul(1024)
            .ok_or_else(|| anyhow!("read_buffer_kb {} is too large", buffer_kb))?;
        Ok(BackendOptions {
            page_size: self.page_size,
            hex_alphabet: self.hex_alphabet()?,
            buffer_bytes,
        })
    }

    /// User to filter by: the explicit one, else `default_user`.
    pub fn effective_user(&self, user: Option<String>) -> Option<String> {
        user.or_else(|| self.default_user.clone())
    }

    /// Builds an engine over the configured process table.
    pub fn aggregator(&self) -> Result<Aggregator> {
        let platform = self.platform()?;
        let opts = self.backend_options()?;
        let root = self.proc_root();
        debug!(
            "Using {} process table at {} (buffer {} bytes)",
            platform,
            root.display(),
            opts.buffer_bytes
        );
        Ok(Aggregator::new(
            Box::new(FsProcessTable::new(root)),
            Box::new(SystemUsers),
            backend_for(platform, &opts),
        ))
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<()> {
    cfg.platform()?;
    cfg.hex_alphabet()?;

    if let Some(page_size) = cfg.page_size {
        if page_size == 0 || !page_size.is_power_of_two() {
            bail!(
                "Invalid page_size {}, expected a non-zero power of two",
                page_size
            );
        }
    }

    if let Some(kb) = cfg.read_buffer_kb {
        if !(1..=MAX_READ_BUFFER_KB).contains(&kb) {
            bail!(
                "Invalid read_buffer_kb {}, expected 1..={}",
                kb,
                MAX_READ_BUFFER_KB
            );
        }
    }

    if let Some(level) = cfg.log_level.as_deref() {
        match level {
            "off" | "error" | "warn" | "info" | "debug" | "trace" => {}
            other => bail!(
                "Invalid log_level '{}', expected off, error, warn, info, debug or trace",
                other
            ),
        }
    }

    if let Some(root) = &cfg.proc_root {
        if root.as_os_str().is_empty() {
            bail!("proc_root must not be empty");
        }
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    // Override with CLI args
    if let Some(root) = &args.proc_root {
        config.proc_root = Some(root.clone());
    }
    if let Some(platform) = &args.platform {
        config.platform = Some(platform.clone());
    }

    Ok(config)
}

/// Configuration loading with multiple format support
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                bail!("Config file not found: {}", p.display());
            }
            p.to_path_buf()
        }
        None => match DEFAULT_CONFIG_PATHS.iter().find(|p| Path::new(p).exists()) {
            Some(p) => PathBuf::from(p),
            None => return Ok(Config::default()),
        },
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    // Missing keys fall back to defaults
    let defaults = Config::default();
    let mut config: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?,
        Some("toml") => toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in {}", path.display()))?,
        _ => serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid YAML in {}", path.display()))?,
    };
    config.proc_root = config.proc_root.or(defaults.proc_root);
    config.platform = config.platform.or(defaults.platform);
    config.hex_alphabet = config.hex_alphabet.or(defaults.hex_alphabet);
    config.read_buffer_kb = config.read_buffer_kb.or(defaults.read_buffer_kb);
    config.log_level = config.log_level.or(defaults.log_level);

    info!("Loaded configuration from: {}", path.display());
    Ok(config)
}

/// Renders a config in the requested format.
pub fn render_config(config: &Config, format: ConfigFormat) -> Result<String> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<()> {
    println!("{}", render_config(config, format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    // -------------------------------------------------------------------------
    // Tests for validate_effective_config
    // -------------------------------------------------------------------------

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_effective_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            Config {
                platform: Some("windows".into()),
                ..Config::default()
            },
            Config {
                hex_alphabet: Some("upper".into()),
                ..Config::default()
            },
            Config {
                page_size: Some(0),
                ..Config::default()
            },
            Config {
                page_size: Some(3000),
                ..Config::default()
            },
            Config {
                read_buffer_kb: Some(0),
                ..Config::default()
            },
            Config {
                log_level: Some("loud".into()),
                ..Config::default()
            },
        ];
        for cfg in &bad {
            assert!(validate_effective_config(cfg).is_err(), "{:?}", cfg);
        }

        let ok = Config {
            page_size: Some(8192),
            platform: Some("solaris".into()),
            hex_alphabet: Some("strict".into()),
            ..Config::default()
        };
        assert!(validate_effective_config(&ok).is_ok());
    }

    #[test]
    fn test_validate_read_buffer_bounds() {
        let with_kb = |kb| Config {
            read_buffer_kb: Some(kb),
            ..Config::default()
        };
        assert!(validate_effective_config(&with_kb(1)).is_ok());
        assert!(validate_effective_config(&with_kb(MAX_READ_BUFFER_KB)).is_ok());
        assert!(validate_effective_config(&with_kb(MAX_READ_BUFFER_KB + 1)).is_err());
        assert!(validate_effective_config(&with_kb(1_000_000_000)).is_err());
        assert!(validate_effective_config(&with_kb(usize::MAX)).is_err());

        // Unvalidated values must not overflow when building the backend
        assert!(with_kb(usize::MAX).backend_options().is_err());
        assert_eq!(with_kb(64).backend_options().unwrap().buffer_bytes, 64 * 1024);
    }

    // -------------------------------------------------------------------------
    // Tests for load_config
    // -------------------------------------------------------------------------

    #[test]
    fn test_load_yaml_fills_defaults() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("procinf.yaml");
        fs::write(&path, "proc_root: /tmp/fixture\npage-size: 8192\n").unwrap();

        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.proc_root, Some(PathBuf::from("/tmp/fixture")));
        assert_eq!(cfg.page_size, Some(8192));
        assert_eq!(cfg.read_buffer_kb, Some(DEFAULT_READ_BUFFER_KB));
        assert_eq!(cfg.hex_alphabet.as_deref(), Some("legacy"));
    }

    #[test]
    fn test_load_json_and_toml() {
        let dir = tempdir().expect("Failed to create temp dir");
        let json = dir.path().join("procinf.json");
        fs::write(&json, r#"{"platform": "solaris", "default_user": "oracle"}"#).unwrap();
        let cfg = load_config(Some(&json)).unwrap();
        assert_eq!(cfg.platform.as_deref(), Some("solaris"));
        assert_eq!(cfg.effective_user(None).as_deref(), Some("oracle"));
        assert_eq!(cfg.effective_user(Some("root".into())).as_deref(), Some("root"));

        let toml_path = dir.path().join("procinf.toml");
        fs::write(&toml_path, "read_buffer_kb = 64\n").unwrap();
        let cfg = load_config(Some(&toml_path)).unwrap();
        assert_eq!(cfg.backend_options().unwrap().buffer_bytes, 64 * 1024);
    }

    #[test]
    fn test_load_missing_or_invalid_file() {
        let dir = tempdir().expect("Failed to create temp dir");
        assert!(load_config(Some(&dir.path().join("absent.yaml"))).is_err());

        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("Invalid JSON"));
    }

    #[test]
    fn test_render_config_formats() {
        let cfg = Config::default();
        for format in [ConfigFormat::Yaml, ConfigFormat::Json, ConfigFormat::Toml] {
            let out = render_config(&cfg, format).unwrap();
            assert!(out.contains("proc_root"));
        }
    }
}
