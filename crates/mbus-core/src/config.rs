use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::resender::ResenderOptions;
use crate::session::SessionOptions;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Whether transient errors are retried at all.
    pub enabled: bool,
    /// Base delay in seconds for linear backoff (retry n waits n * base).
    pub base_delay_secs: f64,
    /// Optional hard cap on resends per message. Unset = bounded only by the send timeout.
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_delay_secs: 1.0,
            max_retries: None,
        }
    }
}

/// Global configuration loaded from `~/.config/mbus/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MbusConfig {
    /// End-to-end timeout for a send, in seconds, including all resends.
    pub send_timeout_secs: f64,
    /// Maximum number of messages waiting for resend (None = unbounded).
    #[serde(default)]
    pub max_queued: Option<usize>,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for MbusConfig {
    fn default() -> Self {
        Self {
            send_timeout_secs: 600.0,
            max_queued: None,
            retry: None,
        }
    }
}

impl MbusConfig {
    /// Retry section, falling back to defaults.
    pub fn retry_or_default(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.send_timeout_secs).unwrap_or(Duration::ZERO)
    }

    pub fn resender_options(&self) -> ResenderOptions {
        ResenderOptions {
            max_retries: self.retry_or_default().max_retries,
            max_queued: self.max_queued,
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            timeout: self.send_timeout(),
            resender: self.resender_options(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mbus")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<MbusConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = MbusConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    load_from_path(&path)
}

/// Load configuration from an explicit path (must exist).
pub fn load_from_path(path: &Path) -> Result<MbusConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: MbusConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_values() {
        let cfg = MbusConfig::default();
        assert_eq!(cfg.send_timeout_secs, 600.0);
        assert!(cfg.max_queued.is_none());
        assert!(cfg.retry.is_none());
        let retry = cfg.retry_or_default();
        assert!(retry.enabled);
        assert_eq!(retry.base_delay_secs, 1.0);
        assert!(retry.max_retries.is_none());
    }

    #[test]
    fn config_toml_roundtrip() {
        let mut cfg = MbusConfig::default();
        cfg.retry = Some(RetryConfig {
            enabled: false,
            base_delay_secs: 0.01,
            max_retries: Some(3),
        });
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: MbusConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.send_timeout_secs, cfg.send_timeout_secs);
        assert_eq!(parsed.retry, cfg.retry);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            send_timeout_secs = 30.5
            max_queued = 128

            [retry]
            enabled = true
            base_delay_secs = 0.5
        "#;
        let cfg: MbusConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.max_queued, Some(128));
        assert_eq!(cfg.send_timeout(), Duration::from_millis(30_500));
        let retry = cfg.retry.as_ref().unwrap();
        assert!((retry.base_delay_secs - 0.5).abs() < 1e-9);
        assert!(retry.max_retries.is_none());

        let opts = cfg.session_options();
        assert_eq!(opts.timeout, Duration::from_millis(30_500));
        assert_eq!(opts.resender.max_queued, Some(128));
        assert_eq!(opts.resender.max_retries, None);
    }

    #[test]
    fn negative_timeout_maps_to_zero() {
        let cfg = MbusConfig {
            send_timeout_secs: -1.0,
            ..MbusConfig::default()
        };
        assert_eq!(cfg.send_timeout(), Duration::ZERO);
    }

    #[test]
    fn load_from_path_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "send_timeout_secs = 5.0").unwrap();
        writeln!(file, "[retry]").unwrap();
        writeln!(file, "enabled = false").unwrap();
        writeln!(file, "base_delay_secs = 0.0").unwrap();
        writeln!(file, "max_retries = 2").unwrap();
        let cfg = load_from_path(file.path()).unwrap();
        assert_eq!(cfg.send_timeout_secs, 5.0);
        assert_eq!(cfg.resender_options().max_retries, Some(2));
        assert!(!cfg.retry_or_default().enabled);
    }

    #[test]
    fn load_from_path_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "send_timeout_secs = \"soon\"").unwrap();
        let err = load_from_path(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("parse config"));
    }
}
