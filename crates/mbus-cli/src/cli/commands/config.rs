//! `mbus config` – print the effective configuration.

use anyhow::Result;
use mbus_core::config::MbusConfig;
use std::path::Path;

pub fn run_config(cfg: &MbusConfig, path: &Path) -> Result<()> {
    println!("# {}", path.display());
    print!("{}", render(cfg)?);
    Ok(())
}

/// TOML of the config with the retry section filled in with defaults.
fn render(cfg: &MbusConfig) -> Result<String> {
    let mut effective = cfg.clone();
    effective.retry = Some(cfg.retry_or_default());
    Ok(toml::to_string_pretty(&effective)?)
}
