//! CLI for the mbus message resender.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mbus_core::config::{self, MbusConfig};
use std::path::PathBuf;

use commands::{run_config, run_simulate, SimulateOptions};

/// Top-level CLI for the mbus message resender.
#[derive(Debug, Parser)]
#[command(name = "mbus")]
#[command(about = "mbus: retrying message resender for an asynchronous RPC bus", long_about = None)]
pub struct Cli {
    /// Config file to use instead of ~/.config/mbus/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Send one message to a loopback destination that fails N times before answering.
    Simulate {
        /// Number of transient errors the destination returns before its final answer.
        #[arg(long, default_value = "5", value_name = "N")]
        transient: u32,
        /// Final answer is a fatal error instead of an ack.
        #[arg(long)]
        fatal: bool,
        /// Disable retries on the message itself.
        #[arg(long)]
        no_retry: bool,
        /// Disable the retry policy.
        #[arg(long)]
        disable_policy: bool,
        /// Override the policy base delay (seconds).
        #[arg(long, value_name = "SECS")]
        base_delay: Option<f64>,
        /// Retry delay the destination puts on each transient reply (seconds).
        #[arg(long, value_name = "SECS")]
        reply_delay: Option<f64>,
        /// Override the send timeout (seconds).
        #[arg(long, value_name = "SECS")]
        timeout: Option<f64>,
        /// Print the outcome as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration.
    Config,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let (cfg, path) = load_config(cli.config)?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Simulate {
                transient,
                fatal,
                no_retry,
                disable_policy,
                base_delay,
                reply_delay,
                timeout,
                json,
            } => {
                let opts = SimulateOptions {
                    transient,
                    fatal,
                    no_retry,
                    disable_policy,
                    base_delay,
                    reply_delay,
                    timeout,
                };
                run_simulate(&cfg, &opts, json).await?;
            }
            CliCommand::Config => run_config(&cfg, &path)?,
        }

        Ok(())
    }
}

fn load_config(explicit: Option<PathBuf>) -> Result<(MbusConfig, PathBuf)> {
    match explicit {
        Some(path) => Ok((config::load_from_path(&path)?, path)),
        None => Ok((config::load_or_init()?, config::config_path()?)),
    }
}

#[cfg(test)]
mod tests;
