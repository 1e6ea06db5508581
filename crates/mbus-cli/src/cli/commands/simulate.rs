//! `mbus simulate` – run one message through a session against a scripted
//! loopback destination and report the terminal reply.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use mbus_core::config::MbusConfig;
use mbus_core::error_code::{self, Error};
use mbus_core::{
    Message, MessageId, Reply, ReplyHandler, RetryTransientErrorsPolicy, SourceSession, Trace,
    Transport,
};
use serde::Serialize;
use tokio::sync::mpsc;

/// Knobs for one simulated send; `None` keeps the configured value.
#[derive(Debug, Clone, Default)]
pub struct SimulateOptions {
    pub transient: u32,
    pub fatal: bool,
    pub no_retry: bool,
    pub disable_policy: bool,
    pub base_delay: Option<f64>,
    pub reply_delay: Option<f64>,
    pub timeout: Option<f64>,
}

/// What the caller saw.
#[derive(Debug, Serialize)]
pub struct SimulationOutcome {
    pub id: MessageId,
    pub deliveries: u32,
    pub retries: u32,
    pub has_errors: bool,
    pub has_fatal_errors: bool,
    pub errors: Vec<Error>,
    pub trace: Trace,
    pub elapsed_secs: f64,
}

/// Destination that answers the first `transient` deliveries with
/// `APP_TRANSIENT_ERROR`, then acks (or fails fatally). Answers inline.
struct ScriptedDestination {
    transient: u32,
    final_code: u32,
    reply_delay: f64,
    deliveries: AtomicU32,
}

impl Transport for ScriptedDestination {
    fn send(&self, message: Message, replies: Arc<dyn ReplyHandler>) {
        let attempt = self.deliveries.fetch_add(1, Ordering::Relaxed);
        let code = if attempt < self.transient {
            error_code::APP_TRANSIENT_ERROR
        } else {
            self.final_code
        };
        let mut reply = Reply::new(message);
        if code != error_code::NONE {
            reply.add_error(Error::new(code, format!("scripted answer {}", attempt + 1)));
        }
        reply.set_retry_delay(self.reply_delay);
        replies.handle_reply(reply);
    }
}

pub async fn run_simulate(cfg: &MbusConfig, opts: &SimulateOptions, json: bool) -> Result<()> {
    let outcome = simulate(cfg, opts).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }
    println!(
        "message {}: {} deliveries, {} retries, {:.3}s",
        outcome.id, outcome.deliveries, outcome.retries, outcome.elapsed_secs
    );
    if outcome.errors.is_empty() {
        println!("reply: ok");
    } else {
        let kind = if outcome.has_fatal_errors { "fatal" } else { "error" };
        for e in &outcome.errors {
            println!("reply: {} {}", kind, e);
        }
    }
    for line in outcome.trace.lines() {
        println!("  trace: {}", line);
    }
    Ok(())
}

pub async fn simulate(cfg: &MbusConfig, opts: &SimulateOptions) -> Result<SimulationOutcome> {
    let mut retry = cfg.retry_or_default();
    if let Some(base_delay) = opts.base_delay {
        retry.base_delay_secs = base_delay;
    }
    if opts.disable_policy {
        retry.enabled = false;
    }
    let policy = Arc::new(RetryTransientErrorsPolicy::from(&retry));

    let mut session_opts = cfg.session_options();
    if let Some(secs) = opts.timeout {
        session_opts.timeout = Duration::try_from_secs_f64(secs)
            .with_context(|| format!("invalid --timeout: {}", secs))?;
    }

    let destination = Arc::new(ScriptedDestination {
        transient: opts.transient,
        final_code: if opts.fatal {
            error_code::APP_FATAL_ERROR
        } else {
            error_code::NONE
        },
        reply_delay: opts.reply_delay.unwrap_or(-1.0),
        deliveries: AtomicU32::new(0),
    });
    let (tx, mut rx) = mpsc::unbounded_channel::<Reply>();
    let session = SourceSession::new(destination.clone(), policy, session_opts, Arc::new(tx));

    let mut message = Message::new("simulated");
    message.set_retry_enabled(!opts.no_retry);
    let started = Instant::now();
    let id = session.send(message);
    tracing::info!(%id, transient = opts.transient, fatal = opts.fatal, "simulation started");

    let reply = rx
        .recv()
        .await
        .context("session closed without delivering a reply")?;
    let elapsed_secs = started.elapsed().as_secs_f64();
    session.close();

    Ok(SimulationOutcome {
        id,
        deliveries: destination.deliveries.load(Ordering::Relaxed),
        retries: reply.message().map_or(0, Message::retry),
        has_errors: reply.has_errors(),
        has_fatal_errors: reply.has_fatal_errors(),
        errors: reply.errors().to_vec(),
        trace: reply.trace().cloned().unwrap_or_default(),
        elapsed_secs,
    })
}
