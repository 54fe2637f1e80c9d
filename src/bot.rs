use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use vigil_logs::{Rewind, StructuredClassifier, WatchedLog};
use vigil_presence::{NotificationGate, StatusArbiter, StatusProvider};
use vigil_types::Clock;

use crate::config::Config;
use crate::transport::{Inbound, Request, Transport};

/// Entries replayed to a new live-stream subscriber by default
const DEFAULT_REPLAY_LINES: usize = 5;

/// Bounded wait for inbound transport traffic per cycle
const POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// The scheduling loop. One cycle polls the transport, tails every
/// watched source, streams flushed text to subscribers, sweeps expired
/// sessions and error facts, arbitrates the combined presence, and
/// broadcasts it when the gate allows.
///
/// All state is owned here and mutated only from the loop; the clock is
/// injected so every expiry decision is testable.
pub struct Bot<T, P> {
    transport: T,
    provider: P,
    clock: Arc<dyn Clock>,
    logs: Vec<WatchedLog>,
    arbiter: StatusArbiter,
    gate: NotificationGate,
    backoff: Duration,
    cancel: CancellationToken,
}

impl<T: Transport, P: StatusProvider> Bot<T, P> {
    /// Build a bot from configuration, watching the bot's own log plus
    /// every configured source. A source registered under an existing
    /// name replaces the previous one.
    pub fn new(config: &Config, transport: T, provider: P, clock: Arc<dyn Clock>) -> Result<Self> {
        let now = clock.now();

        let mut logs: Vec<WatchedLog> = Vec::new();
        logs.push(WatchedLog::open(
            &config.log_path,
            Some(config.log_name.clone()),
            Box::new(StructuredClassifier),
            config.log_error_timeout,
            now,
        )?);
        for source in &config.logs {
            let log = WatchedLog::open(
                &source.path,
                source.name.clone(),
                source.format.classifier(),
                source.error_timeout,
                now,
            )?;
            logs.retain(|existing| existing.name() != log.name());
            logs.push(log);
        }

        info!("started");

        Ok(Self {
            transport,
            provider,
            clock,
            logs,
            arbiter: StatusArbiter::new(now),
            gate: NotificationGate::new(config.presence_heartbeat),
            backoff: Duration::from_secs(config.backoff),
            cancel: CancellationToken::new(),
        })
    }

    /// Token that ends the loop when cancelled
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run until terminated. A failed cycle is logged and retried after
    /// the configured backoff; it never ends the loop.
    pub async fn run(&mut self) {
        while !self.cancel.is_cancelled() {
            if let Err(e) = self.tick().await {
                error!("cycle failed: {e:#}");
                tokio::time::sleep(self.backoff).await;
            }
        }
        info!("terminated");
    }

    /// One scheduling cycle
    pub async fn tick(&mut self) -> Result<()> {
        for inbound in self.transport.poll(POLL_TIMEOUT).await? {
            self.handle(inbound).await?;
        }
        self.flush_logs().await?;
        self.update_presence().await?;
        Ok(())
    }

    async fn handle(&mut self, inbound: Inbound) -> Result<()> {
        let Inbound { from, request } = inbound;
        info!(%from, ?request, "received request");

        match request {
            Request::Show { target, lines } => {
                match self.logs.iter().position(|log| log.name() == target) {
                    Some(index) => {
                        let now = self.clock.now();
                        let log = &mut self.logs[index];
                        log.sessions.add(from, now, None, None);
                        log.rewind(
                            Rewind::by_entries(lines.unwrap_or(DEFAULT_REPLAY_LINES)),
                            now,
                        )?;
                    }
                    None => {
                        warn!(stream = %target, "unknown stream target");
                        self.transport
                            .send_message(&from, &format!("Target {target} unknown"))
                            .await?;
                    }
                }
            }
            Request::Stop => {
                for log in &mut self.logs {
                    log.sessions.remove(&from);
                }
                self.transport.send_message(&from, "--- end of logs").await?;
            }
            Request::Clear => {
                self.arbiter.clear(self.clock.now());
            }
            Request::Terminate => {
                self.cancel.cancel();
            }
        }
        Ok(())
    }

    /// Tail every source, stream flushed text to its receivers, and send
    /// the end-of-stream marker to subscribers whose sessions all expired
    async fn flush_logs(&mut self) -> Result<()> {
        let now = self.clock.now();
        let Self {
            logs, transport, ..
        } = self;

        for log in logs.iter_mut() {
            let text = log.flush()?;
            if !text.is_empty() {
                for receiver in log.sessions.receivers() {
                    transport.send_message(&receiver, &format!("\n{text}")).await?;
                }
            }
            for evicted in log.sessions.expire(now) {
                transport
                    .send_message(&evicted, &format!("--- end of {}", log.name()))
                    .await?;
            }
        }
        Ok(())
    }

    /// Sweep expired error facts, arbitrate the combined status, and
    /// broadcast it when the gate allows
    async fn update_presence(&mut self) -> Result<()> {
        let now = self.clock.now();
        let Self {
            logs,
            transport,
            provider,
            arbiter,
            gate,
            ..
        } = self;

        for log in logs.iter_mut() {
            log.sweep(now);
        }

        let base = provider.current();
        let errors = logs
            .iter()
            .filter_map(|log| log.error(now).map(|fact| (log.name(), fact)));
        let status = arbiter.arbitrate(base, errors, now);

        if gate.should_send(&status.message, now) {
            transport
                .send_presence(status.indicator, &status.message)
                .await?;
            gate.record(&status.message, now);
        }
        Ok(())
    }
}
