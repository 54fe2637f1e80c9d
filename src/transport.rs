use std::time::Duration;

use anyhow::Result;

use vigil_types::Indicator;

/// A request arriving from the chat side, already decoded by the
/// transport layer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    /// Subscribe to a source's live stream, optionally replaying recent
    /// entries first
    Show {
        target: String,
        lines: Option<usize>,
    },
    /// Unsubscribe from every stream
    Stop,
    /// Drop previously reported errors from the displayed status
    Clear,
    /// End the scheduling loop cleanly
    Terminate,
}

/// One inbound request and its sender
#[derive(Clone, Debug)]
pub struct Inbound {
    pub from: String,
    pub request: Request,
}

/// The chat seam. Connecting, authentication, command parsing, and the
/// wire protocol all live behind this trait; the bot only consumes
/// decoded requests and emits messages and presence.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Wait up to `timeout` for inbound traffic and return any decoded
    /// requests
    async fn poll(&mut self, timeout: Duration) -> Result<Vec<Inbound>>;

    /// Deliver a direct message to one subscriber
    async fn send_message(&mut self, to: &str, body: &str) -> Result<()>;

    /// Broadcast the outward presence
    async fn send_presence(&mut self, indicator: Indicator, message: &str) -> Result<()>;
}

/// Transport that prints outbound traffic and never receives; useful for
/// unattended dry runs and as a reference implementation of the seam
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleTransport;

impl Transport for ConsoleTransport {
    async fn poll(&mut self, timeout: Duration) -> Result<Vec<Inbound>> {
        tokio::time::sleep(timeout).await;
        Ok(Vec::new())
    }

    async fn send_message(&mut self, to: &str, body: &str) -> Result<()> {
        println!("-> {to}: {body}");
        Ok(())
    }

    async fn send_presence(&mut self, indicator: Indicator, message: &str) -> Result<()> {
        println!("presence [{}] {message}", indicator.as_str());
        Ok(())
    }
}
