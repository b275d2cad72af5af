use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::{EventContext, EventDispatcher, HandlerResult, SlackEnvelope, SlackEvent};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

/// Exponential backoff between reconnect attempts, capped at `max_delay_ms`.
/// Attempts never run out; only shutdown stops them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Source of inbound envelopes. `next_envelope` yields them in arrival order and
/// returns `Ok(None)` once the stream is closed for good.
#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

pub struct SocketRunner {
    transport: Arc<dyn SocketTransport>,
    dispatcher: EventDispatcher,
    reconnect_policy: ReconnectPolicy,
}

impl SocketRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy }
    }

    /// Pumps envelopes until `shutdown` fires or the transport reports the
    /// stream closed for good. Transport failures reconnect indefinitely and
    /// per-message failures never end the loop.
    pub async fn start(&self, shutdown: CancellationToken) -> Result<()> {
        let mut attempt: u32 = 0;
        loop {
            let Err(transport_error) = self.connect_and_pump(attempt, &shutdown).await else {
                return Ok(());
            };

            // A dropped established connection restarts backoff from the base delay.
            if matches!(transport_error, TransportError::Receive(_)) {
                attempt = 0;
            }
            let delay = self.reconnect_policy.backoff(attempt);
            warn!(
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %transport_error,
                "socket transport failed; reconnecting"
            );
            attempt = attempt.saturating_add(1);

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("shutdown requested during reconnect backoff");
                    return Ok(());
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn connect_and_pump(
        &self,
        attempt: u32,
        shutdown: &CancellationToken,
    ) -> Result<(), TransportError> {
        info!(attempt, "opening socket transport connection");
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                info!(attempt, "shutdown requested before socket transport connected");
                return Ok(());
            }
            connected = self.transport.connect() => connected?,
        }
        info!(attempt, "socket transport connected");

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!(attempt, "shutdown requested; closing socket transport");
                    self.transport.disconnect().await?;
                    return Ok(());
                }
                next = self.transport.next_envelope() => next?,
            };
            let Some(envelope) = next else {
                info!(attempt, "socket transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };
            let (sender_id, channel_id) = correlation_fields(&envelope);

            debug!(
                event_name = "ingress.slack.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = ?envelope.event.event_type(),
                correlation_id = %envelope.envelope_id,
                sender_id = sender_id.unwrap_or("unknown"),
                channel_id = channel_id.unwrap_or("unknown"),
                "received slack envelope"
            );

            if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
                warn!(
                    event_name = "ingress.slack.ack_failed",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    error = %error,
                    "failed to acknowledge slack envelope"
                );
            }

            let context = EventContext { correlation_id: envelope.envelope_id.clone() };
            match self.dispatcher.dispatch(&envelope, &context).await {
                Ok(HandlerResult::Spawned) => {
                    info!(
                        event_name = "ingress.slack.message_dispatched",
                        correlation_id = %envelope.envelope_id,
                        sender_id = sender_id.unwrap_or("unknown"),
                        channel_id = channel_id.unwrap_or("unknown"),
                        "dispatched message to handler task"
                    );
                }
                Ok(HandlerResult::Ignored) => {}
                Err(error) => {
                    warn!(
                        envelope_id = %envelope.envelope_id,
                        correlation_id = %envelope.envelope_id,
                        sender_id = sender_id.unwrap_or("unknown"),
                        error = %error,
                        "event dispatch failed; continuing socket loop"
                    );
                }
            }
        }
    }
}

fn correlation_fields(envelope: &SlackEnvelope) -> (Option<&str>, Option<&str>) {
    match &envelope.event {
        SlackEvent::Message(event) => (Some(&event.user_id), Some(&event.channel_id)),
        SlackEvent::Unsupported { .. } => (None, None),
    }
}
