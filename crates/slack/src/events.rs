use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio_util::task::TaskTracker;
use tracing::debug;
use witty_core::InboundMessage;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    Message(MessageEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::Message(_) => SlackEventType::Message,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }

    /// Decodes a Slack event object (`{"type": "message", ...}`).
    pub fn from_json(event: Value) -> Self {
        let raw = match serde_json::from_value::<RawEvent>(event) {
            Ok(raw) => raw,
            Err(error) => {
                debug!(error = %error, "slack event could not be decoded");
                return Self::Unsupported { event_type: "malformed".to_owned() };
            }
        };

        if raw.event_type != "message" {
            return Self::Unsupported { event_type: raw.event_type };
        }

        let bot_id = raw.bot_id.filter(|bot_id| !bot_id.is_empty());
        if raw.user.is_none() && bot_id.is_none() {
            let subtype = raw.subtype.unwrap_or_default();
            return Self::Unsupported { event_type: format!("message:{subtype}") };
        }

        Self::Message(MessageEvent {
            channel_id: raw.channel.unwrap_or_default(),
            user_id: raw.user.unwrap_or_default(),
            text: raw.text.unwrap_or_default(),
            bot_id,
            ts: raw.ts.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    subtype: Option<String>,
    channel: Option<String>,
    user: Option<String>,
    text: Option<String>,
    bot_id: Option<String>,
    ts: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    Message,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub channel_id: String,
    pub user_id: String,
    pub text: String,
    pub bot_id: Option<String>,
    pub ts: String,
}

impl MessageEvent {
    pub fn to_inbound(&self) -> InboundMessage {
        InboundMessage {
            sender_id: self.user_id.clone(),
            channel_id: self.channel_id.clone(),
            text: self.text.clone(),
            bot_id: self.bot_id.clone(),
            ts: self.ts.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    /// Handed to a background task; the outcome is not reported back.
    Spawned,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("message task rejected because shutdown is in progress")]
    ShuttingDown,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

pub fn default_dispatcher(service: Arc<dyn MessageService>, tasks: TaskTracker) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(MessageHandler::new(service, tasks));
    dispatcher
}

/// Handles one human-authored message from start to finish.
///
/// Implementations own their failures: nothing is returned to the ingestion loop.
#[async_trait]
pub trait MessageService: Send + Sync {
    async fn handle_message(&self, message: InboundMessage, ctx: EventContext);
}

pub struct MessageHandler {
    service: Arc<dyn MessageService>,
    tasks: TaskTracker,
}

impl MessageHandler {
    pub fn new(service: Arc<dyn MessageService>, tasks: TaskTracker) -> Self {
        Self { service, tasks }
    }
}

#[async_trait]
impl EventHandler for MessageHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::Message
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::Message(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let message = event.to_inbound();
        if message.is_from_bot() {
            debug!(
                envelope_id = %envelope.envelope_id,
                bot_id = message.bot_id.as_deref().unwrap_or_default(),
                "ignoring bot-authored message"
            );
            return Ok(HandlerResult::Ignored);
        }

        if self.tasks.is_closed() {
            return Err(EventHandlerError::ShuttingDown);
        }

        let service = Arc::clone(&self.service);
        let ctx = ctx.clone();
        self.tasks.spawn(async move { service.handle_message(message, ctx).await });
        Ok(HandlerResult::Spawned)
    }
}
