use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use witty_agent::AgentRuntime;
use witty_core::InboundMessage;
use witty_slack::events::{EventContext, MessageService};
use witty_slack::web::{MessagePoster, PostMessage};

/// Shared per-process context handed to every message task.
pub struct ChatResponder {
    runtime: AgentRuntime,
    poster: Arc<dyn MessagePoster>,
}

impl ChatResponder {
    pub fn new(runtime: AgentRuntime, poster: Arc<dyn MessagePoster>) -> Self {
        Self { runtime, poster }
    }
}

#[async_trait]
impl MessageService for ChatResponder {
    async fn handle_message(&self, message: InboundMessage, ctx: EventContext) {
        let Some(reply) = self.runtime.reply_for(&message).await else {
            return;
        };

        let post = PostMessage::direct(message.sender_id.as_str(), reply);
        match self.poster.post_message(&post).await {
            Ok(()) => info!(
                event_name = "egress.slack.reply_posted",
                correlation_id = %ctx.correlation_id,
                sender_id = %message.sender_id,
                channel_id = %message.channel_id,
                "reply posted"
            ),
            Err(error) => warn!(
                event_name = "egress.slack.reply_failed",
                correlation_id = %ctx.correlation_id,
                sender_id = %message.sender_id,
                error_class = error.error_class(),
                error = %error,
                "failed to post reply"
            ),
        }
    }
}
