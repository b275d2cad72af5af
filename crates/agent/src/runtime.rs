use std::sync::Arc;

use tracing::{debug, warn};
use witty_core::{select_top_entity, InboundMessage};

use crate::{nlu::IntentClassifier, router::ReplyRouter};

#[derive(Clone)]
pub struct AgentRuntime {
    classifier: Arc<dyn IntentClassifier>,
    router: ReplyRouter,
}

impl AgentRuntime {
    pub fn new(classifier: Arc<dyn IntentClassifier>, router: ReplyRouter) -> Self {
        Self { classifier, router }
    }

    /// Returns `None` when the message could not be classified; such messages
    /// get no reply at all.
    pub async fn reply_for(&self, message: &InboundMessage) -> Option<String> {
        let entities = match self.classifier.classify(&message.text).await {
            Ok(entities) => entities,
            Err(error) => {
                warn!(
                    event_name = "agent.nlu.classification_failed",
                    sender_id = %message.sender_id,
                    service = %error.service(),
                    error_class = error.error_class(),
                    error = %error,
                    "unable to classify message; no reply will be sent"
                );
                return None;
            }
        };

        let selection = select_top_entity(&entities);
        debug!(
            sender_id = %message.sender_id,
            categories = entities.len(),
            selected = selection.category.as_deref().unwrap_or("none"),
            confidence = selection.entity.as_ref().map(|entity| entity.confidence),
            "selected top entity"
        );

        Some(self.router.route(&selection).await)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use witty_core::reply::{FALLBACK_TEXT, THANKS_TEXT};
    use witty_core::{
        EntityCandidate, EntityMap, ExternalService, InboundMessage, IntegrationError,
    };

    use super::AgentRuntime;
    use crate::{knowledge::KnowledgeQuery, nlu::IntentClassifier, router::ReplyRouter};

    struct FixedClassifier(Result<EntityMap, IntegrationError>);

    #[async_trait]
    impl IntentClassifier for FixedClassifier {
        async fn classify(&self, _text: &str) -> Result<EntityMap, IntegrationError> {
            self.0.clone()
        }
    }

    #[derive(Default)]
    struct CountingKnowledge {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl KnowledgeQuery for CountingKnowledge {
        async fn spoken_answer(&self, _query: &str) -> Result<String, IntegrationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("42".to_owned())
        }
    }

    fn message(text: &str) -> InboundMessage {
        InboundMessage {
            sender_id: "U1".to_owned(),
            channel_id: "D1".to_owned(),
            text: text.to_owned(),
            bot_id: None,
            ts: "1730000000.0001".to_owned(),
        }
    }

    fn runtime(classified: Result<EntityMap, IntegrationError>) -> AgentRuntime {
        AgentRuntime::new(
            Arc::new(FixedClassifier(classified)),
            ReplyRouter::new(Arc::new(CountingKnowledge::default())),
        )
    }

    #[tokio::test]
    async fn classification_failure_yields_no_reply() {
        let runtime = runtime(Err(IntegrationError::transport(ExternalService::Wit, "timeout")));
        assert_eq!(runtime.reply_for(&message("hello")).await, None);
    }

    #[tokio::test]
    async fn low_confidence_entities_get_fallback() {
        let entities =
            EntityMap::from([("thanks".to_owned(), vec![EntityCandidate::new(0.3, "true")])]);
        let runtime = runtime(Ok(entities));

        assert_eq!(runtime.reply_for(&message("thx?")).await.as_deref(), Some(FALLBACK_TEXT));
    }

    #[tokio::test]
    async fn confident_entity_routes_to_its_reply() {
        let entities =
            EntityMap::from([("thanks".to_owned(), vec![EntityCandidate::new(0.97, "true")])]);
        let runtime = runtime(Ok(entities));

        assert_eq!(runtime.reply_for(&message("thanks!")).await.as_deref(), Some(THANKS_TEXT));
    }
}
