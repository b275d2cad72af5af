use std::sync::Arc;

use tracing::{debug, warn};
use witty_core::reply::FALLBACK_TEXT;
use witty_core::{ReplyAction, SelectionResult};

use crate::knowledge::KnowledgeQuery;

/// Turns a selection into the single reply text for a message.
#[derive(Clone)]
pub struct ReplyRouter {
    knowledge: Arc<dyn KnowledgeQuery>,
}

impl ReplyRouter {
    pub fn new(knowledge: Arc<dyn KnowledgeQuery>) -> Self {
        Self { knowledge }
    }

    /// Always yields a reply. A failed knowledge query degrades to the fallback
    /// text and is not retried.
    pub async fn route(&self, selection: &SelectionResult) -> String {
        let action = ReplyAction::for_selection(selection);
        debug!(
            category = selection.category.as_deref().unwrap_or("none"),
            action = action.label(),
            "routing reply"
        );

        match action {
            ReplyAction::Canned(text) => text.to_owned(),
            ReplyAction::Query(query) => match self.knowledge.spoken_answer(&query).await {
                Ok(answer) => answer,
                Err(error) => {
                    warn!(
                        event_name = "agent.knowledge.query_failed",
                        service = %error.service(),
                        error_class = error.error_class(),
                        error = %error,
                        "unable to get data from knowledge service; replying with fallback"
                    );
                    FALLBACK_TEXT.to_owned()
                }
            },
            ReplyAction::Fallback => FALLBACK_TEXT.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use witty_core::reply::{FALLBACK_TEXT, GREETING_TEXT};
    use witty_core::{
        select_top_entity, EntityCandidate, EntityMap, EntityValue, ExternalService,
        IntegrationError,
    };

    use super::ReplyRouter;
    use crate::knowledge::KnowledgeQuery;

    struct ScriptedKnowledge {
        answer: Result<String, IntegrationError>,
        queries: Mutex<Vec<String>>,
    }

    impl ScriptedKnowledge {
        fn new(answer: Result<String, IntegrationError>) -> Arc<Self> {
            Arc::new(Self { answer, queries: Mutex::new(Vec::new()) })
        }

        fn queries(&self) -> Vec<String> {
            self.queries.lock().expect("queries lock").clone()
        }
    }

    #[async_trait]
    impl KnowledgeQuery for ScriptedKnowledge {
        async fn spoken_answer(&self, query: &str) -> Result<String, IntegrationError> {
            self.queries.lock().expect("queries lock").push(query.to_owned());
            self.answer.clone()
        }
    }

    fn entities(category: &str, confidence: f64, value: EntityValue) -> EntityMap {
        EntityMap::from([(category.to_owned(), vec![EntityCandidate { confidence, value }])])
    }

    #[tokio::test]
    async fn greeting_gets_fixed_text() {
        let knowledge = ScriptedKnowledge::new(Ok("unused".to_owned()));
        let router = ReplyRouter::new(knowledge.clone());

        let selection = select_top_entity(&entities("greetings", 0.9, "hi".into()));
        assert_eq!(router.route(&selection).await, GREETING_TEXT);
        assert!(knowledge.queries().is_empty());
    }

    #[tokio::test]
    async fn empty_mapping_gets_fallback() {
        let router = ReplyRouter::new(ScriptedKnowledge::new(Ok("unused".to_owned())));
        let selection = select_top_entity(&EntityMap::new());
        assert_eq!(router.route(&selection).await, FALLBACK_TEXT);
    }

    #[tokio::test]
    async fn knowledge_query_answer_is_the_reply() {
        let knowledge = ScriptedKnowledge::new(Ok("4".to_owned()));
        let router = ReplyRouter::new(knowledge.clone());

        let selection = select_top_entity(&entities("wolfram_search_query", 0.8, "2+2".into()));

        assert_eq!(router.route(&selection).await, "4");
        assert_eq!(knowledge.queries(), vec!["2+2"]);
    }

    #[tokio::test]
    async fn knowledge_query_failure_falls_back_without_retry() {
        let knowledge = ScriptedKnowledge::new(Err(IntegrationError::Status {
            service: ExternalService::Wolfram,
            status: 501,
            body: "did not understand".to_owned(),
        }));
        let router = ReplyRouter::new(knowledge.clone());

        let selection = select_top_entity(&entities("wolfram_search_query", 0.8, "2+2".into()));

        assert_eq!(router.route(&selection).await, FALLBACK_TEXT);
        assert_eq!(knowledge.queries().len(), 1);
    }

    #[tokio::test]
    async fn non_string_query_value_never_reaches_knowledge_service() {
        let knowledge = ScriptedKnowledge::new(Ok("4".to_owned()));
        let router = ReplyRouter::new(knowledge.clone());

        let selection =
            select_top_entity(&entities("wolfram_search_query", 0.8, EntityValue::Number(4.0)));

        assert_eq!(router.route(&selection).await, FALLBACK_TEXT);
        assert!(knowledge.queries().is_empty());
    }
}
