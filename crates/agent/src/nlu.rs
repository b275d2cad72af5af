use std::collections::BTreeMap;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;
use witty_core::{EntityCandidate, EntityMap, ExternalService, IntegrationError};

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<EntityMap, IntegrationError>;
}

/// Wit.ai `/message` endpoint client.
#[derive(Clone)]
pub struct WitClient {
    http: reqwest::Client,
    base_url: String,
    api_version: String,
    access_token: SecretString,
}

#[derive(Debug, Default, Deserialize)]
struct WitMessageResponse {
    #[serde(default)]
    entities: BTreeMap<String, Vec<EntityCandidate>>,
}

impl WitClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_version: impl Into<String>,
        access_token: SecretString,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_version: api_version.into(),
            access_token,
        }
    }
}

#[async_trait]
impl IntentClassifier for WitClient {
    async fn classify(&self, text: &str) -> Result<EntityMap, IntegrationError> {
        let response = self
            .http
            .get(format!("{}/message", self.base_url))
            .bearer_auth(self.access_token.expose_secret())
            .query(&[("v", self.api_version.as_str()), ("q", text)])
            .send()
            .await
            .map_err(|error| IntegrationError::transport(ExternalService::Wit, error))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| IntegrationError::transport(ExternalService::Wit, error))?;
        if !status.is_success() {
            return Err(IntegrationError::Status {
                service: ExternalService::Wit,
                status: status.as_u16(),
                body,
            });
        }

        let parsed: WitMessageResponse = serde_json::from_str(&body)
            .map_err(|error| IntegrationError::decode(ExternalService::Wit, error))?;
        let entities = normalize_entity_keys(parsed.entities);
        debug!(categories = entities.len(), "wit.ai classified message");
        Ok(entities)
    }
}

/// Newer Wit apps key entities as `name:role`; fold them back onto `name`.
fn normalize_entity_keys(raw: BTreeMap<String, Vec<EntityCandidate>>) -> EntityMap {
    let mut entities = EntityMap::new();
    for (key, candidates) in raw {
        let name = key.split_once(':').map_or(key.as_str(), |(name, _role)| name);
        entities.entry(name.to_owned()).or_default().extend(candidates);
    }
    entities
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use serde_json::json;
    use witty_core::{EntityValue, ExternalService, IntegrationError};

    use super::{IntentClassifier, WitClient};

    fn client(base_url: &str) -> WitClient {
        WitClient::new(reqwest::Client::new(), base_url, "20200513", "wit-token".to_owned().into())
    }

    #[tokio::test]
    async fn classify_decodes_entities_by_category() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/message")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("v".into(), "20200513".into()),
                Matcher::UrlEncoded("q".into(), "what is 2+2".into()),
            ]))
            .match_header("authorization", "Bearer wit-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "_text": "what is 2+2",
                    "entities": {
                        "wolfram_search_query": [{"confidence": 0.93, "value": "2+2", "type": "value"}],
                        "greetings": [{"confidence": 0.12, "value": "true"}]
                    },
                    "msg_id": "abc"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let entities = client(&server.url()).classify("what is 2+2").await.expect("classify");

        assert_eq!(entities.len(), 2);
        let query = &entities["wolfram_search_query"][0];
        assert_eq!(query.confidence, 0.93);
        assert_eq!(query.value, EntityValue::Text("2+2".to_owned()));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn classify_merges_role_suffixed_keys() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/message")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({
                    "entities": {
                        "wolfram_search_query:wolfram_search_query": [{"confidence": 0.8, "value": "pi"}],
                        "wolfram_search_query:alt": [{"confidence": 0.6, "value": "tau"}]
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let entities = client(&server.url()).classify("pi").await.expect("classify");

        assert_eq!(entities.len(), 1);
        assert_eq!(entities["wolfram_search_query"].len(), 2);
    }

    #[tokio::test]
    async fn missing_entities_yield_empty_map() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/message")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"text":"hmm","intents":[]}"#)
            .create_async()
            .await;

        let entities = client(&server.url()).classify("hmm").await.expect("classify");
        assert!(entities.is_empty());
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/message")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"error":"Bad auth","code":"no-auth"}"#)
            .create_async()
            .await;

        let error = client(&server.url()).classify("hi").await.expect_err("should fail");

        assert!(matches!(
            error,
            IntegrationError::Status { service: ExternalService::Wit, status: 401, .. }
        ));
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/message")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let error = client(&server.url()).classify("hi").await.expect_err("should fail");
        assert_eq!(error.error_class(), "decode");
    }
}
