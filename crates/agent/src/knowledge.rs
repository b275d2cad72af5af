use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use witty_core::config::WolframUnits;
use witty_core::{ExternalService, IntegrationError};

#[async_trait]
pub trait KnowledgeQuery: Send + Sync {
    /// Answer a free-form question as a single spoken-style sentence.
    async fn spoken_answer(&self, query: &str) -> Result<String, IntegrationError>;
}

/// Wolfram|Alpha Spoken Results API client.
#[derive(Clone)]
pub struct WolframClient {
    http: reqwest::Client,
    base_url: String,
    app_id: SecretString,
    units: WolframUnits,
    timeout_ms: u64,
}

impl WolframClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        app_id: SecretString,
        units: WolframUnits,
        timeout_ms: u64,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            app_id,
            units,
            timeout_ms,
        }
    }
}

#[async_trait]
impl KnowledgeQuery for WolframClient {
    async fn spoken_answer(&self, query: &str) -> Result<String, IntegrationError> {
        let timeout = self.timeout_ms.to_string();
        let response = self
            .http
            .get(format!("{}/v1/spoken", self.base_url))
            .query(&[
                ("appid", self.app_id.expose_secret()),
                ("i", query),
                ("units", self.units.as_str()),
                ("timeout", timeout.as_str()),
            ])
            .send()
            .await
            .map_err(|error| IntegrationError::transport(ExternalService::Wolfram, error))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| IntegrationError::transport(ExternalService::Wolfram, error))?;
        if !status.is_success() {
            return Err(IntegrationError::Status {
                service: ExternalService::Wolfram,
                status: status.as_u16(),
                body,
            });
        }

        let answer = body.trim();
        if answer.is_empty() {
            return Err(IntegrationError::Rejected {
                service: ExternalService::Wolfram,
                message: "empty spoken answer".to_owned(),
            });
        }

        debug!(answer_len = answer.len(), "wolfram returned spoken answer");
        Ok(answer.to_owned())
    }
}
