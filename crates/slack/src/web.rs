use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;
use witty_core::{ExternalService, IntegrationError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PostMessage {
    pub channel: String,
    pub text: String,
    pub as_user: bool,
}

impl PostMessage {
    /// Direct reply addressed to a user id; Slack opens the DM channel itself.
    pub fn direct(user_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { channel: user_id.into(), text: text.into(), as_user: true }
    }
}

#[async_trait]
pub trait MessagePoster: Send + Sync {
    async fn post_message(&self, message: &PostMessage) -> Result<(), IntegrationError>;
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Slack Web API client authenticated with the bot or user access token.
#[derive(Clone)]
pub struct SlackWebClient {
    http: reqwest::Client,
    base_url: String,
    access_token: SecretString,
}

impl SlackWebClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        access_token: SecretString,
    ) -> Self {
        Self { http, base_url: base_url.into().trim_end_matches('/').to_owned(), access_token }
    }

    /// Opens a real-time messaging session and returns its WebSocket URL.
    pub async fn rtm_connect(&self) -> Result<String, IntegrationError> {
        let response = self.call("rtm.connect", &self.access_token, None).await?;
        websocket_url(response, "rtm.connect")
    }

    /// Opens a Socket Mode session with an app-level token and returns its WebSocket URL.
    pub async fn open_socket_mode_connection(
        &self,
        app_token: &SecretString,
    ) -> Result<String, IntegrationError> {
        let response = self.call("apps.connections.open", app_token, None).await?;
        websocket_url(response, "apps.connections.open")
    }

    async fn call(
        &self,
        method: &str,
        token: &SecretString,
        body: Option<&PostMessage>,
    ) -> Result<ApiResponse, IntegrationError> {
        let mut request = self
            .http
            .post(format!("{}/{method}", self.base_url))
            .bearer_auth(token.expose_secret());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|error| IntegrationError::transport(ExternalService::Slack, error))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IntegrationError::Status {
                service: ExternalService::Slack,
                status: status.as_u16(),
                body,
            });
        }

        let payload: ApiResponse = response
            .json()
            .await
            .map_err(|error| IntegrationError::decode(ExternalService::Slack, error))?;
        if !payload.ok {
            return Err(IntegrationError::Rejected {
                service: ExternalService::Slack,
                message: format!(
                    "{method}: {}",
                    payload.error.as_deref().unwrap_or("unknown_error")
                ),
            });
        }

        debug!(method, "slack api call succeeded");
        Ok(payload)
    }
}

fn websocket_url(response: ApiResponse, method: &str) -> Result<String, IntegrationError> {
    response.url.filter(|url| !url.is_empty()).ok_or_else(|| {
        IntegrationError::decode(ExternalService::Slack, format!("{method} returned no url"))
    })
}

#[async_trait]
impl MessagePoster for SlackWebClient {
    async fn post_message(&self, message: &PostMessage) -> Result<(), IntegrationError> {
        self.call("chat.postMessage", &self.access_token, Some(message)).await.map(|_| ())
    }
}
