use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::info;
use witty_agent::{AgentRuntime, ReplyRouter, WitClient, WolframClient};
use witty_core::config::AppConfig;
use witty_slack::{
    events::default_dispatcher,
    socket::{ReconnectPolicy, SocketRunner},
    transport::{ConnectionMode, WebSocketTransport},
    web::SlackWebClient,
};

use crate::responder::ChatResponder;

pub struct Application {
    pub config: AppConfig,
    pub runner: SocketRunner,
    /// Every in-flight message task; closed and drained on shutdown.
    pub tasks: TaskTracker,
    pub shutdown: CancellationToken,
    pub transport_mode: &'static str,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("http client construction failed: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Builds the dependency context from an already validated config.
pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.runtime.http_timeout_secs))
        .build()
        .map_err(BootstrapError::HttpClient)?;

    let classifier = Arc::new(WitClient::new(
        http.clone(),
        config.wit.base_url.as_str(),
        config.wit.api_version.as_str(),
        config.wit.access_token.clone(),
    ));
    let knowledge = Arc::new(WolframClient::new(
        http.clone(),
        config.wolfram.base_url.as_str(),
        config.wolfram.app_id.clone(),
        config.wolfram.units,
        config.wolfram.timeout_ms,
    ));
    let runtime = AgentRuntime::new(classifier, ReplyRouter::new(knowledge));

    let web = SlackWebClient::new(
        http,
        config.slack.api_base_url.as_str(),
        config.slack.access_token.clone(),
    );
    let responder = Arc::new(ChatResponder::new(runtime, Arc::new(web.clone())));
    info!(
        event_name = "system.bootstrap.clients_ready",
        correlation_id = "bootstrap",
        wit_api_version = %config.wit.api_version,
        wolfram_units = config.wolfram.units.as_str(),
        "external service clients constructed"
    );

    let mode = match &config.slack.app_token {
        Some(app_token) => ConnectionMode::SocketMode { app_token: app_token.clone() },
        None => ConnectionMode::Rtm,
    };
    let transport_mode = mode.label();
    let tasks = TaskTracker::new();
    let runner = SocketRunner::new(
        Arc::new(WebSocketTransport::new(web, mode)),
        default_dispatcher(responder, tasks.clone()),
        ReconnectPolicy {
            max_delay_ms: config.slack.reconnect_max_delay_ms,
            ..ReconnectPolicy::default()
        },
    );

    Ok(Application { config, runner, tasks, shutdown: CancellationToken::new(), transport_mode })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use witty_core::config::AppConfig;

    use super::bootstrap_with_config;

    fn valid_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.slack.access_token = "xoxb-test".to_owned().into();
        config.wit.access_token = "wit-test".to_owned().into();
        config.wolfram.app_id = "APPID-TEST".to_owned().into();
        config
    }

    #[tokio::test]
    async fn bootstrap_defaults_to_rtm_without_app_token() {
        let app = bootstrap_with_config(valid_config()).expect("bootstrap");

        assert_eq!(app.transport_mode, "rtm");
        assert!(!app.tasks.is_closed());
        assert!(!app.shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn bootstrap_selects_socket_mode_with_app_token() {
        let mut config = valid_config();
        config.slack.app_token = Some("xapp-test".to_owned().into());

        let app = bootstrap_with_config(config).expect("bootstrap");
        assert_eq!(app.transport_mode, "socket_mode");
    }

    #[tokio::test]
    async fn unreachable_slack_does_not_end_ingestion() {
        let mut config = valid_config();
        config.slack.api_base_url = "http://127.0.0.1:1".to_owned();
        config.slack.reconnect_max_delay_ms = 10;
        let app = bootstrap_with_config(config).expect("bootstrap");

        let shutdown = app.shutdown.clone();
        let runner = tokio::spawn(async move { app.runner.start(app.shutdown.clone()).await });
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!runner.is_finished(), "ingestion must outlive a slack outage");

        shutdown.cancel();
        runner.await.expect("runner task").expect("runner should stop on shutdown");
    }

    #[tokio::test]
    async fn cancelled_application_stops_before_connecting() {
        let app = bootstrap_with_config(valid_config()).expect("bootstrap");
        app.shutdown.cancel();

        app.runner.start(app.shutdown.clone()).await.expect("runner should stop");
        app.tasks.close();
        app.tasks.wait().await;
    }
}
