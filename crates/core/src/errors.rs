use std::fmt;

use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExternalService {
    Slack,
    Wit,
    Wolfram,
}

impl ExternalService {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Slack => "slack",
            Self::Wit => "wit.ai",
            Self::Wolfram => "wolfram",
        }
    }
}

impl fmt::Display for ExternalService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Failure talking to one of the external collaborators.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IntegrationError {
    #[error("{service} request failed: {message}")]
    Transport { service: ExternalService, message: String },
    #[error("{service} responded with status {status}: {body}")]
    Status { service: ExternalService, status: u16, body: String },
    #[error("{service} response could not be decoded: {message}")]
    Decode { service: ExternalService, message: String },
    #[error("{service} rejected the request: {message}")]
    Rejected { service: ExternalService, message: String },
}

impl IntegrationError {
    pub fn service(&self) -> ExternalService {
        match self {
            Self::Transport { service, .. }
            | Self::Status { service, .. }
            | Self::Decode { service, .. }
            | Self::Rejected { service, .. } => *service,
        }
    }

    pub fn transport(service: ExternalService, error: impl fmt::Display) -> Self {
        Self::Transport { service, message: error.to_string() }
    }

    pub fn decode(service: ExternalService, error: impl fmt::Display) -> Self {
        Self::Decode { service, message: error.to_string() }
    }

    /// Short classification used as a structured log field.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Status { .. } => "status",
            Self::Decode { .. } => "decode",
            Self::Rejected { .. } => "rejected",
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ExternalService, IntegrationError};

    #[test]
    fn status_error_names_service_and_code() {
        let error = IntegrationError::Status {
            service: ExternalService::Wolfram,
            status: 501,
            body: "Wolfram|Alpha did not understand your input".to_owned(),
        };

        assert_eq!(
            error.to_string(),
            "wolfram responded with status 501: Wolfram|Alpha did not understand your input"
        );
        assert_eq!(error.service(), ExternalService::Wolfram);
        assert_eq!(error.error_class(), "status");
    }

    #[test]
    fn helper_constructors_keep_service() {
        let error = IntegrationError::transport(ExternalService::Wit, "connection refused");
        assert_eq!(error.service(), ExternalService::Wit);
        assert_eq!(error.to_string(), "wit.ai request failed: connection refused");

        let error = IntegrationError::decode(ExternalService::Slack, "missing field `ok`");
        assert_eq!(error.error_class(), "decode");
    }
}
