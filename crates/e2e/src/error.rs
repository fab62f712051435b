//! Error types for the smoke runner

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Failed to create session after {attempts} attempts")]
    Connection {
        attempts: u32,
        #[source]
        source: Box<E2eError>,
    },

    #[error("Element not found: {key}")]
    ElementNotFound { key: String },

    #[error("Session teardown failed")]
    Teardown(#[source] Box<E2eError>),

    #[error("WebDriver error ({status}): {error} - {message}")]
    WebDriver {
        status: u16,
        error: String,
        message: String,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    /// This error followed by every underlying cause, joined with `: `
    pub fn full_message(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }

    /// WebDriver error kind, if this came back from the server
    pub fn webdriver_kind(&self) -> Option<&str> {
        match self {
            E2eError::WebDriver { error, .. } => Some(error.as_str()),
            _ => None,
        }
    }
}

pub type E2eResult<T> = Result<T, E2eError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_keeps_last_cause() {
        let err = E2eError::Connection {
            attempts: 3,
            source: Box::new(E2eError::Protocol("connection refused".to_string())),
        };
        assert_eq!(err.to_string(), "Failed to create session after 3 attempts");
        assert_eq!(
            std::error::Error::source(&err).map(|e| e.to_string()),
            Some("Protocol error: connection refused".to_string())
        );
        assert_eq!(
            err.full_message(),
            "Failed to create session after 3 attempts: Protocol error: connection refused"
        );
    }

    #[test]
    fn test_cause_appears_once_in_chain() {
        let err = E2eError::Teardown(Box::new(E2eError::Protocol("invalid session id".to_string())));
        let chain = format!("{:#}", anyhow::Error::new(err));
        assert_eq!(chain.matches("invalid session id").count(), 1);
        assert_eq!(chain, "Session teardown failed: Protocol error: invalid session id");
    }

    #[test]
    fn test_webdriver_kind() {
        let err = E2eError::WebDriver {
            status: 404,
            error: "no such element".to_string(),
            message: "missing".to_string(),
        };
        assert_eq!(err.webdriver_kind(), Some("no such element"));
        assert_eq!(E2eError::Config("x".to_string()).webdriver_kind(), None);
    }
}
