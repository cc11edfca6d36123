use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl GraphError {
    /// Whether a later attempt of the same request could succeed.
    /// Network failures, throttling (429) and server errors qualify; other
    /// 4xx responses and undecodable bodies do not.
    pub fn is_transient(&self) -> bool {
        match self {
            GraphError::Network(_) => true,
            GraphError::Api { status, .. } => *status == 429 || *status >= 500,
            GraphError::Parse(_) => false,
        }
    }
}

impl From<reqwest::Error> for GraphError {
    fn from(err: reqwest::Error) -> Self {
        GraphError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        GraphError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> GraphError {
        GraphError::Api {
            status,
            message: String::new(),
        }
    }

    #[test]
    fn throttling_and_server_errors_are_transient() {
        assert!(api(429).is_transient());
        assert!(api(500).is_transient());
        assert!(api(503).is_transient());
        assert!(GraphError::Network("connection reset".into()).is_transient());
    }

    #[test]
    fn client_errors_and_bad_bodies_are_permanent() {
        assert!(!api(400).is_transient());
        assert!(!api(401).is_transient());
        assert!(!api(404).is_transient());
        assert!(!GraphError::Parse("expected value".into()).is_transient());
    }
}
