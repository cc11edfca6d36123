use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

/// Failure taxonomy shared by every ingestion stage.
///
/// Only `TransientFetch` is retried. Everything else surfaces to the stage
/// that issued the call on the first occurrence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// Network failure, timeout, throttling or a 5xx answer.
    #[error("Transient fetch error: {0}")]
    TransientFetch(String),

    /// Bad request, auth failure, or a response we could not decode.
    #[error("Permanent fetch error: {0}")]
    PermanentFetch(String),

    #[error("Load error: {0}")]
    Load(String),

    /// The warehouse could not answer the watermark query. Distinct from
    /// "no rows yet", which is not an error.
    #[error("Watermark resolution error: {0}")]
    Resolution(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl IngestError {
    pub fn is_transient(&self) -> bool {
        matches!(self, IngestError::TransientFetch(_))
    }

    /// Short stable label for logs and run summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::TransientFetch(_) => "transient_fetch",
            IngestError::PermanentFetch(_) => "permanent_fetch",
            IngestError::Load(_) => "load",
            IngestError::Resolution(_) => "resolution",
            IngestError::Config(_) => "config",
        }
    }
}

impl From<graph_client::GraphError> for IngestError {
    fn from(err: graph_client::GraphError) -> Self {
        if err.is_transient() {
            IngestError::TransientFetch(err.to_string())
        } else {
            IngestError::PermanentFetch(err.to_string())
        }
    }
}

impl From<ga4_client::Ga4Error> for IngestError {
    fn from(err: ga4_client::Ga4Error) -> Self {
        if err.is_transient() {
            IngestError::TransientFetch(err.to_string())
        } else {
            IngestError::PermanentFetch(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_client::GraphError;

    #[test]
    fn graph_errors_map_onto_fetch_kinds() {
        let throttled: IngestError = GraphError::Api {
            status: 429,
            message: "rate limited".into(),
        }
        .into();
        assert!(throttled.is_transient());

        let unauthorized: IngestError = GraphError::Api {
            status: 401,
            message: "bad token".into(),
        }
        .into();
        assert_eq!(unauthorized.kind(), "permanent_fetch");

        let garbled: IngestError = GraphError::Parse("eof".into()).into();
        assert!(!garbled.is_transient());
    }

    #[test]
    fn only_transient_fetch_is_transient() {
        assert!(!IngestError::Load("disk full".into()).is_transient());
        assert!(!IngestError::Resolution("timeout".into()).is_transient());
        assert!(!IngestError::Config("chunk_days".into()).is_transient());
    }
}
