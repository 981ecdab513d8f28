#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("Failed to connect to {url}: {reason}")]
    Connection { url: String, reason: String },

    #[error("Query failed on {url}: {reason}")]
    Query { url: String, reason: String },

    #[error("Publish failed on {url}: {reason}")]
    Publish { url: String, reason: String },

    #[error("{url} did not respond before the deadline")]
    Timeout { url: String },

    #[error("All {attempted} contacted relay(s) failed")]
    AllRelaysFailed { attempted: usize },

    #[error("No relay accepted the event ({attempted} tried)")]
    NoRelayAccepted { attempted: usize },

    #[error("Query aborted")]
    Aborted,

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

impl PoolError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, PoolError::Timeout { .. })
    }
}
