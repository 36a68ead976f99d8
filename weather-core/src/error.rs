use thiserror::Error;

/// Failure of a remote gateway call.
///
/// Both variants display as the bare message, because the coordinator shows
/// it to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Transport failure, no response received.
    #[error("{0}")]
    Network(String),

    /// A response arrived but reports a failure or has an unexpected shape.
    #[error("{0}")]
    Provider(String),
}

impl GatewayError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider(message.into())
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Network(m) | Self::Provider(m) => m,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("Location request timed out")]
    Timeout,
    #[error("Location unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("view state I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("view state is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}
