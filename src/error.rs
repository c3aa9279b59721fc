/// Failures reported by a [`ContainerRegistry`](crate::registry::ContainerRegistry).
///
/// Evaluators never produce these: missing data and degenerate thresholds resolve to
/// defaults. Only the registry boundary can fail.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Container not found: {0}")]
    NotFound(String),

    #[error("Registry unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid threshold configuration: {0}")]
    InvalidThresholds(String),

    #[error("Registry I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed registry document: {0}")]
    Malformed(#[from] serde_json::Error),
}
