use drift_monitor_analysis::ModelId;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("model `{0}` is already registered")]
    AlreadyRegistered(ModelId),
    #[error("failed to (de)serialize a stored value: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("stored timestamp `{0}` is not RFC 3339")]
    InvalidTimestamp(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("a previous writer panicked while holding the connection")]
    Poisoned,
}
