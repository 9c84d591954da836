/// Errors that can occur while saving or restoring a board snapshot.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// The snapshot version is not one this build can read.
    #[error("unsupported snapshot version {found} (supported up to {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// The document has no `version` field.
    #[error("snapshot has no version field")]
    MissingVersion,

    /// A table index points outside its table.
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// The document is not valid snapshot JSON.
    #[error("invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The document does not match the published snapshot schema.
    #[error("snapshot schema violation: {0}")]
    SchemaViolation(String),

    /// Reading or writing the snapshot file failed.
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The snapshot exceeds the configured size limit.
    #[error("snapshot too large ({size} bytes, limit {limit})")]
    TooLarge { size: u64, limit: usize },

    /// The restored structure was rejected by the route graph.
    #[error(transparent)]
    Route(#[from] wearlink_route::RouteError),
}

pub type Result<T> = std::result::Result<T, StateError>;
