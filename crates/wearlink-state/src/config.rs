/// Controls snapshot loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Validate documents against the embedded JSON Schema before parsing.
    ///
    /// Ignored when the `schema` feature is disabled.
    pub validate_schema: bool,
    /// Maximum snapshot size in bytes.
    pub max_snapshot_size: usize,
    /// Largest environment a node may declare.
    pub max_environment_slots: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            validate_schema: true,
            max_snapshot_size: 4 * 1024 * 1024,
            max_environment_slots: 4096,
        }
    }
}
