use std::io::{Read, Write};
use std::path::Path;

use wearlink_route::RouteGraph;

use crate::config::StoreConfig;
use crate::error::{Result, StateError};
use crate::snapshot::{self, BoardSnapshot};

/// Write the snapshot of `graph` to `path`, replacing any existing file.
///
/// The document is written to a sibling temporary file first and renamed
/// into place.
pub fn save_to_path(graph: &RouteGraph, path: &Path) -> Result<()> {
    let bytes = snapshot::serialize(graph).to_bytes()?;
    let tmp = path.with_extension("tmp");
    {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "snapshot saved");
    Ok(())
}

/// Read and validate a snapshot file without building a graph.
pub fn read_snapshot(path: &Path, config: &StoreConfig) -> Result<BoardSnapshot> {
    let file = std::fs::File::open(path)?;
    let len = file.metadata()?.len();
    if len > config.max_snapshot_size as u64 {
        return Err(StateError::TooLarge {
            size: len,
            limit: config.max_snapshot_size,
        });
    }

    let read_limit =
        u64::try_from(config.max_snapshot_size.saturating_add(1)).unwrap_or(u64::MAX);
    let mut bytes = Vec::new();
    file.take(read_limit).read_to_end(&mut bytes)?;
    BoardSnapshot::from_bytes_with_config(&bytes, config)
}

/// Restore a graph from a snapshot file.
pub fn load_from_path(path: &Path, config: &StoreConfig) -> Result<RouteGraph> {
    let snapshot = read_snapshot(path, config)?;
    let graph = snapshot::deserialize(&snapshot)?;
    tracing::debug!(path = %path.display(), routes = graph.len(), "snapshot loaded");
    Ok(graph)
}
