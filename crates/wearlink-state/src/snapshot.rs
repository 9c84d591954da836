use std::collections::HashMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use wearlink_codec::ValueDescriptor;
use wearlink_route::{
    Environment, NodeKind, RouteGraph, RouteHandle, RouteId, RouteNode, StoredRoute,
};

use crate::config::StoreConfig;
use crate::error::{Result, StateError};
use crate::schema;

/// Newest snapshot layout this build writes and reads.
///
/// - 1: nodes carry a slot count only; descriptors have no unit transform.
/// - 2: nodes also carry their environment values.
pub const CURRENT_VERSION: u32 = 2;

/// Persisted structure of a route graph.
///
/// Nodes of all routes share one table; each route owns a contiguous run of
/// it starting at its source node, and child indices point into the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub version: u32,
    pub descriptors: Vec<ValueDescriptor>,
    pub nodes: Vec<NodeRecord>,
    pub routes: Vec<RouteRecord>,
}

/// One route node in the node table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    #[serde(flatten)]
    pub kind: NodeKind,
    pub children: Vec<usize>,
    pub environment_slot_count: usize,
    #[serde(default)]
    pub environment: Environment,
}

/// One route: its id, source descriptor and run of nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub id: RouteId,
    pub descriptor: usize,
    pub first_node: usize,
    pub node_count: usize,
}

impl RouteRecord {
    pub fn node_range(&self) -> Range<usize> {
        self.first_node..self.first_node.saturating_add(self.node_count)
    }
}

#[derive(Deserialize)]
struct VersionProbe {
    version: Option<u32>,
}

impl BoardSnapshot {
    /// Empty snapshot at the current version.
    pub fn new() -> Self {
        Self {
            version: CURRENT_VERSION,
            descriptors: Vec::new(),
            nodes: Vec::new(),
            routes: Vec::new(),
        }
    }

    /// Deterministic JSON encoding.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Parse a snapshot document with default limits.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_with_config(bytes, &StoreConfig::default())
    }

    /// Parse a snapshot document.
    ///
    /// The version is checked before anything else is interpreted. Older
    /// layouts are upgraded in memory to [`CURRENT_VERSION`].
    pub fn from_bytes_with_config(bytes: &[u8], config: &StoreConfig) -> Result<Self> {
        if bytes.len() > config.max_snapshot_size {
            return Err(StateError::TooLarge {
                size: bytes.len() as u64,
                limit: config.max_snapshot_size,
            });
        }

        let probe: VersionProbe = serde_json::from_slice(bytes)?;
        let version = probe.version.ok_or(StateError::MissingVersion)?;
        check_version(version)?;

        let mut snapshot: BoardSnapshot = if config.validate_schema {
            let document: serde_json::Value = serde_json::from_slice(bytes)?;
            schema::validate_document(&document)?;
            serde_json::from_value(document)?
        } else {
            serde_json::from_slice(bytes)?
        };

        if let Some((index, node)) = snapshot
            .nodes
            .iter()
            .enumerate()
            .find(|(_, node)| node.environment_slot_count > config.max_environment_slots)
        {
            return Err(StateError::InvalidReference(format!(
                "node {index} declares {} slots, limit is {}",
                node.environment_slot_count, config.max_environment_slots
            )));
        }
        if snapshot.version < CURRENT_VERSION {
            snapshot.upgrade();
        }
        snapshot.check_references()?;
        Ok(snapshot)
    }

    /// Fill fields added after version 1.
    fn upgrade(&mut self) {
        tracing::debug!(from = self.version, to = CURRENT_VERSION, "upgrading snapshot");
        for node in &mut self.nodes {
            if node.environment.is_empty() {
                node.environment = Environment::with_slots(node.environment_slot_count);
            }
        }
        self.version = CURRENT_VERSION;
    }

    /// Check that every table index points inside its table, that each
    /// route's children stay within the route and that every node belongs to
    /// exactly one route.
    pub fn check_references(&self) -> Result<()> {
        let invalid = |msg: String| Err(StateError::InvalidReference(msg));
        let mut owner: Vec<Option<RouteId>> = vec![None; self.nodes.len()];

        for route in &self.routes {
            if route.descriptor >= self.descriptors.len() {
                return invalid(format!(
                    "route {} uses descriptor {} of {}",
                    route.id,
                    route.descriptor,
                    self.descriptors.len()
                ));
            }
            let range = route.node_range();
            if range.is_empty() || range.end > self.nodes.len() {
                return invalid(format!(
                    "route {} spans nodes {:?} of {}",
                    route.id,
                    range,
                    self.nodes.len()
                ));
            }
            for index in range.clone() {
                if let Some(other) = owner[index].replace(route.id) {
                    return invalid(format!(
                        "node {index} belongs to routes {other} and {}",
                        route.id
                    ));
                }
                let node = &self.nodes[index];
                if let Some(child) = node.children.iter().find(|c| !range.contains(c)) {
                    return invalid(format!(
                        "node {index} of route {} has child {child} outside the route",
                        route.id
                    ));
                }
                if node.environment.len() != node.environment_slot_count {
                    return invalid(format!(
                        "node {index} declares {} slots but stores {}",
                        node.environment_slot_count,
                        node.environment.len()
                    ));
                }
            }
        }
        if let Some(index) = owner.iter().position(Option::is_none) {
            return invalid(format!("node {index} belongs to no route"));
        }
        Ok(())
    }
}

impl Default for BoardSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

fn check_version(version: u32) -> Result<()> {
    if version == 0 || version > CURRENT_VERSION {
        return Err(StateError::UnsupportedVersion {
            found: version,
            supported: CURRENT_VERSION,
        });
    }
    Ok(())
}

/// Capture the structure and environment data of every route in `graph`.
///
/// Routes are written in id order and each route's nodes in construction
/// order, so an unchanged graph always produces the same snapshot.
pub fn serialize(graph: &RouteGraph) -> BoardSnapshot {
    let mut snapshot = BoardSnapshot::new();
    let mut descriptor_index: HashMap<ValueDescriptor, usize> = HashMap::new();

    for route in graph.routes() {
        let descriptor = *descriptor_index
            .entry(route.source().clone())
            .or_insert_with(|| {
                snapshot.descriptors.push(route.source().clone());
                snapshot.descriptors.len() - 1
            });

        let first_node = snapshot.nodes.len();
        let environments = route.environments();
        for (node, environment) in route.nodes().iter().zip(environments) {
            snapshot.nodes.push(NodeRecord {
                kind: node.kind,
                children: node.children.iter().map(|c| c + first_node).collect(),
                environment_slot_count: environment.len(),
                environment,
            });
        }

        snapshot.routes.push(RouteRecord {
            id: route.id(),
            descriptor,
            first_node,
            node_count: route.nodes().len(),
        });
    }

    snapshot
}

/// Rebuild a graph from a snapshot. Subscriber behavior must be re-attached
/// by the caller.
pub fn deserialize(snapshot: &BoardSnapshot) -> Result<RouteGraph> {
    let graph = RouteGraph::new();
    restore_into(snapshot, &graph)?;
    Ok(graph)
}

/// Commit every route of `snapshot` into an existing graph.
///
/// Either all routes are committed or, on error, none are.
pub fn restore_into(snapshot: &BoardSnapshot, graph: &RouteGraph) -> Result<Vec<RouteHandle>> {
    check_version(snapshot.version)?;
    snapshot.check_references()?;

    let stored = snapshot.routes.iter().map(|record| {
        let range = record.node_range();
        let first = range.start;
        let (nodes, environments): (Vec<RouteNode>, Vec<Environment>) = snapshot.nodes[range]
            .iter()
            .enumerate()
            .map(|(id, node)| {
                let route_node = RouteNode {
                    id,
                    kind: node.kind,
                    children: node.children.iter().map(|c| c - first).collect(),
                };
                (route_node, node.environment.clone())
            })
            .unzip();

        StoredRoute {
            id: record.id,
            source: snapshot.descriptors[record.descriptor].clone(),
            nodes,
            environments,
        }
    });
    let restored = graph.restore_routes(stored)?;

    tracing::debug!(routes = restored.len(), "snapshot restored");
    Ok(restored)
}
