use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use wearlink_codec::{TypedValue, ValueDescriptor};

use crate::environment::{EnvValue, Environment};
use crate::error::{Result, RouteError};
use crate::node::{NodeId, NodeKind, RouteNode};

/// Identifier of a committed route within its graph.
pub type RouteId = u64;

/// Application callback invoked with each value that reaches a subscriber node.
pub type Subscriber = Arc<dyn Fn(&TypedValue, &mut Environment) + Send + Sync>;

/// Shared handle to a committed route.
pub type RouteHandle = Arc<Route>;

struct RouteState {
    environments: Vec<Environment>,
    subscribers: Vec<Option<Subscriber>>,
}

/// A pipeline from one source descriptor to its subscribers.
///
/// Structure is fixed once committed. Environments and subscriber behavior
/// live behind one lock that is also held for the whole delivery of a value,
/// so invocations on a route never interleave. Subscribers must not call back
/// into their own route.
pub struct Route {
    id: RouteId,
    source: ValueDescriptor,
    nodes: Vec<RouteNode>,
    subscriber_nodes: Vec<NodeId>,
    state: Mutex<RouteState>,
    active: AtomicBool,
}

impl Route {
    pub(crate) fn new(
        id: RouteId,
        source: ValueDescriptor,
        nodes: Vec<RouteNode>,
        environments: Vec<Environment>,
        subscribers: Vec<Option<Subscriber>>,
    ) -> Result<Self> {
        validate_tree(&nodes)?;
        if environments.len() != nodes.len() {
            return Err(RouteError::InvalidStructure(format!(
                "{} nodes but {} environments",
                nodes.len(),
                environments.len()
            )));
        }
        if subscribers.len() != nodes.len() {
            return Err(RouteError::InvalidStructure(format!(
                "{} nodes but {} subscriber slots",
                nodes.len(),
                subscribers.len()
            )));
        }
        let subscriber_nodes = nodes
            .iter()
            .filter(|node| node.kind == NodeKind::Subscriber)
            .map(|node| node.id)
            .collect();
        Ok(Self {
            id,
            source,
            nodes,
            subscriber_nodes,
            state: Mutex::new(RouteState {
                environments,
                subscribers,
            }),
            active: AtomicBool::new(true),
        })
    }

    pub fn id(&self) -> RouteId {
        self.id
    }

    pub fn source(&self) -> &ValueDescriptor {
        &self.source
    }

    /// Nodes in construction order; node 0 is the source.
    pub fn nodes(&self) -> &[RouteNode] {
        &self.nodes
    }

    /// Node ids of the subscriber nodes, in construction order.
    pub fn subscriber_nodes(&self) -> &[NodeId] {
        &self.subscriber_nodes
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriber_nodes.len()
    }

    /// False once the route has been detached from its graph.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Store a value in a subscriber's environment.
    pub fn set_environment(&self, subscriber: usize, slot: usize, value: EnvValue) -> Result<()> {
        let node = self.subscriber_node(subscriber)?;
        self.lock_state().environments[node].set(slot, value);
        Ok(())
    }

    /// Copy of a subscriber's environment.
    pub fn environment(&self, subscriber: usize) -> Result<Environment> {
        let node = self.subscriber_node(subscriber)?;
        Ok(self.lock_state().environments[node].clone())
    }

    /// Copy of every node's environment, indexed by node id.
    pub fn environments(&self) -> Vec<Environment> {
        self.lock_state().environments.clone()
    }

    /// Attach (or replace) the behavior of a subscriber node.
    pub fn attach_subscriber<F>(&self, subscriber: usize, behavior: F) -> Result<()>
    where
        F: Fn(&TypedValue, &mut Environment) + Send + Sync + 'static,
    {
        let node = self.subscriber_node(subscriber)?;
        self.lock_state().subscribers[node] = Some(Arc::new(behavior));
        Ok(())
    }

    /// Number of subscriber nodes with behavior attached.
    pub fn attached_count(&self) -> usize {
        let state = self.lock_state();
        self.subscriber_nodes
            .iter()
            .filter(|node| state.subscribers[**node].is_some())
            .count()
    }

    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Run a decoded value through the route, depth-first in construction order.
    pub(crate) fn deliver(&self, value: &TypedValue) -> bool {
        let mut state = self.lock_state();
        if !self.is_active() {
            return false;
        }
        self.visit(0, value, &mut state);
        true
    }

    fn visit(&self, parent: NodeId, value: &TypedValue, state: &mut RouteState) {
        for &child in &self.nodes[parent].children {
            match &self.nodes[child].kind {
                NodeKind::Subscriber => {
                    let RouteState {
                        environments,
                        subscribers,
                    } = &mut *state;
                    match &subscribers[child] {
                        Some(behavior) => behavior(value, &mut environments[child]),
                        None => tracing::trace!(
                            route = self.id,
                            node = child,
                            "subscriber has no behavior attached"
                        ),
                    }
                }
                NodeKind::Transform { transform } => {
                    if let Some(out) = transform.apply(value, &mut state.environments[child]) {
                        self.visit(child, &out, state);
                    }
                }
                NodeKind::Source => {}
            }
        }
    }

    fn subscriber_node(&self, subscriber: usize) -> Result<NodeId> {
        self.subscriber_nodes
            .get(subscriber)
            .copied()
            .ok_or(RouteError::UnknownSubscriber {
                index: subscriber,
                count: self.subscriber_nodes.len(),
            })
    }

    fn lock_state(&self) -> MutexGuard<'_, RouteState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("nodes", &self.nodes)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Node 0 is the only source, ids match positions, and every other node has
/// exactly one parent that precedes it.
fn validate_tree(nodes: &[RouteNode]) -> Result<()> {
    let invalid = |msg: String| Err(RouteError::InvalidStructure(msg));

    match nodes.first() {
        Some(root) if root.kind == NodeKind::Source => {}
        _ => return invalid("first node must be the source".to_string()),
    }

    let mut seen = HashSet::new();
    for (index, node) in nodes.iter().enumerate() {
        if node.id != index {
            return invalid(format!("node at position {index} has id {}", node.id));
        }
        if index > 0 && node.kind == NodeKind::Source {
            return invalid(format!("node {index} is a second source"));
        }
        if node.kind == NodeKind::Subscriber && !node.children.is_empty() {
            return invalid(format!("subscriber node {index} has children"));
        }
        for &child in &node.children {
            if child <= index || child >= nodes.len() {
                return invalid(format!("node {index} has invalid child {child}"));
            }
            if !seen.insert(child) {
                return invalid(format!("node {child} has more than one parent"));
            }
        }
    }

    if seen.len() != nodes.len() - 1 {
        return invalid("route contains unreachable nodes".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::TransformKind;

    fn node(id: NodeId, kind: NodeKind, children: &[NodeId]) -> RouteNode {
        RouteNode {
            id,
            kind,
            children: children.to_vec(),
        }
    }

    #[test]
    fn accepts_preorder_tree() {
        let nodes = vec![
            node(0, NodeKind::Source, &[1, 3]),
            node(
                1,
                NodeKind::Transform {
                    transform: TransformKind::Accumulate,
                },
                &[2],
            ),
            node(2, NodeKind::Subscriber, &[]),
            node(3, NodeKind::Subscriber, &[]),
        ];
        assert!(validate_tree(&nodes).is_ok());
    }

    #[test]
    fn rejects_shared_and_backward_children() {
        let shared = vec![
            node(0, NodeKind::Source, &[1, 1]),
            node(1, NodeKind::Subscriber, &[]),
        ];
        assert!(validate_tree(&shared).is_err());

        let backward = vec![
            node(0, NodeKind::Source, &[1]),
            node(1, NodeKind::Subscriber, &[0]),
        ];
        assert!(validate_tree(&backward).is_err());
    }

    #[test]
    fn rejects_unreachable_and_missing_source() {
        let orphan = vec![
            node(0, NodeKind::Source, &[]),
            node(1, NodeKind::Subscriber, &[]),
        ];
        assert!(validate_tree(&orphan).is_err());

        let no_source = vec![node(0, NodeKind::Subscriber, &[])];
        assert!(validate_tree(&no_source).is_err());
        assert!(validate_tree(&[]).is_err());
    }

    #[test]
    fn length_mismatch_names_the_short_table() {
        let source = ValueDescriptor::new(5, 0x0e, 1, false).unwrap();
        let nodes = vec![
            node(0, NodeKind::Source, &[1]),
            node(1, NodeKind::Subscriber, &[]),
        ];

        let Err(RouteError::InvalidStructure(msg)) = Route::new(
            1,
            source.clone(),
            nodes.clone(),
            vec![Environment::new()],
            vec![None, None],
        ) else {
            panic!("short environment table should be rejected");
        };
        assert_eq!(msg, "2 nodes but 1 environments");

        let Err(RouteError::InvalidStructure(msg)) = Route::new(
            1,
            source,
            nodes,
            vec![Environment::new(); 2],
            vec![None],
        ) else {
            panic!("short subscriber table should be rejected");
        };
        assert_eq!(msg, "2 nodes but 1 subscriber slots");
    }
}
