use std::sync::Arc;

use wearlink_codec::TypedValue;

use crate::environment::Environment;
use crate::node::{Comparison, MathOp, NodeId, NodeKind, RouteNode, TransformKind};
use crate::route::Subscriber;

/// Route under construction. Node ids are assigned in creation order.
#[derive(Default)]
pub(crate) struct RouteDraft {
    pub(crate) nodes: Vec<RouteNode>,
    pub(crate) subscribers: Vec<Option<Subscriber>>,
}

impl RouteDraft {
    pub(crate) fn new() -> Self {
        let mut draft = Self::default();
        draft.push(None, NodeKind::Source, None);
        draft
    }

    fn push(
        &mut self,
        parent: Option<NodeId>,
        kind: NodeKind,
        subscriber: Option<Subscriber>,
    ) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(RouteNode::new(id, kind));
        self.subscribers.push(subscriber);
        if let Some(parent) = parent {
            self.nodes[parent].children.push(id);
        }
        id
    }
}

/// Builder capability handed to the `configure` pass of
/// [`RouteGraph::build_route`](crate::RouteGraph::build_route).
///
/// Each component refers to one node. Transform methods return a component
/// for the new child, so chains read top to bottom:
///
/// ```
/// # use wearlink_codec::ValueDescriptor;
/// # use wearlink_route::{Comparison, RouteGraph};
/// let graph = RouteGraph::new();
/// let source = ValueDescriptor::new(5, 0x0e, 2, false).unwrap();
/// graph
///     .build_route(source, |root| {
///         root.filter(Comparison::Gt, 100)
///             .stream(|value, _env| println!("{value}"));
///     })
///     .unwrap();
/// ```
pub struct RouteComponent<'a> {
    draft: &'a mut RouteDraft,
    node: NodeId,
}

impl<'a> RouteComponent<'a> {
    pub(crate) fn root(draft: &'a mut RouteDraft) -> Self {
        Self { draft, node: 0 }
    }

    /// Id of the node this component attaches to.
    pub fn node_id(&self) -> NodeId {
        self.node
    }

    /// Attach a subscriber as the next child of this node.
    pub fn stream<F>(&mut self, behavior: F) -> &mut Self
    where
        F: Fn(&TypedValue, &mut Environment) + Send + Sync + 'static,
    {
        self.draft
            .push(Some(self.node), NodeKind::Subscriber, Some(Arc::new(behavior)));
        self
    }

    /// Attach a subscriber node whose behavior is supplied later.
    pub fn placeholder(&mut self) -> &mut Self {
        self.draft.push(Some(self.node), NodeKind::Subscriber, None);
        self
    }

    pub fn transform(&mut self, transform: TransformKind) -> RouteComponent<'_> {
        let node = self
            .draft
            .push(Some(self.node), NodeKind::Transform { transform }, None);
        RouteComponent {
            draft: &mut *self.draft,
            node,
        }
    }

    pub fn filter(&mut self, op: Comparison, reference: i64) -> RouteComponent<'_> {
        self.transform(TransformKind::Filter { op, reference })
    }

    pub fn map(&mut self, op: MathOp, operand: i64) -> RouteComponent<'_> {
        self.transform(TransformKind::Map { op, operand })
    }

    pub fn accumulate(&mut self) -> RouteComponent<'_> {
        self.transform(TransformKind::Accumulate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nodes_are_numbered_in_preorder() {
        let mut draft = RouteDraft::new();
        {
            let mut root = RouteComponent::root(&mut draft);
            root.filter(Comparison::Gt, 0)
                .stream(|_, _| {})
                .accumulate()
                .placeholder();
            root.stream(|_, _| {});
        }

        let kinds: Vec<&str> = draft.nodes.iter().map(|n| n.kind.name()).collect();
        assert_eq!(
            kinds,
            ["source", "transform", "subscriber", "transform", "subscriber", "subscriber"]
        );
        assert_eq!(draft.nodes[0].children, vec![1, 5]);
        assert_eq!(draft.nodes[1].children, vec![2, 3]);
        assert_eq!(draft.nodes[3].children, vec![4]);
        assert!(draft.subscribers[2].is_some());
        assert!(draft.subscribers[4].is_none());
    }
}
