use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use wearlink_codec::{FrameKey, RawFrame, TypedValue, ValueDescriptor};

use crate::builder::{RouteComponent, RouteDraft};
use crate::environment::Environment;
use crate::error::{Result, RouteError};
use crate::node::RouteNode;
use crate::route::{Route, RouteHandle, RouteId};

#[derive(Default)]
struct GraphIndex {
    routes: BTreeMap<RouteId, RouteHandle>,
    by_key: HashMap<FrameKey, Vec<RouteId>>,
}

impl GraphIndex {
    fn insert(&mut self, route: RouteHandle) {
        let ids = self.by_key.entry(route.source().key()).or_default();
        let at = ids.partition_point(|id| *id < route.id());
        ids.insert(at, route.id());
        self.routes.insert(route.id(), route);
    }

    fn matching(&self, key: &FrameKey) -> Vec<RouteHandle> {
        self.by_key
            .get(key)
            .into_iter()
            .flatten()
            .filter_map(|id| self.routes.get(id).cloned())
            .collect()
    }
}

/// Structure of a route read back from storage, not yet committed.
#[derive(Debug, Clone)]
pub struct StoredRoute {
    pub id: RouteId,
    pub source: ValueDescriptor,
    pub nodes: Vec<RouteNode>,
    pub environments: Vec<Environment>,
}

impl StoredRoute {
    fn into_route(self) -> Result<RouteHandle> {
        if self.id == RouteId::MAX {
            return Err(RouteError::InvalidStructure(format!(
                "route id {} is reserved",
                self.id
            )));
        }
        let subscribers = vec![None; self.nodes.len()];
        let route = Route::new(
            self.id,
            self.source,
            self.nodes,
            self.environments,
            subscribers,
        )?;
        Ok(Arc::new(route))
    }
}

/// Set of committed routes for one connection, indexed by source key.
///
/// The index lock is held only to look up, insert or remove routes. Values
/// are delivered to each matching route after the lock is released, in
/// route id order.
pub struct RouteGraph {
    index: Mutex<GraphIndex>,
    next_route_id: AtomicU64,
}

impl RouteGraph {
    pub fn new() -> Self {
        Self {
            index: Mutex::new(GraphIndex::default()),
            next_route_id: AtomicU64::new(1),
        }
    }

    /// Build a route rooted at `source` and commit it for dispatch.
    ///
    /// `configure` runs once, synchronously, and only shapes the route.
    pub fn build_route<F>(&self, source: ValueDescriptor, configure: F) -> Result<RouteHandle>
    where
        F: FnOnce(&mut RouteComponent<'_>),
    {
        let mut draft = RouteDraft::new();
        configure(&mut RouteComponent::root(&mut draft));

        let id = self.next_route_id.fetch_add(1, Ordering::Relaxed);
        let environments = vec![Environment::new(); draft.nodes.len()];
        let route = Arc::new(Route::new(
            id,
            source,
            draft.nodes,
            environments,
            draft.subscribers,
        )?);
        self.lock_index().insert(Arc::clone(&route));

        tracing::debug!(
            route = id,
            source = %route.source(),
            nodes = route.nodes().len(),
            "route committed"
        );
        Ok(route)
    }

    /// Commit a route from stored structure. Subscriber nodes start without
    /// behavior.
    pub fn restore_route(
        &self,
        id: RouteId,
        source: ValueDescriptor,
        nodes: Vec<RouteNode>,
        environments: Vec<Environment>,
    ) -> Result<RouteHandle> {
        let route = StoredRoute {
            id,
            source,
            nodes,
            environments,
        }
        .into_route()?;
        self.commit_restored(std::slice::from_ref(&route))?;
        Ok(route)
    }

    /// Commit several stored routes at once.
    ///
    /// Every route is validated and every id checked before any of them is
    /// committed, so on error the graph is left unchanged.
    pub fn restore_routes<I>(&self, stored: I) -> Result<Vec<RouteHandle>>
    where
        I: IntoIterator<Item = StoredRoute>,
    {
        let routes = stored
            .into_iter()
            .map(StoredRoute::into_route)
            .collect::<Result<Vec<_>>>()?;
        self.commit_restored(&routes)?;
        Ok(routes)
    }

    fn commit_restored(&self, routes: &[RouteHandle]) -> Result<()> {
        let mut index = self.lock_index();
        let mut ids = BTreeSet::new();
        for route in routes {
            if index.routes.contains_key(&route.id()) || !ids.insert(route.id()) {
                return Err(RouteError::DuplicateRoute(route.id()));
            }
        }
        for route in routes {
            index.insert(Arc::clone(route));
        }
        // Ids were checked against `RouteId::MAX` when the routes were built.
        if let Some(last) = ids.last() {
            self.next_route_id.fetch_max(last + 1, Ordering::Relaxed);
        }
        drop(index);

        for route in routes {
            tracing::debug!(route = route.id(), source = %route.source(), "route restored");
        }
        Ok(())
    }

    pub fn route(&self, id: RouteId) -> Option<RouteHandle> {
        self.lock_index().routes.get(&id).cloned()
    }

    /// Re-attach behavior to a subscriber of a committed route, typically
    /// after restoring a snapshot.
    pub fn attach_subscriber<F>(
        &self,
        route: RouteId,
        subscriber: usize,
        behavior: F,
    ) -> Result<()>
    where
        F: Fn(&TypedValue, &mut Environment) + Send + Sync + 'static,
    {
        self.route(route)
            .ok_or(RouteError::UnknownRoute(route))?
            .attach_subscriber(subscriber, behavior)
    }

    /// All committed routes in id order.
    pub fn routes(&self) -> Vec<RouteHandle> {
        self.lock_index().routes.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock_index().routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_index().routes.is_empty()
    }

    /// Remove a route from dispatch.
    ///
    /// Returns `false` if the route was not committed. A delivery already
    /// running on the route completes; later ones are dropped.
    pub fn detach(&self, id: RouteId) -> bool {
        let mut index = self.lock_index();
        let Some(route) = index.routes.remove(&id) else {
            return false;
        };
        let key = route.source().key();
        if let Some(ids) = index.by_key.get_mut(&key) {
            ids.retain(|other| *other != id);
            if ids.is_empty() {
                index.by_key.remove(&key);
            }
        }
        drop(index);

        route.deactivate();
        tracing::debug!(route = id, "route detached");
        true
    }

    /// Decode `payload` against `descriptor` and deliver it to every route
    /// sourced at that descriptor.
    ///
    /// Returns the number of routes that received the value. No matching
    /// route is not an error. A decode failure is surfaced only when some
    /// route would have received the value.
    pub fn dispatch(
        &self,
        descriptor: &ValueDescriptor,
        payload: &[u8],
        timestamp: SystemTime,
    ) -> Result<usize> {
        let routes: Vec<RouteHandle> = self
            .lock_index()
            .matching(&descriptor.key())
            .into_iter()
            .filter(|route| route.source() == descriptor)
            .collect();
        if routes.is_empty() {
            tracing::trace!(source = %descriptor, "no route for value");
            return Ok(0);
        }

        let value = wearlink_codec::decode(descriptor, payload, timestamp)?;
        Ok(routes.iter().filter(|route| route.deliver(&value)).count())
    }

    /// Deliver an unsolicited frame to every route whose source key matches,
    /// decoding with each route's own descriptor.
    ///
    /// Frames that fail to decode for a route are logged and skipped.
    pub fn dispatch_frame(&self, frame: &RawFrame, timestamp: SystemTime) -> usize {
        let routes = self.lock_index().matching(&frame.key());
        let mut delivered = 0;
        for route in routes {
            match wearlink_codec::decode(route.source(), &frame.payload, timestamp) {
                Ok(value) => {
                    if route.deliver(&value) {
                        delivered += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        route = route.id(),
                        frame = %frame,
                        error = %e,
                        "dropping frame that does not decode for route"
                    );
                }
            }
        }
        delivered
    }

    fn lock_index(&self) -> MutexGuard<'_, GraphIndex> {
        self.index
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for RouteGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RouteGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteGraph")
            .field("routes", &self.len())
            .finish()
    }
}
