use crate::route::RouteId;

/// Errors that can occur while building, restoring or dispatching routes.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// The payload could not be decoded against the route source.
    #[error("decode failed: {0}")]
    Codec(#[from] wearlink_codec::CodecError),

    /// No route with this id is registered.
    #[error("unknown route {0}")]
    UnknownRoute(RouteId),

    /// A route with this id is already registered.
    #[error("route {0} already exists")]
    DuplicateRoute(RouteId),

    /// The subscriber index does not name a subscriber node of the route.
    #[error("subscriber {index} out of range (route has {count})")]
    UnknownSubscriber { index: usize, count: usize },

    /// Restored node data does not form a valid route tree.
    #[error("invalid route structure: {0}")]
    InvalidStructure(String),
}

pub type Result<T> = std::result::Result<T, RouteError>;
