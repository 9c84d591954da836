//! Live processing pipelines over decoded wearlink values.
//!
//! A route starts at one source descriptor and fans out through data-only
//! transform nodes to subscriber callbacks. Each node owns an [`Environment`]
//! of indexed slots that survives between values and is persisted with the
//! route structure; subscriber behavior itself is not persisted.

pub mod builder;
pub mod environment;
pub mod error;
pub mod graph;
pub mod node;
pub mod route;

pub use builder::RouteComponent;
pub use environment::{EnvValue, Environment};
pub use error::{Result, RouteError};
pub use graph::{RouteGraph, StoredRoute};
pub use node::{Comparison, MathOp, NodeId, NodeKind, RouteNode, TransformKind};
pub use route::{Route, RouteHandle, RouteId, Subscriber};
