//! Flow execution engine.
//!
//! Owns the hook contract every automation flow implements, the registry
//! that maps a [`FlowType`](autosuite_core::flow::FlowType) to its
//! implementation, the sequential job runner, and the session layer that
//! hands flows a ready page handle.

pub mod context;
pub mod events;
pub mod flows;
pub mod hooks;
pub mod input;
pub mod registry;
pub mod runner;
pub mod session;

pub use context::JobContext;
pub use hooks::{FlowAdapter, FlowHooks, ItemView, RegisteredFlow, ValidationIssue};
pub use registry::FlowRegistry;
pub use runner::FlowRunner;

#[cfg(test)]
mod testing;
