//! Autosuite API server library.
//!
//! Exposes config, state, error handling and routes so the binary
//! entrypoint and the integration tests build the exact same application.

pub mod background;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod prometheus;
pub mod query;
pub mod router;
pub mod routes;
pub mod state;
