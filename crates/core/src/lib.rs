//! Shared vocabulary for the autosuite workspace.
//!
//! Status enums, the item error taxonomy, per-item outcome records,
//! runtime settings and job id derivation. Every other crate depends on
//! this one; it has no I/O of its own.

#[macro_use]
mod macros;

pub mod error;
pub mod error_code;
pub mod flow;
pub mod job_id;
pub mod result;
pub mod settings;
pub mod status;
pub mod types;
