//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&SqlitePool` (or an open transaction) as the first argument.

pub mod job_item_repo;
pub mod job_repo;

pub use job_item_repo::JobItemRepo;
pub use job_repo::{CreateOutcome, JobRepo};
