//! Row models and DTOs.

pub mod job;
pub mod job_item;
