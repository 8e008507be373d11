pub mod flows;
pub mod jobs;
pub mod metrics;
