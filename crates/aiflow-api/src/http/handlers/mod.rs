//! REST API handlers grouped by resource.

pub mod ai;
pub mod workflow;
