//! Observability for Aiflow: tracing subscriber setup and trace export.

pub mod tracing_setup;
