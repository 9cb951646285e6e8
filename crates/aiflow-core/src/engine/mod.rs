//! Sequential workflow engine.
//!
//! Modules: execution context ([`context`]), conditional gating
//! ([`condition`]), per-type step dispatch ([`step_runner`]), and the run
//! controller ([`executor`]).

pub mod condition;
pub mod context;
pub mod executor;
pub mod step_runner;

pub use context::ExecutionContext;
pub use executor::{EngineError, WorkflowEngine};
pub use step_runner::{StepError, StepExecutor, StepRunner};
