//! Application services built on top of the workflow core

pub mod engine;

pub use engine::{ProjectFireOutcome, ProjectWorkflow, WorkflowEngine};
