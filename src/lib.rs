//! # Investment Project Approval Workflow
//!
//! A registry-driven state machine engine for moving investment projects
//! through their approval lifecycle.
//!
//! Per-state handlers declare guarded triggers into a [`registry::HandlerRegistry`];
//! a [`registry::GraphBuilder`] assembles them into a [`machine::StateMachine`]
//! per workflow instance, and the [`actor::WorkflowSystem`] serializes requests
//! per project on top of the persisted project state.

pub mod actor;
pub mod adapter;
pub mod cli;
pub mod config;
pub mod domain;
pub mod machine;
pub mod port;
pub mod registry;
pub mod service;
pub mod workflow;

// Re-export commonly used types
pub use actor::WorkflowSystem;
pub use config::Settings;
pub use domain::{
    context::{Identity, ProjectContext},
    error::WorkflowError,
    project::{Commission, CommissionKind, Project},
    state::{ProjectState, ProjectTrigger}
};
pub use machine::{FireOutcome, StateMachine};
pub use registry::{DuplicatePolicy, GraphBuilder, HandlerRegistry, HandlerSpec, UnitOfWork};
pub use service::{ProjectWorkflow, WorkflowEngine};
pub use workflow::approval_registry;
