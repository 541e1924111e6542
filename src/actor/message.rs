//! Typed messages for actor communication

use ractor::{Message, RpcReplyPort};

use crate::{
    domain::{
        context::Identity,
        error::WorkflowError,
        state::{ProjectState, ProjectTrigger}
    },
    service::ProjectFireOutcome
};

/// Messages for the WorkflowManager actor
#[derive(Debug)]
pub enum WorkflowManagerMessage {
    /// Forward a request to the processor owning `project_id`
    Route { project_id: String, request: ProjectProcessorMessage },
    /// A processor finished one routed request
    RequestDone { project_id: String },
    /// Number of live project processors
    ActiveProcessors { reply: RpcReplyPort<usize> }
}

/// Messages for ProjectProcessor actors (one per project)
#[derive(Debug)]
pub enum ProjectProcessorMessage {
    /// Rebuild the workflow from the persisted project and fire a trigger
    Fire {
        identity: Identity,
        trigger:  ProjectTrigger,
        reply:    RpcReplyPort<Result<ProjectFireOutcome, WorkflowError>>
    },
    /// Triggers the identity may currently fire
    AvailableTriggers { identity: Identity, reply: RpcReplyPort<Result<Vec<ProjectTrigger>, WorkflowError>> },
    /// Raise a task at `step`, replying with its id
    AddTask { step: ProjectState, description: String, reply: RpcReplyPort<Result<String, WorkflowError>> },
    /// Mark a task complete, replying whether it existed
    CompleteTask { task_id: String, reply: RpcReplyPort<Result<bool, WorkflowError>> }
}

impl ProjectProcessorMessage {
    pub fn name(&self) -> &'static str {
        match self {
            ProjectProcessorMessage::Fire { .. } => "fire",
            ProjectProcessorMessage::AvailableTriggers { .. } => "available_triggers",
            ProjectProcessorMessage::AddTask { .. } => "add_task",
            ProjectProcessorMessage::CompleteTask { .. } => "complete_task"
        }
    }
}

// Implement Message trait for Ractor
impl Message for WorkflowManagerMessage {}
impl Message for ProjectProcessorMessage {}
