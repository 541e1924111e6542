//! ProjectProcessor Actor
//!
//! Owns every request for a single project. The mailbox processes one message
//! at a time, so construction and fire for the same project never overlap.
//! Each request reloads the project from the gateway; nothing about the
//! workflow is cached between messages.
//!
//! Store access and the build-and-fire run on the blocking pool, and the
//! handler awaits them before taking the next message. After every request the
//! processor tells the manager it is done, so the manager can retire it once
//! nothing more is queued.

use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use tracing::{Level, event};

use crate::{
    actor::message::{ProjectProcessorMessage, WorkflowManagerMessage},
    domain::{constant::processor, error::WorkflowError, project::Project},
    service::WorkflowEngine
};

pub struct ProjectProcessorState {
    pub project_id: String,
    pub workflow:   String,
    pub engine:     WorkflowEngine,
    pub manager:    ActorRef<WorkflowManagerMessage>
}

/// ProjectProcessor Actor - serializes work for one project
pub struct ProjectProcessor;

#[async_trait::async_trait]
impl Actor for ProjectProcessor {
    type Arguments = (String, String, WorkflowEngine, ActorRef<WorkflowManagerMessage>);
    type Msg = ProjectProcessorMessage;
    type State = ProjectProcessorState;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        (project_id, workflow, engine, manager): Self::Arguments
    ) -> Result<Self::State, ActorProcessingErr> {
        event!(Level::DEBUG, event = processor::PROCESSOR_STARTED, project_id = %project_id, workflow = %workflow);
        Ok(ProjectProcessorState { project_id, workflow, engine, manager })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State
    ) -> Result<(), ActorProcessingErr> {
        event!(Level::DEBUG, event = processor::REQUEST_RECEIVED,
               project_id = %state.project_id, request = message.name());

        let engine = state.engine.clone();
        let workflow = state.workflow.clone();
        let project_id = state.project_id.clone();

        match message {
            ProjectProcessorMessage::Fire { identity, trigger, reply } => {
                let result = Self::run_blocking(move || {
                    engine.load(&workflow, &project_id, identity).and_then(|mut instance| instance.fire(trigger))
                })
                .await;
                Self::respond(state, "fire", reply, result);
            }
            ProjectProcessorMessage::AvailableTriggers { identity, reply } => {
                let result = Self::run_blocking(move || {
                    engine.load(&workflow, &project_id, identity).map(|instance| instance.available_triggers())
                })
                .await;
                Self::respond(state, "available_triggers", reply, result);
            }
            ProjectProcessorMessage::AddTask { step, description, reply } => {
                let result = Self::run_blocking(move || {
                    Self::update_project(&engine, &project_id, |project| project.add_task(step, description))
                })
                .await;
                Self::respond(state, "add_task", reply, result);
            }
            ProjectProcessorMessage::CompleteTask { task_id, reply } => {
                let result = Self::run_blocking(move || {
                    Self::update_project(&engine, &project_id, |project| project.complete_task(&task_id))
                })
                .await;
                Self::respond(state, "complete_task", reply, result);
            }
        }

        let done = WorkflowManagerMessage::RequestDone { project_id: state.project_id.clone() };
        if let Err(e) = state.manager.cast(done) {
            event!(Level::WARN, event = processor::DONE_NOTICE_FAILED, project_id = %state.project_id, error = %e);
        }

        Ok(())
    }
}

impl ProjectProcessor {
    /// Run synchronous store and workflow work off the async worker threads
    async fn run_blocking<R, F>(work: F) -> Result<R, WorkflowError>
    where
        R: Send + 'static,
        F: FnOnce() -> Result<R, WorkflowError> + Send + 'static
    {
        tokio::task::spawn_blocking(work)
            .await
            .map_err(|e| WorkflowError::Actor(format!("Project request task failed: {}", e)))?
    }

    /// Load, mutate and save the project outside of any workflow transition
    fn update_project<R>(
        engine: &WorkflowEngine,
        project_id: &str,
        f: impl FnOnce(&mut Project) -> R
    ) -> Result<R, WorkflowError> {
        let gateway = engine.gateway();
        let mut project: Project = gateway
            .get(project_id)?
            .ok_or_else(|| WorkflowError::NotFound(format!("project {} not found", project_id)))?;
        let result = f(&mut project);
        project.updated_at = chrono::Utc::now();
        gateway.save(&project)?;
        Ok(result)
    }

    fn respond<R>(
        state: &ProjectProcessorState,
        request: &'static str,
        reply: RpcReplyPort<Result<R, WorkflowError>>,
        result: Result<R, WorkflowError>
    ) {
        match &result {
            Ok(_) => {
                event!(Level::DEBUG, event = processor::REQUEST_PROCESSED,
                       project_id = %state.project_id, request = request);
            }
            Err(e) => {
                event!(Level::WARN, event = processor::REQUEST_FAILED,
                       project_id = %state.project_id, request = request, error = %e);
            }
        }

        if let Err(e) = reply.send(result) {
            event!(Level::ERROR, event = processor::REPLY_FAILED,
                   project_id = %state.project_id, request = request, error = %e);
        }
    }
}
