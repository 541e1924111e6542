//! WorkflowManager Actor - routes requests to per-project processors
//!
//! The manager owns one ProjectProcessor per project id, spawning it on the
//! first request for that project. Requests are forwarded with their reply
//! port, so the manager never waits on a processor and projects are handled
//! in parallel while requests for one project queue in its mailbox.
//!
//! The manager counts requests it routed to each processor and processors
//! report back when one is done. Only the manager routes to a processor, so
//! once the count drops to zero its mailbox is empty and it is retired.

use std::collections::HashMap;

use ractor::{Actor, ActorProcessingErr, ActorRef, MessagingErr, SpawnErr};
use tracing::{Level, event};

use crate::{
    actor::{
        message::{ProjectProcessorMessage, WorkflowManagerMessage},
        processor::ProjectProcessor
    },
    domain::{constant::manager, error::WorkflowError},
    service::WorkflowEngine
};

/// A live processor and the number of routed requests it has not finished
struct ProcessorEntry {
    processor: ActorRef<ProjectProcessorMessage>,
    pending:   usize
}

pub struct WorkflowManagerState {
    /// Live processors (project_id -> processor entry)
    processors:         HashMap<String, ProcessorEntry>,
    engine:             WorkflowEngine,
    workflow:           String,
    /// Total processors spawned since start
    processors_spawned: u64
}

/// WorkflowManager Actor
pub struct WorkflowManager;

#[async_trait::async_trait]
impl Actor for WorkflowManager {
    type Arguments = (WorkflowEngine, String);
    type Msg = WorkflowManagerMessage;
    type State = WorkflowManagerState;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        (engine, workflow): Self::Arguments
    ) -> Result<Self::State, ActorProcessingErr> {
        event!(Level::DEBUG, event = manager::MANAGER_STARTED, workflow = %workflow);
        Ok(WorkflowManagerState { processors: HashMap::new(), engine, workflow, processors_spawned: 0 })
    }

    async fn post_stop(&self, _myself: ActorRef<Self::Msg>, state: &mut Self::State) -> Result<(), ActorProcessingErr> {
        for (project_id, entry) in state.processors.drain() {
            entry.processor.stop(None);
            event!(Level::DEBUG, event = manager::PROCESSOR_STOPPED, project_id = %project_id);
        }
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State
    ) -> Result<(), ActorProcessingErr> {
        match message {
            WorkflowManagerMessage::Route { project_id, request } => {
                self.handle_route(myself, project_id, request, state).await;
            }
            WorkflowManagerMessage::RequestDone { project_id } => {
                Self::handle_request_done(project_id, state);
            }
            WorkflowManagerMessage::ActiveProcessors { reply } => {
                if let Err(e) = reply.send(state.processors.len()) {
                    event!(Level::ERROR, event = manager::REPLY_FAILED, request = "active_processors", error = %e);
                }
            }
        }
        Ok(())
    }
}

impl WorkflowManager {
    async fn handle_route(
        &self,
        myself: ActorRef<WorkflowManagerMessage>,
        project_id: String,
        request: ProjectProcessorMessage,
        state: &mut WorkflowManagerState
    ) {
        event!(Level::DEBUG, event = manager::REQUEST_ROUTED, project_id = %project_id, request = request.name());

        if !state.processors.contains_key(&project_id) {
            match self.spawn_processor(myself, &project_id, state).await {
                Ok(processor) => {
                    state.processors.insert(project_id.clone(), ProcessorEntry { processor, pending: 0 });
                }
                Err(e) => {
                    event!(Level::ERROR, event = manager::PROCESSOR_SPAWN_FAILED, project_id = %project_id, error = %e);
                    Self::reject(request, WorkflowError::from(e));
                    return;
                }
            }
        }

        let Some(entry) = state.processors.get_mut(&project_id) else {
            return;
        };
        match entry.processor.cast(request) {
            Ok(()) => entry.pending += 1,
            Err(e) => {
                event!(Level::ERROR, event = manager::ROUTE_FAILED, project_id = %project_id, error = %e);
                state.processors.remove(&project_id);
                if let MessagingErr::SendErr(request) = e {
                    Self::reject(request, WorkflowError::Actor(format!("processor for project {} is gone", project_id)));
                }
            }
        }
    }

    /// Retire the processor once every request routed to it is finished
    fn handle_request_done(project_id: String, state: &mut WorkflowManagerState) {
        let Some(entry) = state.processors.get_mut(&project_id) else {
            return;
        };
        entry.pending = entry.pending.saturating_sub(1);
        if entry.pending > 0 {
            return;
        }

        if let Some(entry) = state.processors.remove(&project_id) {
            entry.processor.stop(None);
            event!(Level::DEBUG, event = manager::PROCESSOR_RETIRED, project_id = %project_id);
        }
    }

    async fn spawn_processor(
        &self,
        myself: ActorRef<WorkflowManagerMessage>,
        project_id: &str,
        state: &mut WorkflowManagerState
    ) -> Result<ActorRef<ProjectProcessorMessage>, SpawnErr> {
        let (processor, _handle) = Actor::spawn(
            None,
            ProjectProcessor,
            (project_id.to_string(), state.workflow.clone(), state.engine.clone(), myself)
        )
        .await?;

        state.processors_spawned += 1;
        event!(Level::DEBUG, event = manager::PROCESSOR_SPAWNED,
               project_id = %project_id, total_spawned = %state.processors_spawned);

        Ok(processor)
    }

    /// Answer a request that never reached a processor
    fn reject(request: ProjectProcessorMessage, error: WorkflowError) {
        let name = request.name();
        let sent = match request {
            ProjectProcessorMessage::Fire { reply, .. } => reply.send(Err(error)).is_ok(),
            ProjectProcessorMessage::AvailableTriggers { reply, .. } => reply.send(Err(error)).is_ok(),
            ProjectProcessorMessage::AddTask { reply, .. } => reply.send(Err(error)).is_ok(),
            ProjectProcessorMessage::CompleteTask { reply, .. } => reply.send(Err(error)).is_ok()
        };
        if !sent {
            event!(Level::ERROR, event = manager::REPLY_FAILED, request = name);
        }
    }
}
