//! Handle to the running actor system
//!
//! [`WorkflowSystem`] is the entry point callers use instead of building
//! workflows themselves: every request names a project id and is routed to
//! the processor that owns it.

use std::time::Duration;

use ractor::{
    Actor, ActorRef, RpcReplyPort,
    rpc::{CallResult, call}
};
use tokio::task::JoinHandle;
use tracing::{Level, event};

use crate::{
    actor::{
        manager::WorkflowManager,
        message::{ProjectProcessorMessage, WorkflowManagerMessage}
    },
    domain::{
        constant::system,
        context::Identity,
        error::WorkflowError,
        state::{ProjectState, ProjectTrigger}
    },
    service::{ProjectFireOutcome, WorkflowEngine}
};

pub struct WorkflowSystem {
    manager: ActorRef<WorkflowManagerMessage>,
    handle:  JoinHandle<()>,
    timeout: Duration
}

impl WorkflowSystem {
    /// Spawn the manager for `workflow`
    pub async fn start(
        engine: WorkflowEngine,
        workflow: impl Into<String>,
        timeout: Duration
    ) -> Result<Self, WorkflowError> {
        let workflow = workflow.into();
        let (manager, handle) = Actor::spawn(None, WorkflowManager, (engine, workflow.clone())).await?;
        event!(Level::INFO, event = system::SYSTEM_STARTED, workflow = %workflow, timeout_ms = timeout.as_millis() as u64);
        Ok(Self { manager, handle, timeout })
    }

    /// Fire `trigger` on the project as `identity`
    ///
    /// A timeout does not cancel the request: it stays queued on the project's
    /// processor and may still be applied. That case is reported as
    /// [`WorkflowError::OutcomeUnknown`] so callers reload the project before
    /// retrying.
    pub async fn fire(
        &self,
        project_id: &str,
        identity: Identity,
        trigger: ProjectTrigger
    ) -> Result<ProjectFireOutcome, WorkflowError> {
        self.request(project_id, |reply| ProjectProcessorMessage::Fire { identity, trigger, reply }).await
    }

    pub async fn available_triggers(
        &self,
        project_id: &str,
        identity: Identity
    ) -> Result<Vec<ProjectTrigger>, WorkflowError> {
        self.request(project_id, |reply| ProjectProcessorMessage::AvailableTriggers { identity, reply }).await
    }

    pub async fn add_task(
        &self,
        project_id: &str,
        step: ProjectState,
        description: impl Into<String>
    ) -> Result<String, WorkflowError> {
        let description = description.into();
        self.request(project_id, |reply| ProjectProcessorMessage::AddTask { step, description, reply }).await
    }

    pub async fn complete_task(&self, project_id: &str, task_id: &str) -> Result<bool, WorkflowError> {
        let task_id = task_id.to_string();
        self.request(project_id, |reply| ProjectProcessorMessage::CompleteTask { task_id, reply }).await
    }

    pub async fn active_processors(&self) -> Result<usize, WorkflowError> {
        match call(&self.manager, |reply| WorkflowManagerMessage::ActiveProcessors { reply }, Some(self.timeout)).await {
            Ok(CallResult::Success(count)) => Ok(count),
            Ok(CallResult::Timeout) => Err(WorkflowError::Timeout("active processors".to_string())),
            Ok(CallResult::SenderError) => Err(WorkflowError::Actor("manager dropped the reply".to_string())),
            Err(e) => Err(WorkflowError::Actor(e.to_string()))
        }
    }

    /// Stop the manager and its processors and wait for them to exit
    pub async fn shutdown(self) -> Result<(), WorkflowError> {
        self.manager.stop(None);
        self.handle.await.map_err(|e| WorkflowError::Actor(format!("Failed to join manager: {}", e)))?;
        event!(Level::INFO, event = system::SYSTEM_SHUTDOWN);
        Ok(())
    }

    async fn request<R, F>(&self, project_id: &str, build: F) -> Result<R, WorkflowError>
    where
        R: Send + 'static,
        F: FnOnce(RpcReplyPort<Result<R, WorkflowError>>) -> ProjectProcessorMessage
    {
        let route = |reply: RpcReplyPort<Result<R, WorkflowError>>| WorkflowManagerMessage::Route {
            project_id: project_id.to_string(),
            request:    build(reply)
        };

        let failure = match call(&self.manager, route, Some(self.timeout)).await {
            Ok(CallResult::Success(result)) => return result,
            Ok(CallResult::Timeout) => WorkflowError::OutcomeUnknown(format!(
                "project {} did not answer within {:?}",
                project_id, self.timeout
            )),
            Ok(CallResult::SenderError) => WorkflowError::Actor(format!("project {} dropped the reply", project_id)),
            Err(e) => WorkflowError::Actor(e.to_string())
        };

        event!(Level::ERROR, event = system::CALL_FAILED, project_id = %project_id, error = %failure);
        Err(failure)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        adapter::storage::InMemoryDocumentStore,
        domain::{constant::APPROVAL_WORKFLOW, project::Project},
        machine::FireOutcome,
        port::{
            notification::{NotificationKind, Notifier, Notifiers},
            storage::Gateway
        },
        workflow::approval_registry
    };

    struct Silent;

    impl Notifier for Silent {
        fn notify(
            &self,
            _kind: NotificationKind,
            _project: &Project,
            _extra: &serde_json::Value
        ) -> Result<(), WorkflowError> {
            Ok(())
        }
    }

    async fn start() -> (WorkflowSystem, Gateway) {
        start_with_timeout(Duration::from_secs(5)).await
    }

    async fn start_with_timeout(timeout: Duration) -> (WorkflowSystem, Gateway) {
        let gateway = Gateway::new(Arc::new(InMemoryDocumentStore::new()));
        let engine = WorkflowEngine::new(Arc::new(approval_registry()), gateway.clone(), Notifiers::shared(Arc::new(Silent)));
        let system = WorkflowSystem::start(engine, APPROVAL_WORKFLOW, timeout).await.unwrap();
        (system, gateway)
    }

    async fn wait_for_idle(system: &WorkflowSystem) -> usize {
        let mut active = system.active_processors().await.unwrap();
        for _ in 0..50 {
            if active == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            active = system.active_processors().await.unwrap();
        }
        active
    }

    fn admin() -> Identity {
        Identity::new("admin", ["Admin"])
    }

    #[tokio::test]
    async fn test_concurrent_fires_on_one_project_are_serialized() {
        let (system, gateway) = start().await;
        let project = Project::new("Brickworks").with_state(ProjectState::PlanCreating);
        gateway.save(&project).unwrap();

        let (first, second) = tokio::join!(
            system.fire(&project.id, admin(), ProjectTrigger::ApprovePlan),
            system.fire(&project.id, admin(), ProjectTrigger::ApprovePlan)
        );
        let outcomes = [first.unwrap(), second.unwrap()];

        assert_eq!(outcomes.iter().filter(|o| o.is_accepted()).count(), 1);
        let stored: Project = gateway.get(&project.id).unwrap().unwrap();
        assert_eq!(stored.state, ProjectState::Realization);
        assert_eq!(stored.history.len(), 1);

        system.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_each_project_gets_its_own_processor() {
        let (system, gateway) = start().await;
        let first = Project::new("Greenhouse");
        let second = Project::new("Creamery");
        gateway.save(&first).unwrap();
        gateway.save(&second).unwrap();

        let moved = system.fire(&first.id, admin(), ProjectTrigger::ToWaitInvolved).await.unwrap();
        assert!(matches!(moved, FireOutcome::Transitioned { to: ProjectState::WaitInvolved, .. }));
        let triggers = system.available_triggers(&second.id, admin()).await.unwrap();
        assert_eq!(triggers, vec![ProjectTrigger::ToWaitInvolved]);

        let stored: Project = gateway.get(&first.id).unwrap().unwrap();
        assert_eq!(stored.state, ProjectState::WaitInvolved);
        system.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_processors_retire_once_requests_finish() {
        let (system, gateway) = start().await;
        let projects: Vec<Project> = ["Greenhouse", "Creamery", "Sawmill"].into_iter().map(Project::new).collect();
        for project in &projects {
            gateway.save(project).unwrap();
        }

        for project in &projects {
            system.fire(&project.id, admin(), ProjectTrigger::ToWaitInvolved).await.unwrap();
            system.available_triggers(&project.id, admin()).await.unwrap();
        }
        assert_eq!(wait_for_idle(&system).await, 0);

        // A retired project gets a fresh processor on its next request
        let triggers = system.available_triggers(&projects[0].id, admin()).await.unwrap();
        assert!(!triggers.contains(&ProjectTrigger::ToWaitInvolved));
        assert_eq!(wait_for_idle(&system).await, 0);

        system.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_fire_timeout_reports_unknown_outcome() {
        let (system, gateway) = start_with_timeout(Duration::from_nanos(1)).await;
        let project = Project::new("Tannery");
        gateway.save(&project).unwrap();

        let result = system.fire(&project.id, admin(), ProjectTrigger::ToWaitInvolved).await;
        assert!(matches!(result, Err(WorkflowError::OutcomeUnknown(_))));

        // The queued fire is still applied after the caller gave up
        let mut stored: Project = gateway.get(&project.id).unwrap().unwrap();
        for _ in 0..50 {
            if stored.state == ProjectState::WaitInvolved {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            stored = gateway.get(&project.id).unwrap().unwrap();
        }
        assert_eq!(stored.state, ProjectState::WaitInvolved);

        system.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_tasks_gate_transitions_through_the_processor() {
        let (system, gateway) = start().await;
        let project = Project::new("Foundry").with_state(ProjectState::OnIspolcom);
        gateway.save(&project).unwrap();

        let task_id = system.add_task(&project.id, ProjectState::WaitIspolcomFixes, "Fix the budget").await.unwrap();
        let blocked = system.fire(&project.id, admin(), ProjectTrigger::ToMinEconomy).await.unwrap();
        assert!(!blocked.is_accepted());

        assert!(system.complete_task(&project.id, &task_id).await.unwrap());
        let moved = system.fire(&project.id, admin(), ProjectTrigger::ToMinEconomy).await.unwrap();
        assert!(moved.is_accepted());

        system.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_project_is_not_found() {
        let (system, _gateway) = start().await;
        let result = system.fire("missing", admin(), ProjectTrigger::ToWaitInvolved).await;
        assert!(matches!(result, Err(WorkflowError::NotFound(_))));
        system.shutdown().await.unwrap();
    }
}
