//! Workflow engine facade
//!
//! [`WorkflowEngine`] owns everything that outlives a single request (the
//! handler registry, the gateway and the notifiers). Each call to
//! [`WorkflowEngine::construct`] builds a fresh [`ProjectWorkflow`]: a new
//! context, new handler instances and a new state machine. Nothing survives
//! between requests except the persisted project.
//!
//! Instances of the same project built by one engine share a commit lock, and
//! every fire first checks the instance against the stored project. An
//! instance built before another one recorded a transition fails with
//! [`WorkflowError::Conflict`] instead of overwriting that transition.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError, Weak}
};

use crate::{
    domain::{
        context::{Identity, ProjectContext},
        error::WorkflowError,
        project::Project,
        state::{ProjectState, ProjectTrigger}
    },
    machine::{FireOutcome, StateMachine},
    port::{notification::Notifiers, storage::Gateway},
    registry::{DuplicatePolicy, GraphBuilder},
    workflow::ProjectRegistry
};

pub type ProjectFireOutcome = FireOutcome<ProjectState, ProjectTrigger>;

type CommitLocks = Arc<Mutex<HashMap<String, Weak<Mutex<()>>>>>;

#[derive(Clone)]
pub struct WorkflowEngine {
    registry:     Arc<ProjectRegistry>,
    gateway:      Gateway,
    notifiers:    Notifiers,
    policy:       DuplicatePolicy,
    commit_locks: CommitLocks
}

impl WorkflowEngine {
    pub fn new(registry: Arc<ProjectRegistry>, gateway: Gateway, notifiers: Notifiers) -> Self {
        Self { registry, gateway, notifiers, policy: DuplicatePolicy::default(), commit_locks: CommitLocks::default() }
    }

    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Build a workflow instance for `project`, starting in `initial_state`
    pub fn construct(
        &self,
        workflow: &str,
        project: Project,
        identity: Identity,
        initial_state: ProjectState
    ) -> Result<ProjectWorkflow, WorkflowError> {
        let commit_lock = self.commit_lock(&project.id);
        let context = Arc::new(
            ProjectContext::new(project, self.gateway.clone(), self.notifiers.clone(), identity)
                .with_commit_lock(commit_lock)
        );
        let machine = GraphBuilder::new(&self.registry).with_policy(self.policy).build(
            workflow,
            context.clone(),
            initial_state
        )?;
        Ok(ProjectWorkflow { machine, context })
    }

    /// Build a workflow instance from the persisted project, in its persisted state
    pub fn load(&self, workflow: &str, project_id: &str, identity: Identity) -> Result<ProjectWorkflow, WorkflowError> {
        let project: Project = self
            .gateway
            .get(project_id)?
            .ok_or_else(|| WorkflowError::NotFound(format!("project {} not found", project_id)))?;
        let state = project.state;
        self.construct(workflow, project, identity, state)
    }

    /// Lock shared by every live instance of `project_id`
    ///
    /// Entries are weak so locks of finished instances are dropped; dead
    /// entries are pruned on each lookup.
    fn commit_lock(&self, project_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.commit_locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, lock| lock.strong_count() > 0);

        if let Some(lock) = locks.get(project_id).and_then(Weak::upgrade) {
            return lock;
        }
        let lock = Arc::new(Mutex::new(()));
        locks.insert(project_id.to_string(), Arc::downgrade(&lock));
        lock
    }
}

/// One workflow instance bound to one project and one acting identity
pub struct ProjectWorkflow {
    machine: StateMachine<ProjectState, ProjectTrigger>,
    context: Arc<ProjectContext>
}

impl ProjectWorkflow {
    /// Fire `trigger`; fails with a conflict if the stored project moved on
    pub fn fire(&mut self, trigger: ProjectTrigger) -> Result<ProjectFireOutcome, WorkflowError> {
        self.context.ensure_current()?;
        self.machine.fire(trigger)
    }

    /// Triggers whose guard currently permits a move from the current state
    pub fn available_triggers(&self) -> Vec<ProjectTrigger> {
        self.machine.available_triggers()
    }

    pub fn state(&self) -> ProjectState {
        *self.machine.state()
    }

    pub fn project(&self) -> Project {
        self.context.project()
    }

    pub fn context(&self) -> &ProjectContext {
        &self.context
    }
}
