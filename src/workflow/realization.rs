//! Economic review, plan drafting and realization

use std::sync::Arc;

use serde_json::Value;

use super::{ProjectHandlerSpec, is_admin, not_implemented};
use crate::{
    domain::{
        constant::{APPROVAL_WORKFLOW, role},
        context::ProjectContext,
        error::WorkflowError,
        state::{ProjectState, ProjectTrigger}
    },
    machine::GuardResult,
    port::notification::{Audience, NotificationKind},
    registry::UnitOfWork
};

pub struct InMinEconomy {
    context: Arc<ProjectContext>
}

impl InMinEconomy {
    pub fn spec() -> ProjectHandlerSpec<Self> {
        ProjectHandlerSpec::new("InMinEconomy", APPROVAL_WORKFLOW, ProjectState::InMinEconomy).trigger(
            APPROVAL_WORKFLOW,
            ProjectTrigger::ToPlanCreating,
            ProjectState::InMinEconomy,
            ProjectState::PlanCreating,
            Self::could_to_plan_creating
        )
    }

    fn could_to_plan_creating(&self) -> GuardResult {
        Ok(self.context.has_any_role(&[role::ADMIN, role::MIN_ECONOMY]))
    }
}

impl UnitOfWork<ProjectContext> for InMinEconomy {
    fn new(context: Arc<ProjectContext>) -> Self {
        Self { context }
    }

    fn on_entry(&self) -> Result<(), WorkflowError> {
        self.context.notify(Audience::Admin, NotificationKind::InMinEconomy, Value::Null);
        self.context.notify(Audience::Investor, NotificationKind::InMinEconomy, Value::Null);
        self.context.record_transition(ProjectState::InMinEconomy, "Passed to the ministry of economy")
    }
}

pub struct PlanCreating {
    context: Arc<ProjectContext>
}

impl PlanCreating {
    pub fn spec() -> ProjectHandlerSpec<Self> {
        ProjectHandlerSpec::new("PlanCreating", APPROVAL_WORKFLOW, ProjectState::PlanCreating)
            .trigger(
                APPROVAL_WORKFLOW,
                ProjectTrigger::UpdatePlan,
                ProjectState::PlanCreating,
                ProjectState::PlanCreating,
                Self::could_update_plan
            )
            .trigger(
                APPROVAL_WORKFLOW,
                ProjectTrigger::ApprovePlan,
                ProjectState::PlanCreating,
                ProjectState::Realization,
                Self::could_approve_plan
            )
    }

    fn could_update_plan(&self) -> GuardResult {
        Ok(self.context.has_any_role(&[role::ADMIN, role::INVESTOR]))
    }

    fn could_approve_plan(&self) -> GuardResult {
        Ok(is_admin(&self.context))
    }
}

impl UnitOfWork<ProjectContext> for PlanCreating {
    fn new(context: Arc<ProjectContext>) -> Self {
        Self { context }
    }

    fn on_entry(&self) -> Result<(), WorkflowError> {
        if self.context.state() == ProjectState::PlanCreating {
            self.context.notify(Audience::Admin, NotificationKind::PlanUpdated, Value::Null);
            return self.context.record_transition(ProjectState::PlanCreating, "Realization plan updated");
        }

        self.context.notify(Audience::Investor, NotificationKind::PlanCreating, Value::Null);
        self.context.record_transition(ProjectState::PlanCreating, "Realization plan requested")
    }
}

pub struct Realization {
    context: Arc<ProjectContext>
}

impl Realization {
    pub fn spec() -> ProjectHandlerSpec<Self> {
        ProjectHandlerSpec::new("Realization", APPROVAL_WORKFLOW, ProjectState::Realization).trigger(
            APPROVAL_WORKFLOW,
            ProjectTrigger::Complete,
            ProjectState::Realization,
            ProjectState::Done,
            Self::could_complete
        )
    }

    fn could_complete(&self) -> GuardResult {
        not_implemented("completing a project in realization")
    }
}

impl UnitOfWork<ProjectContext> for Realization {
    fn new(context: Arc<ProjectContext>) -> Self {
        Self { context }
    }

    fn on_entry(&self) -> Result<(), WorkflowError> {
        self.context.notify(Audience::Investor, NotificationKind::Realization, Value::Null);
        self.context.record_transition(ProjectState::Realization, "Realization plan approved")
    }
}

pub struct Done {
    context: Arc<ProjectContext>
}

impl Done {
    pub fn spec() -> ProjectHandlerSpec<Self> {
        ProjectHandlerSpec::new("Done", APPROVAL_WORKFLOW, ProjectState::Done)
    }
}

impl UnitOfWork<ProjectContext> for Done {
    fn new(context: Arc<ProjectContext>) -> Self {
        Self { context }
    }

    fn on_entry(&self) -> Result<(), WorkflowError> {
        self.context.notify(Audience::Admin, NotificationKind::Done, Value::Null);
        self.context.notify(Audience::Investor, NotificationKind::Done, Value::Null);
        self.context.record_transition(ProjectState::Done, "Project completed")
    }
}
