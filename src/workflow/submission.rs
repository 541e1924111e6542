//! Submission phase: a new project and the round of involved organizations

use std::sync::Arc;

use serde_json::Value;

use super::{ProjectHandlerSpec, admin_without_open_task, has_upcoming, is_admin};
use crate::{
    domain::{
        constant::{APPROVAL_WORKFLOW, role},
        context::ProjectContext,
        error::WorkflowError,
        project::CommissionKind,
        state::{ProjectState, ProjectTrigger}
    },
    machine::GuardResult,
    port::notification::{Audience, NotificationKind},
    registry::UnitOfWork
};

pub struct Open {
    context: Arc<ProjectContext>
}

impl Open {
    pub fn spec() -> ProjectHandlerSpec<Self> {
        ProjectHandlerSpec::new("Open", APPROVAL_WORKFLOW, ProjectState::Open).trigger(
            APPROVAL_WORKFLOW,
            ProjectTrigger::ToWaitInvolved,
            ProjectState::Open,
            ProjectState::WaitInvolved,
            Self::could_to_wait_involved
        )
    }

    fn could_to_wait_involved(&self) -> GuardResult {
        Ok(is_admin(&self.context))
    }
}

impl UnitOfWork<ProjectContext> for Open {
    fn new(context: Arc<ProjectContext>) -> Self {
        Self { context }
    }

    fn on_entry(&self) -> Result<(), WorkflowError> {
        self.context.record_transition(ProjectState::Open, "Project opened")
    }
}

pub struct WaitInvolved {
    context: Arc<ProjectContext>
}

impl WaitInvolved {
    pub fn spec() -> ProjectHandlerSpec<Self> {
        ProjectHandlerSpec::new("WaitInvolved", APPROVAL_WORKFLOW, ProjectState::WaitInvolved)
            .trigger(
                APPROVAL_WORKFLOW,
                ProjectTrigger::UpdateInvolved,
                ProjectState::WaitInvolved,
                ProjectState::WaitInvolved,
                Self::could_update_involved
            )
            .trigger(
                APPROVAL_WORKFLOW,
                ProjectTrigger::ToComission,
                ProjectState::WaitInvolved,
                ProjectState::OnComission,
                Self::could_to_comission
            )
    }

    fn could_update_involved(&self) -> GuardResult {
        Ok(self.context.has_any_role(&[role::ADMIN, role::INVOLVED]))
    }

    /// Every involved organization answered and a committee session is planned
    fn could_to_comission(&self) -> GuardResult {
        if !admin_without_open_task(&self.context, ProjectState::WaitInvolved) {
            return Ok(false);
        }
        has_upcoming(&self.context, CommissionKind::Comission)
    }
}

impl UnitOfWork<ProjectContext> for WaitInvolved {
    fn new(context: Arc<ProjectContext>) -> Self {
        Self { context }
    }

    fn on_entry(&self) -> Result<(), WorkflowError> {
        if self.context.state() == ProjectState::WaitInvolved {
            self.context.notify(Audience::Admin, NotificationKind::InvolvedUpdated, Value::Null);
            return self.context.record_transition(ProjectState::WaitInvolved, "Involved organizations responded");
        }

        self.context.notify(Audience::Admin, NotificationKind::WaitInvolved, Value::Null);
        self.context.notify_user(NotificationKind::WaitInvolved);
        self.context.record_transition(ProjectState::WaitInvolved, "Sent to involved organizations")
    }
}
