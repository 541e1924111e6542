//! Investment committee (comission) review and the fixes it may request

use std::sync::Arc;

use serde_json::{Value, json};

use super::{ProjectHandlerSpec, admin_with_open_task, admin_without_open_task, has_upcoming};
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

pub struct OnComission {
    context: Arc<ProjectContext>
}

impl OnComission {
    pub fn spec() -> ProjectHandlerSpec<Self> {
        ProjectHandlerSpec::new("OnComission", APPROVAL_WORKFLOW, ProjectState::OnComission)
            .trigger(
                APPROVAL_WORKFLOW,
                ProjectTrigger::ToComissionFix,
                ProjectState::OnComission,
                ProjectState::WaitComissionFixes,
                Self::could_to_comission_fix
            )
            .trigger(
                APPROVAL_WORKFLOW,
                ProjectTrigger::ToIspolcom,
                ProjectState::OnComission,
                ProjectState::OnIspolcom,
                Self::could_to_ispolcom
            )
    }

    fn could_to_comission_fix(&self) -> GuardResult {
        Ok(admin_with_open_task(&self.context, ProjectState::WaitComissionFixes))
    }

    fn could_to_ispolcom(&self) -> GuardResult {
        if !admin_without_open_task(&self.context, ProjectState::WaitComissionFixes) {
            return Ok(false);
        }
        has_upcoming(&self.context, CommissionKind::Ispolcom)
    }
}

impl UnitOfWork<ProjectContext> for OnComission {
    fn new(context: Arc<ProjectContext>) -> Self {
        Self { context }
    }

    fn on_entry(&self) -> Result<(), WorkflowError> {
        let commission = self.context.schedule_to_next(CommissionKind::Comission)?;
        let extra = json!({ "commission_id": commission.id, "held_at": commission.held_at.to_rfc3339() });

        self.context.notify(Audience::Admin, NotificationKind::OnComission, extra.clone());
        self.context.notify(Audience::Investor, NotificationKind::OnComission, extra);
        self.context.record_transition(ProjectState::OnComission, "Scheduled to the committee")
    }
}

pub struct WaitComissionFixes {
    context: Arc<ProjectContext>
}

impl WaitComissionFixes {
    pub fn spec() -> ProjectHandlerSpec<Self> {
        ProjectHandlerSpec::new("WaitComissionFixes", APPROVAL_WORKFLOW, ProjectState::WaitComissionFixes)
            .trigger(
                APPROVAL_WORKFLOW,
                ProjectTrigger::UpdateComissionFix,
                ProjectState::WaitComissionFixes,
                ProjectState::WaitComissionFixes,
                Self::could_update_comission_fix
            )
            .trigger(
                APPROVAL_WORKFLOW,
                ProjectTrigger::ToComission,
                ProjectState::WaitComissionFixes,
                ProjectState::OnComission,
                Self::could_to_comission
            )
    }

    fn could_update_comission_fix(&self) -> GuardResult {
        Ok(self.context.has_any_role(&[role::ADMIN, role::INVESTOR]))
    }

    fn could_to_comission(&self) -> GuardResult {
        if !admin_without_open_task(&self.context, ProjectState::WaitComissionFixes) {
            return Ok(false);
        }
        has_upcoming(&self.context, CommissionKind::Comission)
    }
}

impl UnitOfWork<ProjectContext> for WaitComissionFixes {
    fn new(context: Arc<ProjectContext>) -> Self {
        Self { context }
    }

    fn on_entry(&self) -> Result<(), WorkflowError> {
        if self.context.state() == ProjectState::WaitComissionFixes {
            self.context.notify(Audience::Admin, NotificationKind::ComissionFixUpdated, Value::Null);
            return self.context.record_transition(ProjectState::WaitComissionFixes, "Committee fixes updated");
        }

        self.context.notify(Audience::Investor, NotificationKind::ComissionFixRequested, Value::Null);
        self.context.record_transition(ProjectState::WaitComissionFixes, "Committee requested fixes")
    }
}
