//! Execution committee (ispolcom) review and the fixes it may request

use std::sync::Arc;

use serde_json::{Value, json};

use super::{ProjectHandlerSpec, admin_with_open_task, admin_without_open_task, has_upcoming};
use crate::{
    domain::{
        constant::APPROVAL_WORKFLOW,
        context::ProjectContext,
        error::WorkflowError,
        project::CommissionKind,
        state::{ProjectState, ProjectTrigger}
    },
    machine::GuardResult,
    port::notification::{Audience, NotificationKind},
    registry::UnitOfWork
};

pub struct OnIspolcom {
    context: Arc<ProjectContext>
}

impl OnIspolcom {
    pub fn spec() -> ProjectHandlerSpec<Self> {
        ProjectHandlerSpec::new("OnIspolcom", APPROVAL_WORKFLOW, ProjectState::OnIspolcom)
            .trigger(
                APPROVAL_WORKFLOW,
                ProjectTrigger::ToMinEconomy,
                ProjectState::OnIspolcom,
                ProjectState::InMinEconomy,
                Self::could_to_min_economy
            )
            .trigger(
                APPROVAL_WORKFLOW,
                ProjectTrigger::ToIspolcomFix,
                ProjectState::OnIspolcom,
                ProjectState::WaitIspolcomFixes,
                Self::could_to_ispolcom_fix
            )
    }

    /// May advance to economic review only without outstanding execution-committee fixes
    fn could_to_min_economy(&self) -> GuardResult {
        Ok(admin_without_open_task(&self.context, ProjectState::WaitIspolcomFixes))
    }

    fn could_to_ispolcom_fix(&self) -> GuardResult {
        Ok(admin_with_open_task(&self.context, ProjectState::WaitIspolcomFixes))
    }
}

impl UnitOfWork<ProjectContext> for OnIspolcom {
    fn new(context: Arc<ProjectContext>) -> Self {
        Self { context }
    }

    fn on_entry(&self) -> Result<(), WorkflowError> {
        let commission = self.context.schedule_to_next(CommissionKind::Ispolcom)?;
        let extra = json!({ "commission_id": commission.id, "held_at": commission.held_at.to_rfc3339() });

        self.context.notify(Audience::Admin, NotificationKind::OnIspolcom, extra.clone());
        self.context.notify(Audience::Investor, NotificationKind::OnIspolcom, extra);
        self.context.record_transition(ProjectState::OnIspolcom, "Scheduled to the execution committee")
    }
}

pub struct WaitIspolcomFixes {
    context: Arc<ProjectContext>
}

impl WaitIspolcomFixes {
    pub fn spec() -> ProjectHandlerSpec<Self> {
        ProjectHandlerSpec::new("WaitIspolcomFixes", APPROVAL_WORKFLOW, ProjectState::WaitIspolcomFixes).trigger(
            APPROVAL_WORKFLOW,
            ProjectTrigger::ToIspolcom,
            ProjectState::WaitIspolcomFixes,
            ProjectState::OnIspolcom,
            Self::could_to_ispolcom
        )
    }

    /// Fixes are done and an execution committee session is planned
    fn could_to_ispolcom(&self) -> GuardResult {
        if !admin_without_open_task(&self.context, ProjectState::WaitIspolcomFixes) {
            return Ok(false);
        }
        has_upcoming(&self.context, CommissionKind::Ispolcom)
    }
}

impl UnitOfWork<ProjectContext> for WaitIspolcomFixes {
    fn new(context: Arc<ProjectContext>) -> Self {
        Self { context }
    }

    fn on_entry(&self) -> Result<(), WorkflowError> {
        self.context.notify(Audience::Investor, NotificationKind::IspolcomFixRequested, Value::Null);
        self.context.record_transition(ProjectState::WaitIspolcomFixes, "Execution committee requested fixes")
    }
}
