//! The "Approval" workflow
//!
//! One handler per business stage. Handlers are grouped by the phase of the
//! lifecycle they belong to and registered in [`approval_registry`]; the
//! registration order below is the guard evaluation order of the graph.

pub mod comission;
pub mod ispolcom;
pub mod realization;
pub mod submission;

use crate::{
    domain::{
        constant::role,
        context::ProjectContext,
        error::WorkflowError,
        project::CommissionKind,
        state::{ProjectState, ProjectTrigger}
    },
    machine::GuardResult,
    registry::{HandlerRegistry, HandlerSpec}
};

/// Registry of project workflow handlers
pub type ProjectRegistry = HandlerRegistry<ProjectState, ProjectTrigger, ProjectContext>;

/// Declarative description of one project workflow handler
pub type ProjectHandlerSpec<H> = HandlerSpec<ProjectState, ProjectTrigger, ProjectContext, H>;

/// Every handler of the "Approval" workflow
pub fn approval_registry() -> ProjectRegistry {
    let mut registry = ProjectRegistry::new();
    registry
        .register(submission::Open::spec())
        .register(submission::WaitInvolved::spec())
        .register(comission::OnComission::spec())
        .register(comission::WaitComissionFixes::spec())
        .register(ispolcom::OnIspolcom::spec())
        .register(ispolcom::WaitIspolcomFixes::spec())
        .register(realization::InMinEconomy::spec())
        .register(realization::PlanCreating::spec())
        .register(realization::Realization::spec())
        .register(realization::Done::spec());
    registry
}

fn is_admin(context: &ProjectContext) -> bool {
    context.has_role(role::ADMIN)
}

/// Admin, and no incomplete task raised at `step`
fn admin_without_open_task(context: &ProjectContext, step: ProjectState) -> bool {
    is_admin(context) && !context.has_open_task(step)
}

/// Admin, and an incomplete task raised at `step`
fn admin_with_open_task(context: &ProjectContext, step: ProjectState) -> bool {
    is_admin(context) && context.has_open_task(step)
}

fn has_upcoming(context: &ProjectContext, kind: CommissionKind) -> GuardResult {
    context.upcoming_commission(kind).map(|found| found.is_some())
}

fn not_implemented(what: &str) -> GuardResult {
    Err(WorkflowError::NotImplemented(what.to_string()))
}

