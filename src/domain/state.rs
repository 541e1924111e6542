//! Business stages and triggers of the project approval workflow
//!
//! Both enums are plain identities: the transition graph between them is not
//! hard-wired here but assembled from the handlers registered in
//! [`crate::workflow`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stage of a project in the approval lifecycle
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize, clap::ValueEnum
)]
pub enum ProjectState {
    /// Submitted, not yet picked up by the administration
    #[default]
    Open,
    /// Waiting for the involved organizations to respond
    WaitInvolved,
    /// Scheduled to the committee (comission) docket
    OnComission,
    /// Committee asked for fixes
    WaitComissionFixes,
    /// Scheduled to the execution committee (ispolcom) docket
    OnIspolcom,
    /// Execution committee asked for fixes
    WaitIspolcomFixes,
    /// Under review at the ministry of economy
    InMinEconomy,
    /// Realization plan is being drafted
    PlanCreating,
    /// Plan approved, project is being realized
    Realization,
    /// Terminal stage
    Done
}

impl ProjectState {
    pub const ALL: [ProjectState; 10] = [
        ProjectState::Open,
        ProjectState::WaitInvolved,
        ProjectState::OnComission,
        ProjectState::WaitComissionFixes,
        ProjectState::OnIspolcom,
        ProjectState::WaitIspolcomFixes,
        ProjectState::InMinEconomy,
        ProjectState::PlanCreating,
        ProjectState::Realization,
        ProjectState::Done
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProjectState::Done)
    }
}

impl fmt::Display for ProjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Intent to move a project to another stage
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum
)]
pub enum ProjectTrigger {
    ToWaitInvolved,
    UpdateInvolved,
    ToComission,
    ToComissionFix,
    UpdateComissionFix,
    ToIspolcom,
    ToIspolcomFix,
    ToMinEconomy,
    ToPlanCreating,
    UpdatePlan,
    ApprovePlan,
    Complete
}

impl fmt::Display for ProjectTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_variant_name() {
        assert_eq!(ProjectState::WaitIspolcomFixes.to_string(), "WaitIspolcomFixes");
        assert_eq!(ProjectTrigger::ToMinEconomy.to_string(), "ToMinEconomy");
    }

    #[test]
    fn test_serde_uses_variant_names() {
        let json = serde_json::to_string(&ProjectState::InMinEconomy).unwrap();
        assert_eq!(json, "\"InMinEconomy\"");

        let trigger: ProjectTrigger = serde_json::from_str("\"ApprovePlan\"").unwrap();
        assert_eq!(trigger, ProjectTrigger::ApprovePlan);
    }

    #[test]
    fn test_only_done_is_terminal() {
        let terminal: Vec<_> = ProjectState::ALL.iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal, vec![&ProjectState::Done]);
    }
}
