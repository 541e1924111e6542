//! Project aggregate and the committee sessions it is scheduled to

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tabled::Tabled;
use uuid::Uuid;

use crate::{domain::state::ProjectState, port::storage::Entity};

/// The aggregate under workflow control
///
/// Its persisted `state` is the single source of truth for the current stage;
/// workflow instances are rebuilt from it on every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id:             String,
    pub name:           String,
    /// Current stage of the approval lifecycle
    pub state:          ProjectState,
    /// Contact of the investor that submitted the project
    #[serde(default)]
    pub investor_email: Option<String>,
    /// Pending and completed sub-tasks, tagged with the stage that raised them
    #[serde(default)]
    pub tasks:          Vec<ProjectTask>,
    /// Every recorded transition, oldest first
    #[serde(default)]
    pub history:        Vec<TransitionNote>,
    pub created_at:     DateTime<Utc>,
    pub updated_at:     DateTime<Utc>
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id:             Uuid::new_v4().to_string(),
            name:           name.into(),
            state:          ProjectState::default(),
            investor_email: None,
            tasks:          Vec::new(),
            history:        Vec::new(),
            created_at:     now,
            updated_at:     now
        }
    }

    pub fn with_investor_email(mut self, email: impl Into<String>) -> Self {
        self.investor_email = Some(email.into());
        self
    }

    pub fn with_state(mut self, state: ProjectState) -> Self {
        self.state = state;
        self
    }

    /// Add a pending task raised at `step`, returning its id
    pub fn add_task(&mut self, step: ProjectState, description: impl Into<String>) -> String {
        let task = ProjectTask::new(step, description);
        let id = task.id.clone();
        self.tasks.push(task);
        self.updated_at = Utc::now();
        id
    }

    /// Mark a task complete; returns false if no such task exists
    pub fn complete_task(&mut self, task_id: &str) -> bool {
        match self.tasks.iter_mut().find(|t| t.id == task_id) {
            Some(task) => {
                task.is_complete = true;
                task.completed_at = Some(Utc::now());
                self.updated_at = Utc::now();
                true
            }
            None => false
        }
    }

    /// Whether an incomplete task raised at `step` exists
    pub fn has_open_task(&self, step: ProjectState) -> bool {
        self.tasks.iter().any(|t| t.step == step && !t.is_complete)
    }

    /// Move to `to`, appending a note to the history
    pub fn apply_transition(&mut self, to: ProjectState, note: impl Into<String>, user: impl Into<String>) {
        let now = Utc::now();
        self.history.push(TransitionNote {
            from: self.state,
            to,
            note: note.into(),
            user: user.into(),
            at: now
        });
        self.state = to;
        self.updated_at = now;
    }
}

impl Entity for Project {
    const COLLECTION: &'static str = "projects";

    fn id(&self) -> &str {
        &self.id
    }
}

/// A sub-task that gates further movement (e.g. fixes requested by a committee)
#[derive(Debug, Clone, Serialize, Deserialize, Tabled)]
pub struct ProjectTask {
    #[tabled(rename = "Task ID")]
    pub id:           String,
    /// Stage that raised the task
    #[tabled(rename = "Step")]
    pub step:         ProjectState,
    #[tabled(rename = "Description")]
    pub description:  String,
    #[tabled(rename = "Complete")]
    pub is_complete:  bool,
    #[tabled(skip)]
    pub created_at:   DateTime<Utc>,
    #[tabled(skip)]
    pub completed_at: Option<DateTime<Utc>>
}

impl ProjectTask {
    pub fn new(step: ProjectState, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            step,
            description: description.into(),
            is_complete: false,
            created_at: Utc::now(),
            completed_at: None
        }
    }
}

/// Human-readable record of one transition
#[derive(Debug, Clone, Serialize, Deserialize, Tabled)]
pub struct TransitionNote {
    #[tabled(rename = "From")]
    pub from: ProjectState,
    #[tabled(rename = "To")]
    pub to:   ProjectState,
    #[tabled(rename = "Note")]
    pub note: String,
    #[tabled(rename = "By")]
    pub user: String,
    #[tabled(rename = "At")]
    pub at:   DateTime<Utc>
}

/// Which committee holds a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum CommissionKind {
    /// Investment committee
    Comission,
    /// Execution committee
    Ispolcom
}

/// A scheduled committee session and its docket of projects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commission {
    pub id:          String,
    pub kind:        CommissionKind,
    pub held_at:     DateTime<Utc>,
    #[serde(default)]
    pub project_ids: Vec<String>
}

impl Commission {
    pub fn new(kind: CommissionKind, held_at: DateTime<Utc>) -> Self {
        Self { id: Uuid::new_v4().to_string(), kind, held_at, project_ids: Vec::new() }
    }

    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.held_at > now
    }

    /// Put the project on the docket; returns false if it was already there
    pub fn schedule(&mut self, project_id: &str) -> bool {
        if self.project_ids.iter().any(|id| id == project_id) {
            return false;
        }
        self.project_ids.push(project_id.to_string());
        true
    }
}

impl Entity for Commission {
    const COLLECTION: &'static str = "commissions";

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_open_task_tracking() {
        let mut project = Project::new("Greenfield plant");
        assert!(!project.has_open_task(ProjectState::WaitIspolcomFixes));

        let task_id = project.add_task(ProjectState::WaitIspolcomFixes, "Attach land survey");
        assert!(project.has_open_task(ProjectState::WaitIspolcomFixes));
        assert!(!project.has_open_task(ProjectState::WaitComissionFixes));

        assert!(project.complete_task(&task_id));
        assert!(!project.has_open_task(ProjectState::WaitIspolcomFixes));
        assert!(!project.complete_task("missing"));
    }

    #[test]
    fn test_apply_transition_appends_history() {
        let mut project = Project::new("Logistics hub");
        project.apply_transition(ProjectState::WaitInvolved, "Sent to involved organizations", "admin");

        assert_eq!(project.state, ProjectState::WaitInvolved);
        assert_eq!(project.history.len(), 1);
        assert_eq!(project.history[0].from, ProjectState::Open);
        assert_eq!(project.history[0].to, ProjectState::WaitInvolved);
        assert_eq!(project.history[0].user, "admin");
    }

    #[test]
    fn test_commission_schedule_is_idempotent() {
        let mut commission = Commission::new(CommissionKind::Ispolcom, Utc::now() + Duration::days(3));
        assert!(commission.is_upcoming(Utc::now()));
        assert!(commission.schedule("p-1"));
        assert!(!commission.schedule("p-1"));
        assert_eq!(commission.project_ids, vec!["p-1".to_string()]);
    }
}
