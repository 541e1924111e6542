//! CLI command handlers

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use tabled::{Table, Tabled};

use super::{CommissionCommands, ProjectCommands, TaskCommands};
use crate::{
    actor::WorkflowSystem,
    domain::{
        context::Identity,
        project::{Commission, CommissionKind, Project},
        state::{ProjectState, ProjectTrigger}
    },
    machine::FireOutcome,
    port::storage::Gateway
};

#[derive(Tabled)]
struct ProjectRow {
    #[tabled(rename = "Project ID")]
    id:         String,
    #[tabled(rename = "Name")]
    name:       String,
    #[tabled(rename = "State")]
    state:      ProjectState,
    #[tabled(rename = "Open Tasks")]
    open_tasks: usize
}

impl From<&Project> for ProjectRow {
    fn from(project: &Project) -> Self {
        Self {
            id:         project.id.clone(),
            name:       project.name.clone(),
            state:      project.state,
            open_tasks: project.tasks.iter().filter(|t| !t.is_complete).count()
        }
    }
}

#[derive(Tabled)]
struct CommissionRow {
    #[tabled(rename = "Session ID")]
    id:       String,
    #[tabled(rename = "Kind")]
    kind:     String,
    #[tabled(rename = "Held At")]
    held_at:  DateTime<Utc>,
    #[tabled(rename = "Docket")]
    projects: usize
}

/// Handle project commands
pub fn handle_project_command(gateway: &Gateway, command: &ProjectCommands) -> Result<()> {
    match command {
        ProjectCommands::Create { name, investor_email } => {
            let mut project = Project::new(name.as_str());
            if let Some(email) = investor_email {
                project = project.with_investor_email(email.as_str());
            }
            gateway.save(&project).context("Failed to save project")?;
            println!("Created project {} ({})", project.name, project.id);
        }
        ProjectCommands::Show { project_id } => {
            let project = find_project(gateway, project_id)?;

            println!("{} [{}]", project.name, project.state);
            if let Some(email) = &project.investor_email {
                println!("Investor: {}", email);
            }
            if !project.tasks.is_empty() {
                println!("\nTasks:\n{}", Table::new(&project.tasks));
            }
            if project.history.is_empty() {
                println!("\nNo transitions recorded yet");
            } else {
                println!("\nHistory:\n{}", Table::new(&project.history));
            }
        }
        ProjectCommands::List => {
            let projects: Vec<Project> = gateway.find_all(|_: &Project| true).context("Failed to list projects")?;
            if projects.is_empty() {
                println!("No projects found");
            } else {
                println!("{}", Table::new(projects.iter().map(ProjectRow::from)));
            }
        }
    }

    Ok(())
}

/// Handle task commands; tasks go through the project's processor
pub async fn handle_task_command(system: &WorkflowSystem, command: &TaskCommands) -> Result<()> {
    match command {
        TaskCommands::Add { project_id, step, description } => {
            let task_id = system.add_task(project_id, *step, description.as_str()).await?;
            println!("Added task {} at {}", task_id, step);
        }
        TaskCommands::Complete { project_id, task_id } => {
            if !system.complete_task(project_id, task_id).await? {
                bail!("Task {} not found on project {}", task_id, project_id);
            }
            println!("Completed task {}", task_id);
        }
    }

    Ok(())
}

/// Handle committee session commands
pub fn handle_commission_command(gateway: &Gateway, command: &CommissionCommands) -> Result<()> {
    match command {
        CommissionCommands::Add { kind, held_at } => {
            let commission = Commission::new(*kind, *held_at);
            gateway.save(&commission).context("Failed to save commission")?;
            println!("Scheduled {} session {} at {}", kind_name(*kind), commission.id, held_at.to_rfc3339());
        }
        CommissionCommands::List => {
            let mut commissions: Vec<Commission> =
                gateway.find_all(|_: &Commission| true).context("Failed to list commissions")?;
            commissions.sort_by_key(|c| c.held_at);

            let rows = commissions.iter().map(|c| CommissionRow {
                id:       c.id.clone(),
                kind:     kind_name(c.kind).to_string(),
                held_at:  c.held_at,
                projects: c.project_ids.len()
            });
            println!("{}", Table::new(rows));
        }
    }

    Ok(())
}

/// Print the triggers `identity` may fire on a project
pub async fn handle_triggers_command(system: &WorkflowSystem, project_id: &str, identity: Identity) -> Result<()> {
    let triggers = system.available_triggers(project_id, identity).await?;
    if triggers.is_empty() {
        println!("No triggers available");
    }
    for trigger in triggers {
        println!("  • {}", trigger);
    }
    Ok(())
}

/// Fire a trigger and report the outcome
///
/// A rejected trigger is reported and turned into an error so the process
/// exits non-zero.
pub async fn handle_fire_command(
    system: &WorkflowSystem,
    project_id: &str,
    identity: Identity,
    trigger: ProjectTrigger
) -> Result<()> {
    let outcome = match system.fire(project_id, identity, trigger).await {
        Ok(outcome) => outcome,
        Err(e) if e.is_outcome_unknown() => {
            bail!("{}; run `project show {}` to see whether {} was applied", e, project_id, trigger)
        }
        Err(e) => return Err(e.into())
    };

    match &outcome {
        FireOutcome::Rejected(rejection) if rejection.reason.is_not_implemented() => {
            bail!("{} is not available yet: {}", trigger, rejection.reason)
        }
        FireOutcome::Rejected(rejection) => bail!("{}", rejection),
        _ => println!("{}", outcome)
    }

    Ok(())
}

fn find_project(gateway: &Gateway, project_id: &str) -> Result<Project> {
    gateway
        .get::<Project>(project_id)
        .context("Failed to read project")?
        .with_context(|| format!("Project {} not found", project_id))
}

fn kind_name(kind: CommissionKind) -> &'static str {
    match kind {
        CommissionKind::Comission => "comission",
        CommissionKind::Ispolcom => "ispolcom"
    }
}
