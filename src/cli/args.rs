//! CLI argument parsing

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use crate::domain::{
    project::CommissionKind,
    state::{ProjectState, ProjectTrigger}
};

#[derive(Parser, Debug)]
#[command(name = "invest-wf", author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Acting user recorded in the transition history
    #[arg(long, global = true, default_value_t = whoami::username().unwrap_or_else(|_| "unknown".to_string()))]
    pub user: String,

    /// Role held by the acting user; repeat for several roles
    #[arg(long = "role", global = true, value_name = "ROLE")]
    pub roles: Vec<String>,

    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Project management commands
    Project {
        #[command(subcommand)]
        command: ProjectCommands
    },
    /// Sub-tasks that gate a project's movement
    Task {
        #[command(subcommand)]
        command: TaskCommands
    },
    /// Committee session commands
    Commission {
        #[command(subcommand)]
        command: CommissionCommands
    },
    /// List the triggers the acting user may fire on a project
    Triggers {
        project_id: String
    },
    /// Fire a trigger on a project
    Fire {
        project_id: String,
        #[arg(value_enum)]
        trigger:    ProjectTrigger
    }
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Submit a new project
    Create {
        name:           String,
        /// Contact of the investor that submitted the project
        #[arg(long)]
        investor_email: Option<String>
    },
    /// Show a project with its tasks and history
    Show {
        project_id: String
    },
    /// List all projects
    List
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Add a pending task to a project
    Add {
        project_id:  String,
        /// Stage that raises the task
        #[arg(long, value_enum)]
        step:        ProjectState,
        description: String
    },
    /// Mark a task complete
    Complete {
        project_id: String,
        task_id:    String
    }
}

#[derive(Subcommand, Debug)]
pub enum CommissionCommands {
    /// Schedule a committee session
    Add {
        #[arg(long, value_enum)]
        kind:    CommissionKind,
        /// Session date in RFC 3339, e.g. 2026-11-02T10:00:00Z
        #[arg(long)]
        held_at: DateTime<Utc>
    },
    /// List committee sessions and their dockets
    List
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_fire_with_roles() {
        let cli = Cli::parse_from([
            "invest-wf", "--user", "olga", "--role", "Admin", "--role", "Investor", "fire", "p-1", "to-min-economy"
        ]);

        assert_eq!(cli.user, "olga");
        assert_eq!(cli.roles, vec!["Admin".to_string(), "Investor".to_string()]);
        match cli.command {
            Commands::Fire { project_id, trigger } => {
                assert_eq!(project_id, "p-1");
                assert_eq!(trigger, ProjectTrigger::ToMinEconomy);
            }
            other => panic!("unexpected command {:?}", other)
        }
    }

    #[test]
    fn test_user_defaults_to_login_name() {
        let cli = Cli::parse_from(["invest-wf", "project", "list"]);

        assert!(!cli.user.is_empty());
        assert!(cli.roles.is_empty());
    }

    #[test]
    fn test_commission_add_parses_date() {
        let cli = Cli::parse_from(["invest-wf", "commission", "add", "--kind", "ispolcom", "--held-at", "2026-11-02T10:00:00Z"]);

        match cli.command {
            Commands::Commission { command: CommissionCommands::Add { kind, held_at } } => {
                assert_eq!(kind, CommissionKind::Ispolcom);
                assert_eq!(held_at.to_rfc3339(), "2026-11-02T10:00:00+00:00");
            }
            other => panic!("unexpected command {:?}", other)
        }
    }
}
