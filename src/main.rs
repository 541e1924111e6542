//! # Investment Workflow CLI
//!
//! Drives projects through the approval workflow from the command line.
//!
//! ```bash
//! invest-wf project create "Dairy plant" --investor-email ivan@example.com
//! invest-wf commission add --kind comission --held-at 2026-11-02T10:00:00Z
//! invest-wf --role Admin triggers <project-id>
//! invest-wf --role Admin fire <project-id> to-wait-involved
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use invest_workflow::{
    actor::WorkflowSystem,
    adapter::{notifier::template_notifiers, storage::DocumentStoreFactory},
    cli::{Cli, Commands, commands},
    config::{self, Settings},
    domain::context::Identity,
    port::storage::Gateway,
    service::WorkflowEngine,
    workflow::approval_registry
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => config::load_settings_from(path)?,
        None => config::load_settings()?
    };
    init_tracing(&settings);

    let data_dir = settings.resolved_data_dir()?;
    let store =
        DocumentStoreFactory::create(settings.storage, Some(data_dir.as_path())).context("Failed to open storage")?;
    let gateway = Gateway::new(store);
    let identity = Identity::new(cli.user.as_str(), cli.roles.iter().map(String::as_str));

    let system = match &cli.command {
        Commands::Project { command } => return commands::handle_project_command(&gateway, command),
        Commands::Commission { command } => return commands::handle_commission_command(&gateway, command),
        _ => start_system(&settings, gateway).await?
    };

    let result = match cli.command {
        Commands::Task { command } => commands::handle_task_command(&system, &command).await,
        Commands::Triggers { project_id } => commands::handle_triggers_command(&system, &project_id, identity).await,
        Commands::Fire { project_id, trigger } => {
            commands::handle_fire_command(&system, &project_id, identity, trigger).await
        }
        Commands::Project { .. } | Commands::Commission { .. } => Ok(())
    };

    system.shutdown().await?;
    result
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn start_system(settings: &Settings, gateway: Gateway) -> Result<WorkflowSystem> {
    let notifiers = template_notifiers(settings.templates_dir.as_deref()).context("Failed to load templates")?;
    let engine = WorkflowEngine::new(Arc::new(approval_registry()), gateway, notifiers)
        .with_policy(settings.duplicate_policy);

    WorkflowSystem::start(engine, settings.workflow.as_str(), settings.fire_timeout())
        .await
        .context("Failed to start actor system")
}
