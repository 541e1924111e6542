//! Template-rendered notifications
//!
//! Messages are rendered with Tera from `{audience}/{kind}.txt`, falling back
//! to `default/{kind}.txt`. Built-in defaults cover every kind; a templates
//! directory with the same layout overrides them. The rendered message is
//! emitted as a structured tracing event, mail transport lives outside this
//! crate.

use std::path::Path;

use serde_json::Value;
use tera::{Context as TeraContext, Tera};
use tracing::{Level, event};

use crate::{
    domain::{constant::notifier as events, error::WorkflowError, project::Project},
    port::notification::{Audience, NotificationKind, Notifier, Notifiers}
};

const DEFAULT_TEMPLATES: &[(&str, &str)] = &[
    ("default/wait_involved.txt", "Project \"{{ project.name }}\" was sent to the involved organizations."),
    ("default/involved_updated.txt", "Involved organizations updated project \"{{ project.name }}\"."),
    (
        "default/on_comission.txt",
        "Project \"{{ project.name }}\" is on the committee docket for {{ extra.held_at }}."
    ),
    ("default/comission_fix_requested.txt", "The committee requested fixes for project \"{{ project.name }}\"."),
    ("default/comission_fix_updated.txt", "Fixes for project \"{{ project.name }}\" were updated."),
    (
        "default/on_ispolcom.txt",
        "Project \"{{ project.name }}\" is on the execution committee docket for {{ extra.held_at }}."
    ),
    (
        "default/ispolcom_fix_requested.txt",
        "The execution committee requested fixes for project \"{{ project.name }}\"."
    ),
    ("default/in_min_economy.txt", "Project \"{{ project.name }}\" was passed to the ministry of economy."),
    ("default/plan_creating.txt", "A realization plan is being drafted for project \"{{ project.name }}\"."),
    ("default/plan_updated.txt", "The realization plan of project \"{{ project.name }}\" was updated."),
    ("default/realization.txt", "The plan of project \"{{ project.name }}\" was approved."),
    ("default/done.txt", "Project \"{{ project.name }}\" is complete.")
];

/// Notifier for one audience
pub struct TemplateNotifier {
    audience: Audience,
    tera:     Tera
}

impl TemplateNotifier {
    /// Notifier using only the built-in templates
    pub fn new(audience: Audience) -> Result<Self, WorkflowError> {
        Ok(Self { audience, tera: builtin()? })
    }

    /// Notifier whose templates in `dir` take precedence over the built-in ones
    pub fn with_templates_dir(audience: Audience, dir: &Path) -> Result<Self, WorkflowError> {
        let pattern = format!("{}/**/*.txt", dir.display());
        let mut tera = Tera::new(&pattern)
            .map_err(|e| WorkflowError::Configuration(format!("Failed to load templates from {}: {}", dir.display(), e)))?;
        tera.extend(&builtin()?)
            .map_err(|e| WorkflowError::Configuration(format!("Failed to merge built-in templates: {}", e)))?;
        Ok(Self { audience, tera })
    }

    /// Render the message for `kind`
    ///
    /// A kind without any template renders a placeholder naming the missing
    /// template instead of failing.
    pub fn render(&self, kind: NotificationKind, project: &Project, extra: &Value) -> Result<String, WorkflowError> {
        let Some(name) = self.template_for(kind) else {
            event!(Level::WARN, event = events::TEMPLATE_MISSING, audience = %self.audience, kind = %kind);
            return Ok(format!("Template {}/{} is missing", self.audience, kind));
        };

        let mut context = TeraContext::new();
        context.insert("project", project);
        context.insert("extra", extra);
        context.insert("audience", self.audience.as_str());

        self.tera
            .render(&name, &context)
            .map_err(|e| WorkflowError::Notification(format!("Failed to render {}: {}", name, e)))
    }

    fn template_for(&self, kind: NotificationKind) -> Option<String> {
        let candidates = [format!("{}/{}.txt", self.audience, kind), format!("default/{}.txt", kind)];
        candidates.into_iter().find(|name| self.tera.get_template_names().any(|known| known == name))
    }
}

impl Notifier for TemplateNotifier {
    fn notify(&self, kind: NotificationKind, project: &Project, extra: &Value) -> Result<(), WorkflowError> {
        let message = self.render(kind, project, extra)?;
        let recipient = match self.audience {
            Audience::Investor => project.investor_email.as_deref().unwrap_or("-"),
            Audience::Admin => "admin",
            Audience::User => extra.get("user").and_then(Value::as_str).unwrap_or("-")
        };

        event!(Level::INFO, event = events::NOTIFICATION_RENDERED,
               audience = %self.audience, kind = %kind, project_id = %project.id,
               recipient = %recipient, message = %message);
        Ok(())
    }
}

/// Build the three audience notifiers, optionally overriding templates from `templates_dir`
pub fn template_notifiers(templates_dir: Option<&Path>) -> Result<Notifiers, WorkflowError> {
    let build = |audience| match templates_dir {
        Some(dir) if dir.exists() => TemplateNotifier::with_templates_dir(audience, dir),
        _ => TemplateNotifier::new(audience)
    };

    Ok(Notifiers::new(
        std::sync::Arc::new(build(Audience::Admin)?),
        std::sync::Arc::new(build(Audience::Investor)?),
        std::sync::Arc::new(build(Audience::User)?)
    ))
}

fn builtin() -> Result<Tera, WorkflowError> {
    let mut tera = Tera::default();
    tera.add_raw_templates(DEFAULT_TEMPLATES.to_vec())
        .map_err(|e| WorkflowError::Configuration(format!("Invalid built-in template: {}", e)))?;
    Ok(tera)
}
