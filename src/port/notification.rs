//! Notification ports - fire-and-forget messages to the parties of a project

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{error::WorkflowError, project::Project};

/// Who a notification is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    Admin,
    Investor,
    User
}

impl Audience {
    pub fn as_str(&self) -> &'static str {
        match self {
            Audience::Admin => "admin",
            Audience::Investor => "investor",
            Audience::User => "user"
        }
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to the project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    WaitInvolved,
    InvolvedUpdated,
    OnComission,
    ComissionFixRequested,
    ComissionFixUpdated,
    OnIspolcom,
    IspolcomFixRequested,
    InMinEconomy,
    PlanCreating,
    PlanUpdated,
    Realization,
    Done
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::WaitInvolved => "wait_involved",
            NotificationKind::InvolvedUpdated => "involved_updated",
            NotificationKind::OnComission => "on_comission",
            NotificationKind::ComissionFixRequested => "comission_fix_requested",
            NotificationKind::ComissionFixUpdated => "comission_fix_updated",
            NotificationKind::OnIspolcom => "on_ispolcom",
            NotificationKind::IspolcomFixRequested => "ispolcom_fix_requested",
            NotificationKind::InMinEconomy => "in_min_economy",
            NotificationKind::PlanCreating => "plan_creating",
            NotificationKind::PlanUpdated => "plan_updated",
            NotificationKind::Realization => "realization",
            NotificationKind::Done => "done"
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Port for delivering notifications to one audience
pub trait Notifier: Send + Sync {
    /// Deliver a notification about `project`; `extra` carries event-specific data
    fn notify(&self, kind: NotificationKind, project: &Project, extra: &Value) -> Result<(), WorkflowError>;
}

/// The three notification channels a workflow context carries
#[derive(Clone)]
pub struct Notifiers {
    pub admin:    Arc<dyn Notifier>,
    pub investor: Arc<dyn Notifier>,
    pub user:     Arc<dyn Notifier>
}

impl Notifiers {
    pub fn new(admin: Arc<dyn Notifier>, investor: Arc<dyn Notifier>, user: Arc<dyn Notifier>) -> Self {
        Self { admin, investor, user }
    }

    /// Use the same notifier for every audience
    pub fn shared(notifier: Arc<dyn Notifier>) -> Self {
        Self { admin: notifier.clone(), investor: notifier.clone(), user: notifier }
    }

    pub fn for_audience(&self, audience: Audience) -> &Arc<dyn Notifier> {
        match audience {
            Audience::Admin => &self.admin,
            Audience::Investor => &self.investor,
            Audience::User => &self.user
        }
    }
}
