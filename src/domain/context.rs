//! Workflow context shared by every handler of one workflow instance

use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex, PoisonError, RwLock}
};

use chrono::Utc;
use serde_json::{Value, json};
use tracing::{Level, event};

use crate::{
    domain::{
        constant::context as events,
        error::WorkflowError,
        project::{Commission, CommissionKind, Project},
        state::ProjectState
    },
    port::{
        notification::{Audience, NotificationKind, Notifiers},
        storage::Gateway
    }
};

/// Acting user and the roles they hold
///
/// Supplied by the caller; read-only for the whole workflow instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub user_name: String,
    pub roles:     BTreeSet<String>
}

impl Identity {
    pub fn new<I, R>(user_name: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>
    {
        Self { user_name: user_name.into(), roles: roles.into_iter().map(Into::into).collect() }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Everything a handler may see or touch
///
/// One context is built per workflow instance and shared by reference with
/// every handler, so an update made by one handler is visible to the others.
pub struct ProjectContext {
    project:     RwLock<Project>,
    gateway:     Gateway,
    notifiers:   Notifiers,
    identity:    Identity,
    /// Held while checking and saving a transition; shared by every context of one project
    commit_lock: Arc<Mutex<()>>
}

impl ProjectContext {
    pub fn new(project: Project, gateway: Gateway, notifiers: Notifiers, identity: Identity) -> Self {
        Self {
            project: RwLock::new(project),
            gateway,
            notifiers,
            identity,
            commit_lock: Arc::new(Mutex::new(()))
        }
    }

    /// Share the commit lock with other contexts of the same project
    pub fn with_commit_lock(mut self, lock: Arc<Mutex<()>>) -> Self {
        self.commit_lock = lock;
        self
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn user_name(&self) -> &str {
        &self.identity.user_name
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.identity.roles
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.identity.has_role(role)
    }

    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        roles.iter().any(|role| self.has_role(role))
    }

    /// Copy of the aggregate as it currently stands
    pub fn project(&self) -> Project {
        self.read(Project::clone)
    }

    pub fn project_id(&self) -> String {
        self.read(|p| p.id.clone())
    }

    pub fn state(&self) -> ProjectState {
        self.read(|p| p.state)
    }

    /// Whether the aggregate has an incomplete task raised at `step`
    pub fn has_open_task(&self, step: ProjectState) -> bool {
        self.read(|p| p.has_open_task(step))
    }

    /// Mutate the in-memory aggregate without persisting it
    pub fn update_project<R>(&self, f: impl FnOnce(&mut Project) -> R) -> R {
        let mut project = self.project.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut project)
    }

    fn read<R>(&self, f: impl FnOnce(&Project) -> R) -> R {
        let project = self.project.read().unwrap_or_else(PoisonError::into_inner);
        f(&project)
    }

    /// Fail with [`WorkflowError::Conflict`] if the stored project moved on
    ///
    /// The stored copy must still have the state and history length this
    /// context holds. A project that was never stored is always current.
    pub fn ensure_current(&self) -> Result<(), WorkflowError> {
        let (project_id, state, recorded) = self.read(|p| (p.id.clone(), p.state, p.history.len()));
        let Some(stored) = self.gateway.get::<Project>(&project_id)? else {
            return Ok(());
        };

        if stored.state == state && stored.history.len() == recorded {
            return Ok(());
        }

        event!(Level::WARN, event = events::STALE_INSTANCE, project_id = %project_id,
               expected = %state, stored = %stored.state, expected_history = recorded, stored_history = stored.history.len());
        Err(WorkflowError::Conflict(format!(
            "project {} is now {} with {} transitions, this instance was built at {} with {}",
            project_id,
            stored.state,
            stored.history.len(),
            state,
            recorded
        )))
    }

    /// Record that the aggregate moved to `to` and persist it
    ///
    /// The updated aggregate is saved first and only written back to the
    /// context once the save succeeded, so a failed save leaves the in-memory
    /// project untouched. The save is refused with a conflict when another
    /// instance recorded a transition for the project in the meantime.
    pub fn record_transition(&self, to: ProjectState, note: &str) -> Result<(), WorkflowError> {
        let _commit = self.commit_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.ensure_current()?;

        let mut updated = self.project();
        let from = updated.state;
        updated.apply_transition(to, note, self.user_name());

        if let Err(e) = self.gateway.save(&updated) {
            event!(Level::ERROR, event = events::TRANSITION_PERSIST_FAILED,
                   project_id = %updated.id, from = %from, to = %to, error = %e);
            return Err(e);
        }

        event!(Level::INFO, event = events::TRANSITION_RECORDED,
               project_id = %updated.id, from = %from, to = %to, user = %self.user_name());
        self.update_project(|project| *project = updated);
        Ok(())
    }

    /// Notify one audience; delivery failures are logged and swallowed
    pub fn notify(&self, audience: Audience, kind: NotificationKind, extra: Value) {
        let project = self.project();
        if let Err(e) = self.notifiers.for_audience(audience).notify(kind, &project, &extra) {
            event!(Level::WARN, event = events::NOTIFICATION_FAILED,
                   project_id = %project.id, audience = %audience, kind = %kind, error = %e);
        }
    }

    pub fn notify_user(&self, kind: NotificationKind) {
        self.notify(Audience::User, kind, json!({ "user": self.user_name() }));
    }

    /// Next committee session of `kind` that has not been held yet
    pub fn upcoming_commission(&self, kind: CommissionKind) -> Result<Option<Commission>, WorkflowError> {
        let now = Utc::now();
        let upcoming = self.gateway.find_all(|c: &Commission| c.kind == kind && c.is_upcoming(now))?;
        Ok(upcoming.into_iter().min_by_key(|c| c.held_at))
    }

    /// Put the aggregate on the docket of the next session of `kind`
    pub fn schedule_to_next(&self, kind: CommissionKind) -> Result<Commission, WorkflowError> {
        let mut commission = self
            .upcoming_commission(kind)?
            .ok_or_else(|| WorkflowError::NotFound(format!("no upcoming {:?} session", kind)))?;

        let project_id = self.project_id();
        if commission.schedule(&project_id) {
            self.gateway.save(&commission)?;
            event!(Level::INFO, event = events::DOCKET_UPDATED,
                   project_id = %project_id, commission_id = %commission.id, kind = ?kind);
        }
        Ok(commission)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::Duration;

    use super::*;
    use crate::{
        adapter::storage::InMemoryDocumentStore,
        port::{notification::Notifier, storage::DocumentStore}
    };

    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<NotificationKind>>
    }

    impl Notifier for Outbox {
        fn notify(&self, kind: NotificationKind, _project: &Project, _extra: &Value) -> Result<(), WorkflowError> {
            self.sent.lock().unwrap().push(kind);
            Ok(())
        }
    }

    struct Bounce;

    impl Notifier for Bounce {
        fn notify(&self, _kind: NotificationKind, _project: &Project, _extra: &Value) -> Result<(), WorkflowError> {
            Err(WorkflowError::Notification("mailbox full".to_string()))
        }
    }

    struct ReadOnlyStore;

    impl DocumentStore for ReadOnlyStore {
        fn get(&self, _collection: &str, _id: &str) -> Result<Option<Value>, WorkflowError> {
            Ok(None)
        }

        fn scan(&self, _collection: &str) -> Result<Vec<Value>, WorkflowError> {
            Ok(Vec::new())
        }

        fn put(&self, _collection: &str, _id: &str, _document: &Value) -> Result<(), WorkflowError> {
            Err(WorkflowError::Persistence("read-only".to_string()))
        }

        fn remove(&self, _collection: &str, _id: &str) -> Result<bool, WorkflowError> {
            Ok(false)
        }
    }

    fn context_with(store: Arc<dyn DocumentStore>, notifier: Arc<dyn Notifier>) -> ProjectContext {
        ProjectContext::new(
            Project::new("Dairy plant"),
            Gateway::new(store),
            Notifiers::shared(notifier),
            Identity::new("olga", ["Admin"])
        )
    }

    #[test]
    fn test_record_transition_persists_and_updates_context() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let context = context_with(store.clone(), Arc::new(Outbox::default()));

        context.record_transition(ProjectState::WaitInvolved, "Sent to involved organizations").unwrap();

        assert_eq!(context.state(), ProjectState::WaitInvolved);
        let stored: Project = context.gateway().get(&context.project_id()).unwrap().unwrap();
        assert_eq!(stored.state, ProjectState::WaitInvolved);
        assert_eq!(stored.history.len(), 1);
        assert_eq!(stored.history[0].user, "olga");
    }

    #[test]
    fn test_failed_save_leaves_project_untouched() {
        let context = context_with(Arc::new(ReadOnlyStore), Arc::new(Outbox::default()));

        let result = context.record_transition(ProjectState::WaitInvolved, "Sent");

        assert!(matches!(result, Err(WorkflowError::Persistence(_))));
        assert_eq!(context.state(), ProjectState::Open);
        assert!(context.project().history.is_empty());
    }

    #[test]
    fn test_record_on_stale_context_is_a_conflict() {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let project = Project::new("Sawmill");
        Gateway::new(store.clone()).save(&project).unwrap();

        let lock = Arc::new(Mutex::new(()));
        let first = ProjectContext::new(
            project.clone(),
            Gateway::new(store.clone()),
            Notifiers::shared(Arc::new(Outbox::default())),
            Identity::new("olga", ["Admin"])
        )
        .with_commit_lock(lock.clone());
        let second = ProjectContext::new(
            project,
            Gateway::new(store),
            Notifiers::shared(Arc::new(Outbox::default())),
            Identity::new("ivan", ["Admin"])
        )
        .with_commit_lock(lock);

        first.record_transition(ProjectState::WaitInvolved, "Sent").unwrap();
        let result = second.record_transition(ProjectState::WaitInvolved, "Sent again");

        assert!(matches!(result, Err(WorkflowError::Conflict(_))));
        assert_eq!(second.state(), ProjectState::Open);
        let stored: Project = first.gateway().get(&first.project_id()).unwrap().unwrap();
        assert_eq!(stored.history.len(), 1);
        assert_eq!(stored.history[0].user, "olga");

        // The context that recorded stays current and can keep going
        first.ensure_current().unwrap();
        first.record_transition(ProjectState::WaitInvolved, "Involved organizations responded").unwrap();
    }

    #[test]
    fn test_notification_failure_is_swallowed() {
        let context = context_with(Arc::new(InMemoryDocumentStore::new()), Arc::new(Bounce));
        context.notify(Audience::Admin, NotificationKind::WaitInvolved, Value::Null);
        context.notify_user(NotificationKind::WaitInvolved);
    }

    #[test]
    fn test_schedule_to_next_picks_earliest_upcoming_session() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let context = context_with(store, Arc::new(Outbox::default()));
        let gateway = context.gateway();

        let past = Commission::new(CommissionKind::Ispolcom, Utc::now() - Duration::days(1));
        let later = Commission::new(CommissionKind::Ispolcom, Utc::now() + Duration::days(10));
        let sooner = Commission::new(CommissionKind::Ispolcom, Utc::now() + Duration::days(2));
        let other_kind = Commission::new(CommissionKind::Comission, Utc::now() + Duration::days(1));
        for commission in [&past, &later, &sooner, &other_kind] {
            gateway.save(commission).unwrap();
        }

        let scheduled = context.schedule_to_next(CommissionKind::Ispolcom).unwrap();
        assert_eq!(scheduled.id, sooner.id);

        let stored: Commission = gateway.get(&sooner.id).unwrap().unwrap();
        assert_eq!(stored.project_ids, vec![context.project_id()]);

        // Scheduling twice does not duplicate the docket entry
        context.schedule_to_next(CommissionKind::Ispolcom).unwrap();
        let stored: Commission = gateway.get(&sooner.id).unwrap().unwrap();
        assert_eq!(stored.project_ids.len(), 1);
    }

    #[test]
    fn test_schedule_without_upcoming_session_is_not_found() {
        let context = context_with(Arc::new(InMemoryDocumentStore::new()), Arc::new(Outbox::default()));
        assert!(matches!(context.schedule_to_next(CommissionKind::Comission), Err(WorkflowError::NotFound(_))));
    }

    #[test]
    fn test_identity_roles() {
        let identity = Identity::new("ivan", ["Investor", "Involved"]);
        assert!(identity.has_role("Investor"));
        assert!(!identity.has_role("Admin"));
    }
}
