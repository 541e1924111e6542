//! Domain Events - Structured events for internal monitoring and debugging

/// Name of the project approval workflow
pub const APPROVAL_WORKFLOW: &str = "Approval";

/// Role names checked by guards
pub mod role {
    pub const ADMIN: &str = "Admin";
    pub const INVESTOR: &str = "Investor";
    pub const INVOLVED: &str = "Involved";
    pub const MIN_ECONOMY: &str = "MinEconomy";
}

/// Graph assembly events
pub mod builder {
    pub const BUILD_STARTED: &str = "builder.started";
    pub const HANDLER_INSTANTIATED: &str = "builder.handler_instantiated";
    pub const TRIGGER_SKIPPED: &str = "builder.trigger_skipped";
    pub const DUPLICATE_DISCARDED: &str = "builder.duplicate_discarded";
    pub const BUILD_COMPLETED: &str = "builder.completed";
    pub const BUILD_FAILED: &str = "builder.failed";
    pub const CATALOG_INDEXED: &str = "catalog.indexed";
}

/// State machine runtime events
pub mod machine {
    pub const FIRE_REQUESTED: &str = "fire.requested";
    pub const GUARD_FAILED: &str = "guard.failed";
    pub const FIRE_REJECTED: &str = "fire.rejected";
    pub const EXIT_FAILED: &str = "exit.failed";
    pub const ENTRY_FAILED: &str = "entry.failed";
    pub const TRANSITIONED: &str = "fire.transitioned";
    pub const REENTERED: &str = "fire.reentered";
}

/// Workflow context events
pub mod context {
    pub const TRANSITION_RECORDED: &str = "transition.recorded";
    pub const TRANSITION_PERSIST_FAILED: &str = "transition.persist_failed";
    pub const NOTIFICATION_FAILED: &str = "notification.failed";
    pub const DOCKET_UPDATED: &str = "docket.updated";
    pub const STALE_INSTANCE: &str = "instance.stale";
}

/// Notification adapter events
pub mod notifier {
    pub const TEMPLATE_MISSING: &str = "template.missing";
    pub const NOTIFICATION_RENDERED: &str = "notification.rendered";
}

/// ProjectProcessor Actor Events
pub mod processor {
    pub const PROCESSOR_STARTED: &str = "processor.started";
    pub const REQUEST_RECEIVED: &str = "request.received";
    pub const REQUEST_PROCESSED: &str = "request.processed";
    pub const REQUEST_FAILED: &str = "request.failed";
    pub const REPLY_FAILED: &str = "reply.failed";
    pub const DONE_NOTICE_FAILED: &str = "done_notice.failed";
}

/// WorkflowManager Actor Events
pub mod manager {
    pub const MANAGER_STARTED: &str = "manager.started";
    pub const REQUEST_ROUTED: &str = "request.routed";
    pub const PROCESSOR_SPAWNED: &str = "processor.spawned";
    pub const PROCESSOR_SPAWN_FAILED: &str = "processor.spawn_failed";
    pub const PROCESSOR_STOPPED: &str = "processor.stopped";
    pub const PROCESSOR_RETIRED: &str = "processor.retired";
    pub const ROUTE_FAILED: &str = "route.failed";
    pub const REPLY_FAILED: &str = "reply.failed";
}

/// Workflow system handle events
pub mod system {
    pub const SYSTEM_STARTED: &str = "system.started";
    pub const SYSTEM_SHUTDOWN: &str = "system.shutdown";
    pub const CALL_FAILED: &str = "call.failed";
}
