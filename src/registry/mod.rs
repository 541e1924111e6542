//! Handler registry
//!
//! Every per-state handler ("unit of work") describes itself with a
//! [`HandlerSpec`]: the state it owns, the workflow it belongs to and the
//! guarded triggers it declares. Specs are registered into a
//! [`HandlerRegistry`] in a fixed order at startup; that order is the guard
//! evaluation order of the assembled graph.

pub mod builder;

use std::{collections::HashMap, fmt::Debug, marker::PhantomData, sync::Arc};

use once_cell::sync::OnceCell;
use tracing::{Level, event};

pub use self::builder::{DuplicatePolicy, GraphBuilder};
use crate::{
    domain::{constant::builder as events, error::WorkflowError},
    machine::{Action, Guard, GuardResult}
};

/// Contract every per-state handler implements against its shared context `C`
pub trait UnitOfWork<C>: Send + Sync + 'static {
    /// Build the handler for one workflow instance
    fn new(context: Arc<C>) -> Self
    where
        Self: Sized;

    fn on_entry(&self) -> Result<(), WorkflowError>;

    fn on_exit(&self) -> Result<(), WorkflowError> {
        Ok(())
    }
}

/// One guarded trigger declared by handler `H`
struct TriggerDeclaration<S, T, H> {
    workflow: String,
    trigger:  T,
    from:     S,
    to:       S,
    guard:    fn(&H) -> GuardResult
}

/// Typed, declarative description of a handler
pub struct HandlerSpec<S, T, C, H> {
    name:     &'static str,
    workflow: String,
    state:    S,
    triggers: Vec<TriggerDeclaration<S, T, H>>,
    context:  PhantomData<fn(Arc<C>)>
}

impl<S, T, C, H> HandlerSpec<S, T, C, H>
where
    S: Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    C: Send + Sync + 'static,
    H: UnitOfWork<C>
{
    pub fn new(name: &'static str, workflow: impl Into<String>, state: S) -> Self {
        Self { name, workflow: workflow.into(), state, triggers: Vec::new(), context: PhantomData }
    }

    /// Declare a guarded trigger `from --trigger--> to` for `workflow`
    pub fn trigger(mut self, workflow: impl Into<String>, trigger: T, from: S, to: S, guard: fn(&H) -> GuardResult) -> Self {
        self.triggers.push(TriggerDeclaration { workflow: workflow.into(), trigger, from, to, guard });
        self
    }

    fn into_descriptor(self) -> HandlerDescriptor<S, T, C> {
        let name = self.name;
        let triggers = Arc::new(self.triggers);
        let factory = move |context: Arc<C>| {
            let handler = Arc::new(H::new(context));

            let entry_handler = handler.clone();
            let exit_handler = handler.clone();
            let entry: Action = Arc::new(move || entry_handler.on_entry());
            let exit: Action = Arc::new(move || exit_handler.on_exit());

            let transitions = triggers
                .iter()
                .map(|declaration| CandidateTransition {
                    workflow:    declaration.workflow.clone(),
                    trigger:     declaration.trigger.clone(),
                    from:        declaration.from.clone(),
                    to:          declaration.to.clone(),
                    guard:       Guard::bind(handler.clone(), declaration.guard).with_label(name),
                    declared_by: name
                })
                .collect();

            BoundHandler { entry, exit, transitions }
        };

        HandlerDescriptor { name: self.name, workflow: self.workflow, state: self.state, factory: Arc::new(factory) }
    }
}

/// A transition declared by a handler, with its guard already bound
#[derive(Clone)]
pub struct CandidateTransition<S, T> {
    pub workflow:    String,
    pub trigger:     T,
    pub from:        S,
    pub to:          S,
    pub guard:       Guard,
    pub declared_by: &'static str
}

/// Closures produced by instantiating a handler against a context
pub struct BoundHandler<S, T> {
    pub entry:       Action,
    pub exit:        Action,
    pub transitions: Vec<CandidateTransition<S, T>>
}

type Factory<S, T, C> = Arc<dyn Fn(Arc<C>) -> BoundHandler<S, T> + Send + Sync>;

/// Type-erased handler registration
pub struct HandlerDescriptor<S, T, C> {
    pub name:     &'static str,
    pub workflow: String,
    pub state:    S,
    factory:      Factory<S, T, C>
}

impl<S, T, C> HandlerDescriptor<S, T, C> {
    /// Create the handler for one workflow instance and bind its closures
    pub fn instantiate(&self, context: Arc<C>) -> BoundHandler<S, T> {
        (self.factory)(context)
    }
}

/// Ordered, explicitly constructed catalog of handlers
pub struct HandlerRegistry<S, T, C> {
    descriptors: Vec<HandlerDescriptor<S, T, C>>,
    index:       OnceCell<HashMap<String, Vec<usize>>>
}

impl<S, T, C> Default for HandlerRegistry<S, T, C> {
    fn default() -> Self {
        Self { descriptors: Vec::new(), index: OnceCell::new() }
    }
}

impl<S, T, C> HandlerRegistry<S, T, C>
where
    S: Clone + Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    C: Send + Sync + 'static
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler; registration order is preserved
    pub fn register<H: UnitOfWork<C>>(&mut self, spec: HandlerSpec<S, T, C, H>) -> &mut Self {
        self.descriptors.push(spec.into_descriptor());
        self.index = OnceCell::new();
        self
    }

    pub fn with<H: UnitOfWork<C>>(mut self, spec: HandlerSpec<S, T, C, H>) -> Self {
        self.register(spec);
        self
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Descriptors belonging to `workflow`, in registration order
    pub fn descriptors_for(&self, workflow: &str) -> Vec<&HandlerDescriptor<S, T, C>> {
        let index = self.index.get_or_init(|| {
            let mut index: HashMap<String, Vec<usize>> = HashMap::new();
            for (position, descriptor) in self.descriptors.iter().enumerate() {
                index.entry(descriptor.workflow.clone()).or_default().push(position);
            }
            event!(Level::DEBUG, event = events::CATALOG_INDEXED,
                   workflows = index.len(), handlers = self.descriptors.len());
            index
        });

        index
            .get(workflow)
            .map(|positions| positions.iter().map(|&position| &self.descriptors[position]).collect())
            .unwrap_or_default()
    }

    /// Names of every workflow with at least one handler
    pub fn workflows(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for descriptor in &self.descriptors {
            if !names.contains(&descriptor.workflow) {
                names.push(descriptor.workflow.clone());
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ctx;

    struct Idle;

    impl UnitOfWork<Ctx> for Idle {
        fn new(_context: Arc<Ctx>) -> Self {
            Idle
        }

        fn on_entry(&self) -> Result<(), WorkflowError> {
            Ok(())
        }
    }

    impl Idle {
        fn never(&self) -> GuardResult {
            Ok(false)
        }
    }

    #[test]
    fn test_descriptors_are_grouped_by_workflow_in_registration_order() {
        let registry: HandlerRegistry<u8, &'static str, Ctx> = HandlerRegistry::new()
            .with(HandlerSpec::<_, _, _, Idle>::new("a", "first", 1))
            .with(HandlerSpec::<_, _, _, Idle>::new("b", "second", 1))
            .with(HandlerSpec::<_, _, _, Idle>::new("c", "first", 2).trigger("first", "go", 2, 1, Idle::never));

        let first: Vec<&str> = registry.descriptors_for("first").iter().map(|d| d.name).collect();
        assert_eq!(first, vec!["a", "c"]);
        assert_eq!(registry.descriptors_for("second").len(), 1);
        assert!(registry.descriptors_for("missing").is_empty());
        assert_eq!(registry.workflows(), vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn test_register_after_lookup_refreshes_index() {
        let mut registry: HandlerRegistry<u8, &'static str, Ctx> = HandlerRegistry::new();
        registry.register(HandlerSpec::<_, _, _, Idle>::new("a", "first", 1));
        assert_eq!(registry.descriptors_for("first").len(), 1);

        registry.register(HandlerSpec::<_, _, _, Idle>::new("b", "first", 2));
        assert_eq!(registry.descriptors_for("first").len(), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_instantiate_binds_guards_to_fresh_handler() {
        let registry: HandlerRegistry<u8, &'static str, Ctx> = HandlerRegistry::new()
            .with(HandlerSpec::<_, _, _, Idle>::new("idle", "first", 1).trigger("first", "go", 1, 2, Idle::never));

        let bound = registry.descriptors_for("first")[0].instantiate(Arc::new(Ctx));
        assert_eq!(bound.transitions.len(), 1);
        assert_eq!(bound.transitions[0].declared_by, "idle");
        assert!(!bound.transitions[0].guard.evaluate().unwrap());
        assert!((bound.entry)().is_ok());
    }
}
