//! Transition-graph assembly
//!
//! Turns the handlers registered for one workflow name into a configured
//! [`StateMachine`]. The assembled graph is never stored; it is rebuilt for
//! every workflow instance from the registry.

use std::{
    collections::HashMap,
    fmt::Debug,
    hash::Hash,
    sync::Arc
};

use serde::{Deserialize, Serialize};
use tracing::{Level, event};

use super::{CandidateTransition, HandlerRegistry};
use crate::{
    domain::{constant::builder as events, error::WorkflowError},
    machine::StateMachine
};

/// What to do when several handlers declare the same `(from, to, trigger)`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep the first declaration in registry order and log the rest
    #[default]
    FirstWins,
    /// Fail construction
    Reject
}

pub struct GraphBuilder<'r, S, T, C> {
    registry: &'r HandlerRegistry<S, T, C>,
    policy:   DuplicatePolicy
}

impl<'r, S, T, C> GraphBuilder<'r, S, T, C>
where
    S: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    T: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    C: Send + Sync + 'static
{
    pub fn new(registry: &'r HandlerRegistry<S, T, C>) -> Self {
        Self { registry, policy: DuplicatePolicy::default() }
    }

    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Assemble a state machine for `workflow`, starting in `initial_state`
    ///
    /// Every handler is instantiated exactly once against `context`.
    pub fn build(&self, workflow: &str, context: Arc<C>, initial_state: S) -> Result<StateMachine<S, T>, WorkflowError> {
        event!(Level::DEBUG, event = events::BUILD_STARTED, workflow = %workflow, initial_state = ?initial_state);

        let result = self.assemble(workflow, context, initial_state);
        if let Err(e) = &result {
            event!(Level::ERROR, event = events::BUILD_FAILED, workflow = %workflow, error = %e);
        }
        result
    }

    fn assemble(&self, workflow: &str, context: Arc<C>, initial_state: S) -> Result<StateMachine<S, T>, WorkflowError> {
        let descriptors = self.registry.descriptors_for(workflow);

        let mut owners: HashMap<S, &'static str> = HashMap::new();
        for descriptor in &descriptors {
            if let Some(first) = owners.insert(descriptor.state.clone(), descriptor.name) {
                return Err(WorkflowError::DuplicateState {
                    workflow: workflow.to_string(),
                    state:    format!("{:?}", descriptor.state),
                    first:    first.to_string(),
                    second:   descriptor.name.to_string()
                });
            }
        }

        let mut handlers = Vec::with_capacity(descriptors.len());
        let mut candidates: Vec<CandidateTransition<S, T>> = Vec::new();
        for descriptor in &descriptors {
            let bound = descriptor.instantiate(context.clone());
            event!(Level::TRACE, event = events::HANDLER_INSTANTIATED,
                   workflow = %workflow, handler = descriptor.name, state = ?descriptor.state);

            for candidate in bound.transitions {
                if candidate.workflow == workflow {
                    candidates.push(candidate);
                } else {
                    event!(Level::DEBUG, event = events::TRIGGER_SKIPPED,
                           workflow = %workflow, handler = descriptor.name,
                           declared_for = %candidate.workflow, trigger = ?candidate.trigger);
                }
            }
            handlers.push((descriptor.state.clone(), bound.entry, bound.exit));
        }

        let transitions = self.deduplicate(candidates)?;

        let known = |state: &S| owners.contains_key(state);
        let missing = std::iter::once(&initial_state)
            .chain(transitions.iter().flat_map(|t| [&t.from, &t.to]))
            .find(|state| !known(*state));
        if let Some(state) = missing {
            return Err(WorkflowError::MissingHandler { workflow: workflow.to_string(), state: format!("{:?}", state) });
        }

        let mut machine = StateMachine::new(initial_state);
        for (state, entry, exit) in handlers {
            let mut configuration = machine
                .configure(state.clone())
                .on_entry(move || entry())
                .on_exit(move || exit());

            for transition in transitions.iter().filter(|t| t.from == state && t.to != state) {
                configuration =
                    configuration.permit_if(transition.trigger.clone(), transition.to.clone(), transition.guard.clone())?;
            }
            for transition in transitions.iter().filter(|t| t.from == state && t.to == state) {
                configuration = configuration.permit_reentry_if(transition.trigger.clone(), transition.guard.clone())?;
            }
        }

        event!(Level::DEBUG, event = events::BUILD_COMPLETED,
               workflow = %workflow, handlers = owners.len(), transitions = transitions.len());
        Ok(machine)
    }

    /// Collapse structurally identical `(from, to, trigger)` declarations
    fn deduplicate(
        &self,
        candidates: Vec<CandidateTransition<S, T>>
    ) -> Result<Vec<CandidateTransition<S, T>>, WorkflowError> {
        let mut seen: HashMap<(S, S, T), &'static str> = HashMap::new();
        let mut kept = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let key = (candidate.from.clone(), candidate.to.clone(), candidate.trigger.clone());
            match seen.get(&key) {
                None => {
                    seen.insert(key, candidate.declared_by);
                    kept.push(candidate);
                }
                Some(first) => match self.policy {
                    DuplicatePolicy::FirstWins => {
                        event!(Level::WARN, event = events::DUPLICATE_DISCARDED,
                               from = ?candidate.from, to = ?candidate.to, trigger = ?candidate.trigger,
                               kept = *first, discarded = candidate.declared_by);
                    }
                    DuplicatePolicy::Reject => {
                        return Err(WorkflowError::DuplicateTransition {
                            from:    format!("{:?}", candidate.from),
                            to:      format!("{:?}", candidate.to),
                            trigger: format!("{:?}", candidate.trigger),
                            first:   first.to_string(),
                            second:  candidate.declared_by.to_string()
                        });
                    }
                }
            }
        }

        Ok(kept)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{
        machine::{FireOutcome, GuardResult},
        registry::{HandlerSpec, UnitOfWork}
    };

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Light {
        Red,
        Green,
        Amber
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Signal {
        Go,
        Slow,
        Stop,
        Blink
    }

    #[derive(Default)]
    struct Panel {
        calls: Mutex<Vec<String>>
    }

    impl Panel {
        fn log(&self, entry: &str) {
            self.calls.lock().unwrap().push(entry.to_string());
        }
    }

    struct RedLight(Arc<Panel>);
    struct GreenLight(Arc<Panel>);
    struct AmberLight(Arc<Panel>);
    struct ShadowGreen(Arc<Panel>);

    impl UnitOfWork<Panel> for RedLight {
        fn new(context: Arc<Panel>) -> Self {
            context.log("new red");
            Self(context)
        }

        fn on_entry(&self) -> Result<(), WorkflowError> {
            self.0.log("enter red");
            Ok(())
        }

        fn on_exit(&self) -> Result<(), WorkflowError> {
            self.0.log("exit red");
            Ok(())
        }
    }

    impl RedLight {
        fn can_go(&self) -> GuardResult {
            Ok(true)
        }

        fn can_blink(&self) -> GuardResult {
            Ok(true)
        }
    }

    impl UnitOfWork<Panel> for GreenLight {
        fn new(context: Arc<Panel>) -> Self {
            context.log("new green");
            Self(context)
        }

        fn on_entry(&self) -> Result<(), WorkflowError> {
            self.0.log("enter green");
            Ok(())
        }
    }

    impl GreenLight {
        fn can_slow(&self) -> GuardResult {
            Ok(true)
        }
    }

    impl UnitOfWork<Panel> for AmberLight {
        fn new(context: Arc<Panel>) -> Self {
            Self(context)
        }

        fn on_entry(&self) -> Result<(), WorkflowError> {
            self.0.log("enter amber");
            Ok(())
        }
    }

    impl AmberLight {
        fn can_stop(&self) -> GuardResult {
            Ok(true)
        }
    }

    impl UnitOfWork<Panel> for ShadowGreen {
        fn new(context: Arc<Panel>) -> Self {
            Self(context)
        }

        fn on_entry(&self) -> Result<(), WorkflowError> {
            Ok(())
        }
    }

    impl ShadowGreen {
        fn refuse(&self) -> GuardResult {
            Ok(false)
        }
    }

    const TRAFFIC: &str = "Traffic";

    fn red() -> HandlerSpec<Light, Signal, Panel, RedLight> {
        HandlerSpec::new("RedLight", TRAFFIC, Light::Red)
            .trigger(TRAFFIC, Signal::Go, Light::Red, Light::Green, RedLight::can_go)
            .trigger(TRAFFIC, Signal::Blink, Light::Red, Light::Red, RedLight::can_blink)
            .trigger("Pedestrian", Signal::Stop, Light::Red, Light::Amber, RedLight::can_go)
    }

    fn green() -> HandlerSpec<Light, Signal, Panel, GreenLight> {
        HandlerSpec::new("GreenLight", TRAFFIC, Light::Green).trigger(
            TRAFFIC,
            Signal::Slow,
            Light::Green,
            Light::Amber,
            GreenLight::can_slow
        )
    }

    fn amber() -> HandlerSpec<Light, Signal, Panel, AmberLight> {
        HandlerSpec::new("AmberLight", TRAFFIC, Light::Amber).trigger(
            TRAFFIC,
            Signal::Stop,
            Light::Amber,
            Light::Red,
            AmberLight::can_stop
        )
    }

    fn traffic() -> HandlerRegistry<Light, Signal, Panel> {
        HandlerRegistry::new().with(red()).with(green()).with(amber())
    }

    #[test]
    fn test_build_instantiates_each_handler_once_and_wires_edges() {
        let registry = traffic();
        let panel = Arc::new(Panel::default());

        let mut machine = GraphBuilder::new(&registry).build(TRAFFIC, panel.clone(), Light::Red).unwrap();

        assert_eq!(machine.available_triggers(), vec![Signal::Go, Signal::Blink]);
        let outcome = machine.fire(Signal::Go).unwrap();
        assert!(matches!(outcome, FireOutcome::Transitioned { to: Light::Green, .. }));
        assert_eq!(*panel.calls.lock().unwrap(), vec!["new red", "new green", "exit red", "enter green"]);
    }

    #[test]
    fn test_triggers_for_other_workflows_are_skipped() {
        let registry = traffic();
        let machine = GraphBuilder::new(&registry).build(TRAFFIC, Arc::new(Panel::default()), Light::Red).unwrap();

        assert!(!machine.permitted_edges(&Light::Red).iter().any(|e| e.trigger == Signal::Stop));
    }

    #[test]
    fn test_self_declaration_becomes_reentry() {
        let registry = traffic();
        let panel = Arc::new(Panel::default());
        let mut machine = GraphBuilder::new(&registry).build(TRAFFIC, panel.clone(), Light::Red).unwrap();
        panel.calls.lock().unwrap().clear();

        let outcome = machine.fire(Signal::Blink).unwrap();
        assert!(matches!(outcome, FireOutcome::Reentered { state: Light::Red, .. }));
        assert_eq!(*panel.calls.lock().unwrap(), vec!["exit red", "enter red"]);
    }

    #[test]
    fn test_two_handlers_for_one_state_is_rejected() {
        let registry = traffic().with(
            HandlerSpec::<_, _, _, ShadowGreen>::new("ShadowGreen", TRAFFIC, Light::Green).trigger(
                TRAFFIC,
                Signal::Go,
                Light::Red,
                Light::Green,
                ShadowGreen::refuse
            )
        );

        let result = GraphBuilder::new(&registry).build(TRAFFIC, Arc::new(Panel::default()), Light::Red);
        match result {
            Err(WorkflowError::DuplicateState { first, second, .. }) => {
                assert_eq!(first, "GreenLight");
                assert_eq!(second, "ShadowGreen");
            }
            other => panic!("expected duplicate state error, got {:?}", other.err())
        }

        // A handler tagged for another workflow does not collide
        let shadowed = traffic().with(HandlerSpec::<_, _, _, ShadowGreen>::new("ShadowGreen", "Shadow", Light::Green));
        assert!(GraphBuilder::new(&shadowed).build(TRAFFIC, Arc::new(Panel::default()), Light::Red).is_ok());
    }

    struct Redeclare(Arc<Panel>);

    impl UnitOfWork<Panel> for Redeclare {
        fn new(context: Arc<Panel>) -> Self {
            Self(context)
        }

        fn on_entry(&self) -> Result<(), WorkflowError> {
            Ok(())
        }
    }

    impl Redeclare {
        fn refuse(&self) -> GuardResult {
            Ok(false)
        }
    }

    fn with_duplicate_go() -> HandlerRegistry<Light, Signal, Panel> {
        HandlerRegistry::new().with(red()).with(amber()).with(
            HandlerSpec::<_, _, _, Redeclare>::new("Redeclare", TRAFFIC, Light::Green)
                .trigger(TRAFFIC, Signal::Go, Light::Red, Light::Green, Redeclare::refuse)
                .trigger(TRAFFIC, Signal::Slow, Light::Green, Light::Amber, Redeclare::refuse)
        )
    }

    #[test]
    fn test_first_wins_keeps_one_edge_per_key() {
        let registry = with_duplicate_go();
        let mut machine = GraphBuilder::new(&registry).build(TRAFFIC, Arc::new(Panel::default()), Light::Red).unwrap();

        let go_edges = machine.permitted_edges(&Light::Red).iter().filter(|e| e.trigger == Signal::Go).count();
        assert_eq!(go_edges, 1);
        // The kept edge is RedLight's always-true guard, not the refusing redeclaration
        assert!(machine.fire(Signal::Go).unwrap().is_accepted());
    }

    #[test]
    fn test_reject_policy_fails_on_duplicate_key() {
        let registry = with_duplicate_go();
        let result = GraphBuilder::new(&registry).with_policy(DuplicatePolicy::Reject).build(
            TRAFFIC,
            Arc::new(Panel::default()),
            Light::Red
        );

        match result {
            Err(WorkflowError::DuplicateTransition { first, second, .. }) => {
                assert_eq!(first, "RedLight");
                assert_eq!(second, "Redeclare");
            }
            other => panic!("expected duplicate transition error, got {:?}", other.err())
        }
    }

    #[test]
    fn test_missing_handler_for_target_or_initial_state_is_fatal() {
        let registry = HandlerRegistry::new().with(red()).with(amber());
        let result = GraphBuilder::new(&registry).build(TRAFFIC, Arc::new(Panel::default()), Light::Red);
        assert!(matches!(result, Err(WorkflowError::MissingHandler { ref state, .. }) if state == "Green"));

        let registry = traffic();
        let empty = GraphBuilder::new(&registry).build("Unknown", Arc::new(Panel::default()), Light::Red);
        assert!(matches!(empty, Err(WorkflowError::MissingHandler { .. })));
    }
}
