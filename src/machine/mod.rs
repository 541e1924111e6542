//! Generic state-machine runtime
//!
//! [`StateMachine`] is parameterized by an opaque state type `S` and trigger
//! type `T`. Each configured state carries entry/exit actions and an ordered
//! list of guarded edges. Firing a trigger evaluates the matching edges of the
//! current state in declaration order and takes the first one whose guard
//! returns `Ok(true)`.
//!
//! The runtime owns only closures. It never sees the handler types that
//! produced them.

pub mod guard;
pub mod outcome;

use std::{collections::HashMap, fmt::Debug, hash::Hash, sync::Arc};

use tracing::{Level, event};

pub use self::{
    guard::{Guard, GuardResult},
    outcome::{FireOutcome, Rejection, RejectionReason}
};
use crate::domain::{constant::machine, error::WorkflowError};

/// Entry or exit side effect
pub type Action = Arc<dyn Fn() -> Result<(), WorkflowError> + Send + Sync>;

/// Where an edge leads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeTarget<S> {
    /// Leave the state for another one
    Transition(S),
    /// Exit and re-enter the same state
    Reentry
}

/// A guarded outgoing edge of one state
#[derive(Debug, Clone)]
pub struct Edge<S, T> {
    pub trigger: T,
    pub target:  EdgeTarget<S>,
    pub guard:   Guard
}

struct StateRepresentation<S, T> {
    entry: Vec<Action>,
    exit:  Vec<Action>,
    edges: Vec<Edge<S, T>>
}

impl<S, T> StateRepresentation<S, T> {
    fn new() -> Self {
        Self { entry: Vec::new(), exit: Vec::new(), edges: Vec::new() }
    }
}

/// A runtime instance holding exactly one current state
///
/// Not meant to be shared: `fire` takes `&mut self`, so two fires can never
/// race on the same instance.
pub struct StateMachine<S, T> {
    state:           S,
    representations: HashMap<S, StateRepresentation<S, T>>
}

impl<S, T> StateMachine<S, T>
where
    S: Clone + Eq + Hash + Debug,
    T: Clone + Eq + Debug
{
    pub fn new(initial_state: S) -> Self {
        Self { state: initial_state, representations: HashMap::new() }
    }

    /// Current state
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Start (or continue) configuring `state`
    pub fn configure(&mut self, state: S) -> StateConfiguration<'_, S, T> {
        let representation = self.representations.entry(state.clone()).or_insert_with(StateRepresentation::new);
        StateConfiguration { state, representation }
    }

    pub fn is_configured(&self, state: &S) -> bool {
        self.representations.contains_key(state)
    }

    /// Edges configured for `state`, in declaration order
    pub fn permitted_edges(&self, state: &S) -> &[Edge<S, T>] {
        self.representations.get(state).map(|r| r.edges.as_slice()).unwrap_or(&[])
    }

    /// Distinct triggers whose guard currently permits a move from the current state
    ///
    /// Guard failures are logged and count as "not permitted".
    pub fn available_triggers(&self) -> Vec<T> {
        let mut available: Vec<T> = Vec::new();
        for edge in self.permitted_edges(&self.state) {
            if available.contains(&edge.trigger) {
                continue;
            }
            match edge.guard.evaluate() {
                Ok(true) => available.push(edge.trigger.clone()),
                Ok(false) => {}
                Err(e) => {
                    event!(Level::DEBUG, event = machine::GUARD_FAILED,
                           state = ?self.state, trigger = ?edge.trigger, guard = %edge.guard.label(), error = %e);
                }
            }
        }
        available
    }

    /// Whether `trigger` would currently be accepted
    pub fn can_fire(&self, trigger: &T) -> bool {
        self.select(&self.state, trigger).is_ok()
    }

    /// Fire `trigger` from the current state
    ///
    /// Ordering on success: exit actions of the current state, then the state
    /// update, then entry actions of the new state. A failing exit action
    /// leaves the state unchanged; a failing entry action restores the source
    /// state. Both are returned as errors. A trigger without a permitted edge
    /// yields [`FireOutcome::Rejected`].
    pub fn fire(&mut self, trigger: T) -> Result<FireOutcome<S, T>, WorkflowError> {
        let source = self.state.clone();
        event!(Level::DEBUG, event = machine::FIRE_REQUESTED, state = ?source, trigger = ?trigger);

        let target = match self.select(&source, &trigger) {
            Ok(target) => target,
            Err(reason) => {
                event!(Level::INFO, event = machine::FIRE_REJECTED,
                       state = ?source, trigger = ?trigger, reason = %reason);
                return Ok(FireOutcome::Rejected(Rejection { state: source, trigger, reason }));
            }
        };

        let destination = match &target {
            EdgeTarget::Transition(to) => to.clone(),
            EdgeTarget::Reentry => source.clone()
        };

        if let Err(e) = self.run_exit(&source) {
            event!(Level::ERROR, event = machine::EXIT_FAILED, state = ?source, trigger = ?trigger, error = %e);
            return Err(e);
        }

        self.state = destination.clone();

        if let Err(e) = self.run_entry(&destination) {
            event!(Level::ERROR, event = machine::ENTRY_FAILED,
                   state = ?destination, trigger = ?trigger, error = %e);
            self.state = source;
            return Err(e);
        }

        match target {
            EdgeTarget::Transition(_) => {
                event!(Level::INFO, event = machine::TRANSITIONED, from = ?source, to = ?destination, trigger = ?trigger);
                Ok(FireOutcome::Transitioned { from: source, to: destination, trigger })
            }
            EdgeTarget::Reentry => {
                event!(Level::INFO, event = machine::REENTERED, state = ?destination, trigger = ?trigger);
                Ok(FireOutcome::Reentered { state: destination, trigger })
            }
        }
    }

    fn select(&self, state: &S, trigger: &T) -> Result<EdgeTarget<S>, RejectionReason> {
        let mut candidates = 0;
        let mut failures = Vec::new();

        for edge in self.permitted_edges(state).iter().filter(|e| &e.trigger == trigger) {
            candidates += 1;
            match edge.guard.evaluate() {
                Ok(true) => return Ok(edge.target.clone()),
                Ok(false) => {}
                Err(e) => {
                    event!(Level::WARN, event = machine::GUARD_FAILED,
                           state = ?state, trigger = ?trigger, guard = %edge.guard.label(), error = %e);
                    failures.push(e);
                }
            }
        }

        if candidates == 0 {
            Err(RejectionReason::NoPermittedEdge)
        } else if failures.is_empty() {
            Err(RejectionReason::GuardsUnsatisfied)
        } else {
            Err(RejectionReason::GuardFailed(failures))
        }
    }

    fn run_exit(&self, state: &S) -> Result<(), WorkflowError> {
        match self.representations.get(state) {
            Some(representation) => representation.exit.iter().try_for_each(|action| action()),
            None => Ok(())
        }
    }

    fn run_entry(&self, state: &S) -> Result<(), WorkflowError> {
        match self.representations.get(state) {
            Some(representation) => representation.entry.iter().try_for_each(|action| action()),
            None => Ok(())
        }
    }
}

/// Builder-scoped handle returned by [`StateMachine::configure`]
pub struct StateConfiguration<'m, S, T> {
    state:          S,
    representation: &'m mut StateRepresentation<S, T>
}

impl<S, T> StateConfiguration<'_, S, T>
where
    S: Clone + Eq + Debug,
    T: Clone + Eq + Debug
{
    pub fn on_entry<F>(self, action: F) -> Self
    where
        F: Fn() -> Result<(), WorkflowError> + Send + Sync + 'static
    {
        self.representation.entry.push(Arc::new(action));
        self
    }

    pub fn on_exit<F>(self, action: F) -> Self
    where
        F: Fn() -> Result<(), WorkflowError> + Send + Sync + 'static
    {
        self.representation.exit.push(Arc::new(action));
        self
    }

    /// Permit `trigger` to move to `target` while `guard` holds
    pub fn permit_if(self, trigger: T, target: S, guard: Guard) -> Result<Self, WorkflowError> {
        if target == self.state {
            return Err(WorkflowError::Configuration(format!(
                "{:?} --{:?}--> {:?} targets its own state; use permit_reentry_if",
                self.state, trigger, target
            )));
        }
        self.push_edge(trigger, EdgeTarget::Transition(target), guard)
    }

    /// Permit `trigger` to exit and re-enter the configured state while `guard` holds
    pub fn permit_reentry_if(self, trigger: T, guard: Guard) -> Result<Self, WorkflowError> {
        self.push_edge(trigger, EdgeTarget::Reentry, guard)
    }

    fn push_edge(self, trigger: T, target: EdgeTarget<S>, guard: Guard) -> Result<Self, WorkflowError> {
        if self.representation.edges.iter().any(|e| e.trigger == trigger && e.target == target) {
            return Err(WorkflowError::Configuration(format!(
                "{:?} already has an edge {:?} -> {:?}",
                self.state, trigger, target
            )));
        }
        self.representation.edges.push(Edge { trigger, target, guard });
        Ok(self)
    }
}
