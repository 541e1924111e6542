use std::fmt;

use crate::domain::error::WorkflowError;

/// Result of firing a trigger
///
/// A rejected trigger is an expected business outcome, not an error: the
/// current state is left untouched and the caller decides what to tell the user.
#[derive(Debug, Clone)]
pub enum FireOutcome<S, T> {
    /// Moved from one state to another
    Transitioned { from: S, to: S, trigger: T },
    /// Left and re-entered the same state
    Reentered { state: S, trigger: T },
    /// No permitted edge for the trigger
    Rejected(Rejection<S, T>)
}

impl<S, T> FireOutcome<S, T> {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, FireOutcome::Rejected(_))
    }

    /// State the machine is in after the fire
    pub fn state(&self) -> &S {
        match self {
            FireOutcome::Transitioned { to, .. } => to,
            FireOutcome::Reentered { state, .. } => state,
            FireOutcome::Rejected(rejection) => &rejection.state
        }
    }

    pub fn rejection(&self) -> Option<&Rejection<S, T>> {
        match self {
            FireOutcome::Rejected(rejection) => Some(rejection),
            _ => None
        }
    }
}

impl<S: fmt::Debug, T: fmt::Debug> fmt::Display for FireOutcome<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FireOutcome::Transitioned { from, to, trigger } => write!(f, "{:?}: {:?} -> {:?}", trigger, from, to),
            FireOutcome::Reentered { state, trigger } => write!(f, "{:?}: re-entered {:?}", trigger, state),
            FireOutcome::Rejected(rejection) => write!(f, "{}", rejection)
        }
    }
}

/// Why a trigger was not permitted
#[derive(Debug, Clone)]
pub struct Rejection<S, T> {
    pub state:   S,
    pub trigger: T,
    pub reason:  RejectionReason
}

impl<S: fmt::Debug, T: fmt::Debug> fmt::Display for Rejection<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid transition: {:?} is not permitted from {:?} ({})", self.trigger, self.state, self.reason)
    }
}

#[derive(Debug, Clone)]
pub enum RejectionReason {
    /// The current state has no edge for the trigger
    NoPermittedEdge,
    /// Every candidate guard evaluated to false
    GuardsUnsatisfied,
    /// No guard evaluated to true and at least one failed to evaluate
    GuardFailed(Vec<WorkflowError>)
}

impl RejectionReason {
    /// Whether a candidate guard is declared but not written yet
    pub fn is_not_implemented(&self) -> bool {
        match self {
            RejectionReason::GuardFailed(errors) => errors.iter().any(WorkflowError::is_not_implemented),
            _ => false
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::NoPermittedEdge => f.write_str("no edge configured"),
            RejectionReason::GuardsUnsatisfied => f.write_str("guard not satisfied"),
            RejectionReason::GuardFailed(errors) => {
                let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
                write!(f, "guard failed: {}", messages.join("; "))
            }
        }
    }
}
