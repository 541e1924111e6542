//! Guard predicates bound to handler instances
//!
//! A [`Guard`] is an opaque zero-argument predicate. The runtime stores and
//! evaluates guards without knowing which handler type they came from; the
//! binding to a concrete instance happens once, at graph assembly.

use std::{fmt, sync::Arc};

use crate::domain::error::WorkflowError;

/// Result of evaluating a guard. `Err` is treated as "not permitted" by the runtime.
pub type GuardResult = Result<bool, WorkflowError>;

type Predicate = dyn Fn() -> GuardResult + Send + Sync;

/// A bound, callable transition guard
#[derive(Clone)]
pub struct Guard {
    label:     String,
    predicate: Arc<Predicate>
}

impl Guard {
    /// Bind `method` to one specific handler instance
    ///
    /// The returned guard keeps the instance alive and calls `method(&instance)`
    /// every time it is evaluated.
    pub fn bind<H>(instance: Arc<H>, method: fn(&H) -> GuardResult) -> Self
    where
        H: Send + Sync + 'static
    {
        Self {
            label:     std::any::type_name::<H>().rsplit("::").next().unwrap_or("guard").to_string(),
            predicate: Arc::new(move || method(&instance))
        }
    }

    /// Wrap an arbitrary closure
    pub fn from_fn<F>(predicate: F) -> Self
    where
        F: Fn() -> GuardResult + Send + Sync + 'static
    {
        Self { label: "closure".to_string(), predicate: Arc::new(predicate) }
    }

    /// A guard that always permits the transition
    pub fn always() -> Self {
        Self::from_fn(|| Ok(true)).with_label("always")
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn evaluate(&self) -> GuardResult {
        (self.predicate)()
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard").field("label", &self.label).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    struct Gate {
        open:  AtomicBool,
        calls: AtomicUsize
    }

    impl Gate {
        fn is_open(&self) -> GuardResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.open.load(Ordering::SeqCst))
        }
    }

    #[test]
    fn test_bound_guard_reads_its_own_instance() {
        let first = Arc::new(Gate { open: AtomicBool::new(true), calls: AtomicUsize::new(0) });
        let second = Arc::new(Gate { open: AtomicBool::new(false), calls: AtomicUsize::new(0) });

        let first_guard = Guard::bind(first.clone(), Gate::is_open);
        let second_guard = Guard::bind(second.clone(), Gate::is_open);

        assert!(first_guard.evaluate().unwrap());
        assert!(!second_guard.evaluate().unwrap());

        // The guard observes later changes to the instance
        second.open.store(true, Ordering::SeqCst);
        assert!(second_guard.evaluate().unwrap());

        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 2);
        assert_eq!(first_guard.label(), "Gate");
    }

    #[test]
    fn test_guard_errors_are_returned_not_swallowed() {
        let guard = Guard::from_fn(|| Err(WorkflowError::Guard("store offline".to_string())));
        assert!(guard.evaluate().is_err());
        assert!(Guard::always().evaluate().unwrap());
    }
}
