//! Effect Hook
//!
//! An effect is a side-effecting callback attached to an instance. It runs
//! after the evaluation pass that produced the instance's output has
//! finished, never during evaluation.
//!
//! # Dependency modes
//!
//! - [`Deps::Always`]: run after every evaluation
//! - [`Deps::Once`]: run after the first evaluation only (mount)
//! - [`Deps::On`]: run when the dependency value differs from the one seen
//!   on the previous evaluation
//!
//! # Cleanup
//!
//! An effect may return a [`Cleanup`]. The cleanup runs right before the
//! effect runs again, and when the owning instance is unmounted. This is
//! how timers, subscriptions, and listeners are torn down.
//!
//! # Use Cases
//!
//! - Logging when a value changes
//! - Starting work once on mount
//! - Calling setters in response to committed state (this schedules a
//!   further pass within the same flush)

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Teardown returned by an effect.
pub type Cleanup = Box<dyn FnOnce() + Send>;

/// Box a closure as a [`Cleanup`].
pub fn cleanup<F>(f: F) -> Cleanup
where
    F: FnOnce() + Send + 'static,
{
    Box::new(f)
}

/// Values an effect callback may return.
pub trait IntoCleanup {
    fn into_cleanup(self) -> Option<Cleanup>;
}

impl IntoCleanup for () {
    fn into_cleanup(self) -> Option<Cleanup> {
        None
    }
}

impl IntoCleanup for Cleanup {
    fn into_cleanup(self) -> Option<Cleanup> {
        Some(self)
    }
}

impl IntoCleanup for Option<Cleanup> {
    fn into_cleanup(self) -> Option<Cleanup> {
        self
    }
}

/// When an effect should run.
#[derive(Debug, Clone, PartialEq)]
pub enum Deps<D> {
    Always,
    Once,
    On(D),
}

impl Deps<()> {
    /// `Deps::Always` without naming a dependency type.
    pub fn always() -> Self {
        Deps::Always
    }

    /// `Deps::Once` without naming a dependency type.
    pub fn once() -> Self {
        Deps::Once
    }
}

/// Persistent state of one `use_effect` call.
#[derive(Default)]
pub(crate) struct EffectState {
    /// Dependency value from the last committed run.
    deps: Option<Box<dyn Any + Send + Sync>>,

    /// Whether the effect ever ran.
    scheduled_once: bool,

    /// Cleanup returned by the last run.
    cleanup: Option<Cleanup>,

    /// Number of completed runs.
    runs: usize,
}

impl EffectState {
    /// Decide whether the effect must run for this evaluation.
    ///
    /// Nothing is recorded yet: the returned [`StagedDeps`] is written back
    /// by [`commit`](Self::commit) once the effect actually runs, so a render
    /// that fails after declaring the effect leaves the state untouched.
    pub(crate) fn should_run<D>(&self, deps: Deps<D>) -> Option<StagedDeps>
    where
        D: PartialEq + Send + Sync + 'static,
    {
        match deps {
            Deps::Always => Some(StagedDeps(None)),
            Deps::Once => (!self.scheduled_once).then_some(StagedDeps(None)),
            Deps::On(next) => {
                let changed = match self.deps.as_ref().and_then(|d| d.downcast_ref::<D>()) {
                    Some(previous) => *previous != next,
                    None => true,
                };
                changed.then(|| StagedDeps(Some(Box::new(next))))
            }
        }
    }

    /// Record that a staged run happened.
    pub(crate) fn commit(&mut self, staged: StagedDeps) {
        if let Some(deps) = staged.0 {
            self.deps = Some(deps);
        }
        self.scheduled_once = true;
    }

    /// Take the pending cleanup, leaving none behind.
    pub(crate) fn take_cleanup(&mut self) -> Option<Cleanup> {
        self.cleanup.take()
    }

    pub(crate) fn runs(&self) -> usize {
        self.runs
    }
}

pub(crate) type SharedEffect = Arc<Mutex<EffectState>>;

/// Dependency value held back until the effect commits.
pub(crate) struct StagedDeps(Option<Box<dyn Any + Send + Sync>>);

/// An effect scheduled by an evaluation, waiting for the pass to finish.
pub(crate) struct PendingEffect {
    state: SharedEffect,
    staged: StagedDeps,
    run: Box<dyn FnOnce() -> Option<Cleanup> + Send>,
}

impl PendingEffect {
    pub(crate) fn new<F, C>(state: SharedEffect, staged: StagedDeps, run: F) -> Self
    where
        F: FnOnce() -> C + Send + 'static,
        C: IntoCleanup,
    {
        Self {
            state,
            staged,
            run: Box::new(move || run().into_cleanup()),
        }
    }

    /// Run the previous cleanup, then the effect, and store the new cleanup.
    ///
    /// No lock is held while user code runs.
    pub(crate) fn execute(self) {
        let previous = {
            let mut state = self.state.lock();
            state.commit(self.staged);
            state.take_cleanup()
        };
        if let Some(previous) = previous {
            previous();
        }

        let next = (self.run)();

        let mut state = self.state.lock();
        state.cleanup = next;
        state.runs += 1;
    }
}

impl fmt::Debug for PendingEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingEffect")
            .field("runs", &self.state.lock().runs())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    /// Decide and immediately commit, as a successful evaluation would.
    fn run_and_commit<D>(state: &mut EffectState, deps: Deps<D>) -> bool
    where
        D: PartialEq + Send + Sync + 'static,
    {
        match state.should_run(deps) {
            Some(staged) => {
                state.commit(staged);
                true
            }
            None => false,
        }
    }

    #[test]
    fn always_runs_every_time() {
        let mut state = EffectState::default();
        assert!(run_and_commit(&mut state, Deps::always()));
        assert!(run_and_commit(&mut state, Deps::always()));
    }

    #[test]
    fn once_runs_only_first_time() {
        let mut state = EffectState::default();
        assert!(run_and_commit(&mut state, Deps::once()));
        assert!(!run_and_commit(&mut state, Deps::once()));
        assert!(!run_and_commit(&mut state, Deps::once()));
    }

    #[test]
    fn on_runs_when_dependency_changes() {
        let mut state = EffectState::default();

        assert!(run_and_commit(&mut state, Deps::On(0)));
        assert!(!run_and_commit(&mut state, Deps::On(0)));
        assert!(run_and_commit(&mut state, Deps::On(1)));
        assert!(!run_and_commit(&mut state, Deps::On(1)));
        assert!(run_and_commit(&mut state, Deps::On(0)));
    }

    #[test]
    fn uncommitted_decisions_are_not_remembered() {
        let state = EffectState::default();

        // Staged but dropped, as when the render fails afterwards.
        assert!(state.should_run(Deps::On(1)).is_some());
        assert!(state.should_run(Deps::On(1)).is_some());
        assert!(state.should_run(Deps::once()).is_some());
        assert!(state.should_run(Deps::once()).is_some());
    }

    #[test]
    fn execute_runs_previous_cleanup_first() {
        let state: SharedEffect = Arc::new(Mutex::new(EffectState::default()));
        let log = Arc::new(Mutex::new(Vec::new()));

        for round in 0..3 {
            let log = Arc::clone(&log);
            PendingEffect::new(Arc::clone(&state), StagedDeps(None), move || {
                log.lock().push(format!("run {round}"));
                let log = Arc::clone(&log);
                cleanup(move || log.lock().push(format!("cleanup {round}")))
            })
            .execute();
        }

        assert_eq!(
            *log.lock(),
            vec!["run 0", "cleanup 0", "run 1", "cleanup 1", "run 2"]
        );
        assert_eq!(state.lock().runs(), 3);
        assert!(state.lock().take_cleanup().is_some());
    }

    #[test]
    fn unit_effects_leave_no_cleanup() {
        let state: SharedEffect = Arc::new(Mutex::new(EffectState::default()));
        let hits = Arc::new(AtomicI32::new(0));
        let hits_clone = Arc::clone(&hits);

        PendingEffect::new(Arc::clone(&state), StagedDeps(None), move || {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        })
        .execute();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(state.lock().take_cleanup().is_none());
    }
}
