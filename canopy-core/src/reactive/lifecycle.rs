//! Instance lifecycle.
//!
//! Every instance walks an explicit state machine:
//!
//! ```text
//! Created --first evaluation--> Mounted --re-evaluation--> Updating --+
//!    |                             |                          ^       |
//!    |                             |                          +-------+
//!    +-----------------------------+--------------------------+--> Unmounted
//! ```
//!
//! Each transition into `Mounted`, `Updating`, and `Unmounted` has one
//! callback slot. Components fill the slots during evaluation with
//! `RenderCx::on_mount`, `on_update`, and `on_unmount`; later
//! registrations replace earlier ones.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{CoreError, Result};
use crate::graph::InstanceId;

/// Lifecycle phase of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    /// Mounted in the tree but never evaluated.
    Created,

    /// Evaluated exactly once.
    Mounted,

    /// Evaluated more than once.
    Updating,

    /// Removed from the tree. Terminal.
    Unmounted,
}

/// Callback bound to a transition.
pub type LifecycleCallback = Arc<dyn Fn() + Send + Sync>;

/// Callback slots collected during one evaluation.
#[derive(Default, Clone)]
pub(crate) struct LifecycleSlots {
    pub(crate) on_mount: Option<LifecycleCallback>,
    pub(crate) on_update: Option<LifecycleCallback>,
    pub(crate) on_unmount: Option<LifecycleCallback>,
}

impl LifecycleSlots {
    /// Overwrite the slots that `other` fills.
    fn merge(&mut self, other: LifecycleSlots) {
        if other.on_mount.is_some() {
            self.on_mount = other.on_mount;
        }
        if other.on_update.is_some() {
            self.on_update = other.on_update;
        }
        if other.on_unmount.is_some() {
            self.on_unmount = other.on_unmount;
        }
    }
}

/// The per-instance state machine.
pub(crate) struct Lifecycle {
    phase: LifecyclePhase,
    slots: LifecycleSlots,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            phase: LifecyclePhase::Created,
            slots: LifecycleSlots::default(),
        }
    }

    pub(crate) fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    pub(crate) fn register(&mut self, slots: LifecycleSlots) {
        self.slots.merge(slots);
    }

    /// Record a completed evaluation: `Created -> Mounted` the first time,
    /// `-> Updating` afterwards. Returns the callback for that transition.
    pub(crate) fn evaluated(&mut self, instance: InstanceId) -> Result<Option<LifecycleCallback>> {
        let to = match self.phase {
            LifecyclePhase::Created => LifecyclePhase::Mounted,
            LifecyclePhase::Mounted | LifecyclePhase::Updating => LifecyclePhase::Updating,
            LifecyclePhase::Unmounted => {
                return Err(CoreError::InvalidTransition {
                    instance,
                    from: self.phase,
                    to: LifecyclePhase::Updating,
                })
            }
        };
        self.transition(instance, to)
    }

    /// Move to `to`, returning the callback bound to that transition.
    pub(crate) fn transition(
        &mut self,
        instance: InstanceId,
        to: LifecyclePhase,
    ) -> Result<Option<LifecycleCallback>> {
        use LifecyclePhase::*;

        let allowed = matches!(
            (self.phase, to),
            (Created, Mounted)
                | (Mounted, Updating)
                | (Updating, Updating)
                | (Created, Unmounted)
                | (Mounted, Unmounted)
                | (Updating, Unmounted)
        );
        if !allowed {
            return Err(CoreError::InvalidTransition {
                instance,
                from: self.phase,
                to,
            });
        }

        self.phase = to;
        Ok(match to {
            Mounted => self.slots.on_mount.clone(),
            Updating => self.slots.on_update.clone(),
            Unmounted => self.slots.on_unmount.take(),
            Created => None,
        })
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("phase", &self.phase)
            .field("on_mount", &self.slots.on_mount.is_some())
            .field("on_update", &self.slots.on_update.is_some())
            .field("on_unmount", &self.slots.on_unmount.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>) -> LifecycleCallback {
        let counter = Arc::clone(counter);
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn evaluations_walk_created_mounted_updating() {
        let id = InstanceId::new();
        let mut lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.phase(), LifecyclePhase::Created);

        lifecycle.evaluated(id).unwrap();
        assert_eq!(lifecycle.phase(), LifecyclePhase::Mounted);

        lifecycle.evaluated(id).unwrap();
        lifecycle.evaluated(id).unwrap();
        assert_eq!(lifecycle.phase(), LifecyclePhase::Updating);
    }

    #[test]
    fn transitions_return_their_callbacks() {
        let id = InstanceId::new();
        let mounts = Arc::new(AtomicUsize::new(0));
        let updates = Arc::new(AtomicUsize::new(0));
        let unmounts = Arc::new(AtomicUsize::new(0));

        let mut lifecycle = Lifecycle::new();
        lifecycle.register(LifecycleSlots {
            on_mount: Some(counting(&mounts)),
            on_update: Some(counting(&updates)),
            on_unmount: Some(counting(&unmounts)),
        });

        for _ in 0..3 {
            if let Some(callback) = lifecycle.evaluated(id).unwrap() {
                callback();
            }
        }
        if let Some(callback) = lifecycle.transition(id, LifecyclePhase::Unmounted).unwrap() {
            callback();
        }

        assert_eq!(mounts.load(Ordering::SeqCst), 1);
        assert_eq!(updates.load(Ordering::SeqCst), 2);
        assert_eq!(unmounts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn register_keeps_unfilled_slots() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut lifecycle = Lifecycle::new();

        lifecycle.register(LifecycleSlots {
            on_unmount: Some(counting(&counter)),
            ..LifecycleSlots::default()
        });
        lifecycle.register(LifecycleSlots::default());

        let callback = lifecycle
            .transition(InstanceId::new(), LifecyclePhase::Unmounted)
            .unwrap();
        assert!(callback.is_some());
    }

    #[test]
    fn unmounted_is_terminal() {
        let id = InstanceId::new();
        let mut lifecycle = Lifecycle::new();
        lifecycle.transition(id, LifecyclePhase::Unmounted).unwrap();

        assert!(matches!(
            lifecycle.evaluated(id),
            Err(CoreError::InvalidTransition {
                from: LifecyclePhase::Unmounted,
                ..
            })
        ));
        assert!(lifecycle.transition(id, LifecyclePhase::Mounted).is_err());
    }
}
