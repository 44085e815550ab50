//! Hook storage.
//!
//! Hooks are identified by call position: the n-th `use_*` call of an
//! evaluation always maps to the n-th slot. The list is sealed after the
//! first successful evaluation; from then on every evaluation must declare
//! the same hooks in the same order, otherwise the runtime reports
//! [`CoreError::HookOrderMismatch`].

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;

use super::effect::{Cleanup, EffectState, SharedEffect};
use super::reference::RefSlot;
use super::state::{SharedCell, StateCell};
use crate::error::{CoreError, Result};
use crate::graph::InstanceId;

/// One hook slot.
pub(crate) enum Hook {
    /// A `SharedCell<T>`, erased.
    State(Arc<dyn Any + Send + Sync>),
    /// A `RefSlot<T>`, erased.
    Ref(Arc<dyn Any + Send + Sync>),
    Effect(SharedEffect),
}

impl Hook {
    fn kind(&self) -> HookKind {
        match self {
            Hook::State(_) => HookKind::State,
            Hook::Ref(_) => HookKind::Ref,
            Hook::Effect(_) => HookKind::Effect,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HookKind {
    State,
    Ref,
    Effect,
}

/// The ordered hook slots of one instance.
#[derive(Default)]
pub(crate) struct HookList {
    hooks: Vec<Hook>,
    cursor: usize,
    sealed: bool,
}

impl HookList {
    /// Rewind before an evaluation.
    pub(crate) fn begin(&mut self) {
        self.cursor = 0;
    }

    /// Return the slot at the cursor, creating it on the first evaluation.
    pub(crate) fn next(
        &mut self,
        instance: InstanceId,
        kind: HookKind,
        init: impl FnOnce() -> Hook,
    ) -> Result<&Hook> {
        let index = self.cursor;

        if index == self.hooks.len() {
            if self.sealed {
                return Err(CoreError::HookOrderMismatch { instance, index });
            }
            self.hooks.push(init());
        }

        if self.hooks[index].kind() != kind {
            return Err(CoreError::HookOrderMismatch { instance, index });
        }

        self.cursor += 1;
        Ok(&self.hooks[index])
    }

    /// The state cell at the cursor.
    pub(crate) fn state<T>(&mut self, instance: InstanceId, init: impl FnOnce() -> T) -> Result<SharedCell<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        let index = self.cursor;
        let hook = self.next(instance, HookKind::State, || {
            let cell: SharedCell<T> = Arc::new(Mutex::new(StateCell::new(init())));
            Hook::State(cell)
        })?;

        match hook {
            Hook::State(erased) => Arc::clone(erased)
                .downcast::<Mutex<StateCell<T>>>()
                .map_err(|_| CoreError::HookOrderMismatch { instance, index }),
            _ => Err(CoreError::HookOrderMismatch { instance, index }),
        }
    }

    /// The ref slot at the cursor.
    pub(crate) fn reference<T>(&mut self, instance: InstanceId, init: impl FnOnce() -> T) -> Result<RefSlot<T>>
    where
        T: Send + 'static,
    {
        let index = self.cursor;
        let hook = self.next(instance, HookKind::Ref, || Hook::Ref(Arc::new(RefSlot::new(init()))))?;

        match hook {
            Hook::Ref(erased) => erased
                .downcast_ref::<RefSlot<T>>()
                .cloned()
                .ok_or(CoreError::HookOrderMismatch { instance, index }),
            _ => Err(CoreError::HookOrderMismatch { instance, index }),
        }
    }

    /// The effect state at the cursor.
    pub(crate) fn effect(&mut self, instance: InstanceId) -> Result<SharedEffect> {
        let index = self.cursor;
        let hook = self.next(instance, HookKind::Effect, || {
            Hook::Effect(Arc::new(Mutex::new(EffectState::default())))
        })?;

        match hook {
            Hook::Effect(state) => Ok(Arc::clone(state)),
            _ => Err(CoreError::HookOrderMismatch { instance, index }),
        }
    }

    /// Close an evaluation, checking that no hook was skipped.
    pub(crate) fn finish(&mut self, instance: InstanceId) -> Result<()> {
        if self.sealed && self.cursor != self.hooks.len() {
            return Err(CoreError::HookOrderMismatch {
                instance,
                index: self.cursor,
            });
        }
        self.sealed = true;
        Ok(())
    }

    /// Collect outstanding effect cleanups, used on unmount.
    pub(crate) fn drain_cleanups(&mut self) -> Vec<Cleanup> {
        self.hooks
            .iter()
            .filter_map(|hook| match hook {
                Hook::Effect(state) => state.lock().take_cleanup(),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.hooks.len()
    }
}
