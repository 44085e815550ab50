//! Components and the evaluation context.
//!
//! A [`Component`] is anything with a `render` function. The runtime calls
//! `render` with a [`RenderCx`], through which the component declares its
//! hooks, reads and provides context, registers lifecycle callbacks, and
//! declares keyed child instances.
//!
//! `render` must be a pure function of the hook values and context it
//! reads: evaluating an instance twice with unchanged inputs yields the
//! same [`Output`].

use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;
use smallvec::SmallVec;

use super::context::{Channel, ChannelId};
use super::effect::{Deps, IntoCleanup, PendingEffect};
use super::hooks::HookList;
use super::lifecycle::LifecycleSlots;
use super::reference::RefSlot;
use super::runtime::Shared;
use super::state::Setter;
use crate::error::Result;
use crate::graph::InstanceId;
use crate::output::Output;

/// A presentation function with identity.
pub trait Component: Send + Sync + 'static {
    /// Produce the output for the current hook values and context.
    fn render(&self, cx: &mut RenderCx<'_>) -> Result<Output>;

    /// Name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// A component backed by a closure.
pub struct FnComponent<F> {
    name: &'static str,
    render: F,
}

/// Wrap a closure as a [`Component`].
///
/// # Example
///
/// ```rust,ignore
/// let counter = component("Counter", |cx| {
///     let (count, set_count) = cx.use_state(0)?;
///     Ok(Output::element("h3").with(Output::text(format!("Count: {count}"))))
/// });
/// ```
pub fn component<F>(name: &'static str, render: F) -> FnComponent<F>
where
    F: Fn(&mut RenderCx<'_>) -> Result<Output> + Send + Sync + 'static,
{
    FnComponent { name, render }
}

impl<F> Component for FnComponent<F>
where
    F: Fn(&mut RenderCx<'_>) -> Result<Output> + Send + Sync + 'static,
{
    fn render(&self, cx: &mut RenderCx<'_>) -> Result<Output> {
        (self.render)(cx)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Everything an evaluation declared besides its output.
pub(crate) struct RenderParts {
    pub(crate) effects: Vec<PendingEffect>,
    pub(crate) keys: IndexSet<String>,
    pub(crate) provided: SmallVec<[ChannelId; 2]>,
    pub(crate) lifecycle: LifecycleSlots,
}

/// The context passed to [`Component::render`].
pub struct RenderCx<'a> {
    instance: InstanceId,
    shared: &'a Arc<Shared>,
    hooks: &'a mut HookList,
    effects: Vec<PendingEffect>,
    keys: IndexSet<String>,
    provided: SmallVec<[ChannelId; 2]>,
    lifecycle: LifecycleSlots,
}

impl<'a> RenderCx<'a> {
    pub(crate) fn new(instance: InstanceId, shared: &'a Arc<Shared>, hooks: &'a mut HookList) -> Self {
        Self {
            instance,
            shared,
            hooks,
            effects: Vec::new(),
            keys: IndexSet::new(),
            provided: SmallVec::new(),
            lifecycle: LifecycleSlots::default(),
        }
    }

    /// The instance being evaluated.
    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// Declare a state slot.
    ///
    /// Returns the value committed for this evaluation and a setter. The
    /// initial value is only used on the first evaluation.
    pub fn use_state<T>(&mut self, initial: T) -> Result<(T, Setter<T>)>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.use_state_with(move || initial)
    }

    /// Like [`use_state`](Self::use_state), computing the initial value lazily.
    pub fn use_state_with<T>(&mut self, init: impl FnOnce() -> T) -> Result<(T, Setter<T>)>
    where
        T: Clone + Send + Sync + 'static,
    {
        let cell = self.hooks.state(self.instance, init)?;
        let value = cell.lock().commit();
        let setter = Setter::new(self.instance, cell, self.shared.sink());
        Ok((value, setter))
    }

    /// Declare a mutable ref. Writing to it never re-evaluates anything.
    pub fn use_ref<T>(&mut self, initial: T) -> Result<RefSlot<T>>
    where
        T: Send + 'static,
    {
        self.hooks.reference(self.instance, move || initial)
    }

    /// Declare an effect, run after this evaluation's pass if `deps` say so.
    pub fn use_effect<D, F, C>(&mut self, deps: Deps<D>, effect: F) -> Result<()>
    where
        D: PartialEq + Send + Sync + 'static,
        F: FnOnce() -> C + Send + 'static,
        C: IntoCleanup,
    {
        let state = self.hooks.effect(self.instance)?;
        let staged = state.lock().should_run(deps);
        if let Some(staged) = staged {
            self.effects.push(PendingEffect::new(state, staged, effect));
        }
        Ok(())
    }

    /// Read a channel from the nearest enclosing provider.
    ///
    /// The instance is subscribed: if that provider's value changes, this
    /// instance is re-evaluated. An instance never sees its own provision.
    pub fn use_context<T>(&mut self, channel: &Channel<T>) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let provided = self.shared.read_context(self.instance, channel.id());
        channel.resolve(provided.as_deref())
    }

    /// Provide a channel value to every descendant.
    ///
    /// A provision not repeated on a later evaluation is withdrawn.
    pub fn provide<T>(&mut self, channel: &Channel<T>, value: T) -> Result<()>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        if !self.provided.contains(&channel.id()) {
            self.provided.push(channel.id());
        }
        self.shared.provide(self.instance, channel.id(), value)
    }

    /// Declare a keyed child instance and get its output placeholder.
    ///
    /// A key seen on the previous evaluation keeps its instance (and hook
    /// state) and gets the new component; keys no longer declared are
    /// unmounted after this evaluation.
    pub fn child<C>(&mut self, key: impl Into<String>, component: C) -> Result<Output>
    where
        C: Component,
    {
        let key = key.into();
        self.keys.insert(key.clone());
        let child = self.shared.declare_child(self.instance, key, Arc::new(component))?;
        Ok(Output::child(child))
    }

    /// Run after the first evaluation.
    pub fn on_mount(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.lifecycle.on_mount = Some(Arc::new(f));
    }

    /// Run after every later evaluation.
    pub fn on_update(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.lifecycle.on_update = Some(Arc::new(f));
    }

    /// Run when the instance is removed.
    pub fn on_unmount(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.lifecycle.on_unmount = Some(Arc::new(f));
    }

    pub(crate) fn into_parts(self) -> RenderParts {
        RenderParts {
            effects: self.effects,
            keys: self.keys,
            provided: self.provided,
            lifecycle: self.lifecycle,
        }
    }
}

impl fmt::Debug for RenderCx<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderCx")
            .field("instance", &self.instance)
            .field("pending_effects", &self.effects.len())
            .field("children", &self.keys.len())
            .finish()
    }
}
