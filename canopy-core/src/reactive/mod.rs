//! Reactive Primitives
//!
//! This module implements the hook-based component model: state slots,
//! context channels, refs, effects, lifecycle callbacks, and the runtime that
//! schedules re-evaluation.
//!
//! # Concepts
//!
//! ## State
//!
//! `cx.use_state(initial)` returns the value committed for the current
//! evaluation and a [`Setter`]. Setter calls are applied in call order to
//! the latest pending value and mark the owning instance dirty. Nothing is
//! re-evaluated until the host flushes, so any number of setter calls in one
//! event produce a single re-evaluation.
//!
//! ## Context
//!
//! A [`Channel`] carries a value from a provider to every descendant that
//! reads it. A reader sees the nearest enclosing provider, or the channel
//! default when there is none. Readers are re-evaluated when the value they
//! resolved to changes. [`Scope`] offers the same resolution rules for plain
//! nested calls without a runtime.
//!
//! ## Refs
//!
//! A [`RefSlot`] is a mutable box that survives re-evaluation. Writing to it
//! never schedules anything.
//!
//! ## Effects and lifecycle
//!
//! Effects and lifecycle callbacks run after the pass that evaluated their
//! instance, never during evaluation. See [`Deps`] and [`LifecyclePhase`].
//!
//! # Implementation Notes
//!
//! Hook identity is call position within an evaluation, so a component must
//! call its hooks unconditionally and in the same order every time.

mod context;
mod effect;
mod hooks;
mod lifecycle;
mod reference;
mod render;
mod runtime;
mod state;
mod subscriber;

pub use context::{Channel, ChannelId, Scope};
pub use effect::{cleanup, Cleanup, Deps, IntoCleanup};
pub use lifecycle::{LifecycleCallback, LifecyclePhase};
pub use reference::RefSlot;
pub use render::{component, Component, FnComponent, RenderCx};
pub use runtime::{FlushReport, Runtime};
pub use state::{SetAction, Setter};
pub use subscriber::{DirtyCallback, DirtyListeners, ListenerId};
