//! Canopy Core
//!
//! This crate provides the core runtime for the Canopy component model.
//! It implements:
//!
//! - Hook-based components (state, refs, effects, context)
//! - A dirty-tracking scheduler that re-evaluates parents before children
//! - An explicit per-instance lifecycle state machine
//! - Serializable output descriptions for a rendering host
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Components, hooks, context channels, and the runtime
//! - `graph`: Instance tree and update scheduler
//! - `output`: What an evaluation produces
//! - `props`: Declared defaults for component properties
//! - `config`: Runtime limits
//! - `error`: The crate error type
//!
//! # Example
//!
//! ```rust,ignore
//! use canopy_core::reactive::{component, Deps, Runtime};
//! use canopy_core::Output;
//!
//! let counter = component("Counter", |cx| {
//!     let (count, set_count) = cx.use_state(0)?;
//!     cx.use_effect(Deps::On(count), move || println!("count is {count}"))?;
//!     Ok(Output::element("button").with(Output::text(format!("Count: {count}"))))
//! });
//!
//! let runtime = Runtime::new();
//! let root = runtime.mount(counter, None)?;
//! runtime.flush()?;
//!
//! // Later, from an event handler holding `set_count`:
//! runtime.event(|| {
//!     set_count.update(|n| n + 1)?;
//!     set_count.update(|n| n + 1)
//! })?;
//! // One re-evaluation, count is now 2.
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod output;
pub mod props;
pub mod reactive;

pub use config::RuntimeConfig;
pub use error::{CoreError, Result};
pub use graph::InstanceId;
pub use output::Output;
pub use reactive::{component, Channel, Component, Deps, RenderCx, Runtime, Setter};
