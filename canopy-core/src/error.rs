//! Error Types
//!
//! Every fallible operation in the crate returns [`CoreError`]. Most
//! conditions that a UI would consider "missing" (an absent prop, a context
//! read outside any provider) resolve through declared defaults instead of
//! failing, so the variants here are either programming errors or the
//! fatal dependency-cycle report.

use thiserror::Error;

use crate::graph::InstanceId;
use crate::reactive::{ChannelId, LifecyclePhase};

/// Errors produced by the runtime.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A setter was called after its owning instance was unmounted.
    #[error("setter called on destroyed instance {instance}")]
    StaleSetter { instance: InstanceId },

    /// A channel declared without a default was read outside any provider.
    #[error("no provider active for channel {channel}")]
    MissingProvider { channel: ChannelId },

    /// An instance kept re-dirtying itself while being evaluated.
    #[error("instance {instance} re-entered evaluation {passes} times; likely a dependency cycle")]
    ReentrantEvaluationOverflow { instance: InstanceId, passes: usize },

    /// The instance is not (or no longer) part of the tree.
    #[error("unknown instance {0}")]
    UnknownInstance(InstanceId),

    /// Hooks were declared in a different order than on a previous evaluation.
    #[error("hook #{index} of instance {instance} changed kind between evaluations")]
    HookOrderMismatch { instance: InstanceId, index: usize },

    /// A lifecycle transition not allowed by the instance state machine.
    #[error("instance {instance} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        instance: InstanceId,
        from: LifecyclePhase,
        to: LifecyclePhase,
    },

    /// A props payload could not be resolved against its declared defaults.
    #[error("invalid props: {0}")]
    InvalidProps(#[source] serde_json::Error),

    /// An output tree could not be turned into JSON.
    #[error("output serialization failed: {0}")]
    Serialize(#[source] serde_json::Error),

    /// A configuration document could not be parsed.
    #[error("invalid runtime config: {0}")]
    Config(#[source] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CoreError>;
