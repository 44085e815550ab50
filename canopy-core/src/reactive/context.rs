//! Context Channels
//!
//! A channel carries a value from a provider to any reader nested inside it,
//! without passing the value through every level in between.
//!
//! # Resolution
//!
//! A read resolves to the nearest enclosing provider of the same channel.
//! Nested providers shadow outer ones for their own subtree only, and
//! sibling providers never see each other. With no provider in scope the
//! channel's declared default is returned; a channel declared without a
//! default reports [`CoreError::MissingProvider`] instead.
//!
//! # Two forms
//!
//! - Inside the runtime, providers and readers are instances and the lookup
//!   walks parent pointers in the instance arena (see `RenderCx::provide`
//!   and `RenderCx::use_context`).
//! - Outside it, [`Scope`] gives the same semantics lexically:
//!   `scope.provide(&channel, value, |inner| ...)` runs a closure with the
//!   channel bound. Scopes are an immutable linked chain on the stack, so
//!   there is no global state to reset.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{CoreError, Result};

/// Unique identifier for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u64);

impl ChannelId {
    /// Generate a new unique channel ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ChannelId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// Type-erased provided value.
pub(crate) type ErasedValue = dyn Any + Send + Sync;

/// A context token.
///
/// # Example
///
/// ```rust,ignore
/// let user = Channel::new(User { name: "Guest".into(), logged_in: false });
///
/// Scope::root().provide(&user, User::karan(), |scope| {
///     assert!(scope.read(&user).unwrap().logged_in);
/// });
/// assert!(!Scope::root().read(&user).unwrap().logged_in);
/// ```
#[derive(Clone)]
pub struct Channel<T> {
    id: ChannelId,
    default: Option<T>,
}

impl<T> Channel<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a channel that falls back to `default` outside any provider.
    pub fn new(default: T) -> Self {
        Self {
            id: ChannelId::new(),
            default: Some(default),
        }
    }

    /// Create a channel that must always be read under a provider.
    pub fn required() -> Self {
        Self {
            id: ChannelId::new(),
            default: None,
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn default_value(&self) -> Option<&T> {
        self.default.as_ref()
    }

    /// Turn the result of a provider lookup into the visible value.
    pub(crate) fn resolve(&self, provided: Option<&ErasedValue>) -> Result<T> {
        if let Some(value) = provided.and_then(|v| v.downcast_ref::<T>()) {
            return Ok(value.clone());
        }
        self.default
            .clone()
            .ok_or(CoreError::MissingProvider { channel: self.id })
    }
}

impl<T> fmt::Debug for Channel<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("default", &self.default)
            .finish()
    }
}

/// A lexical provider chain.
///
/// Each `provide` call creates a child scope that borrows its parent, so the
/// binding disappears as soon as the closure returns.
pub struct Scope<'a> {
    parent: Option<&'a Scope<'a>>,
    binding: Option<(ChannelId, &'a ErasedValue)>,
}

impl Scope<'static> {
    /// The empty scope: every read sees the channel default.
    pub fn root() -> Self {
        Self {
            parent: None,
            binding: None,
        }
    }
}

impl<'a> Scope<'a> {
    /// Run `body` with `channel` bound to `value`.
    pub fn provide<T, R>(
        &self,
        channel: &Channel<T>,
        value: T,
        body: impl FnOnce(&Scope<'_>) -> R,
    ) -> R
    where
        T: Clone + Send + Sync + 'static,
    {
        let inner = Scope {
            parent: Some(self),
            binding: Some((channel.id(), &value as &ErasedValue)),
        };
        body(&inner)
    }

    /// Read the nearest binding of `channel`, or its default.
    pub fn read<T>(&self, channel: &Channel<T>) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        channel.resolve(self.lookup(channel.id()))
    }

    /// Depth of the chain, counting only scopes that bind something.
    pub fn depth(&self) -> usize {
        let own = usize::from(self.binding.is_some());
        own + self.parent.map_or(0, |parent| parent.depth())
    }

    fn lookup(&self, id: ChannelId) -> Option<&ErasedValue> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some((bound, value)) = current.binding {
                if bound == id {
                    return Some(value);
                }
            }
            scope = current.parent;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct User {
        name: &'static str,
        logged_in: bool,
    }

    fn guest() -> User {
        User {
            name: "Guest",
            logged_in: false,
        }
    }

    #[test]
    fn read_outside_scope_returns_default() {
        let channel = Channel::new(guest());
        assert_eq!(Scope::root().read(&channel).unwrap(), guest());
    }

    #[test]
    fn provider_value_is_visible_inside() {
        let channel = Channel::new(guest());
        let karan = User {
            name: "Karan",
            logged_in: true,
        };

        let seen = Scope::root().provide(&channel, karan.clone(), |scope| {
            scope.read(&channel).unwrap()
        });
        assert_eq!(seen, karan);
    }

    #[test]
    fn nested_provider_shadows_only_its_scope() {
        let theme = Channel::new("light");

        Scope::root().provide(&theme, "dark", |outer| {
            outer.provide(&theme, "contrast", |inner| {
                assert_eq!(inner.read(&theme).unwrap(), "contrast");
                assert_eq!(inner.depth(), 2);
            });
            assert_eq!(outer.read(&theme).unwrap(), "dark");
        });
        assert_eq!(Scope::root().read(&theme).unwrap(), "light");
    }

    #[test]
    fn unrelated_channels_do_not_interfere() {
        let theme = Channel::new("light");
        let locale = Channel::new("en");

        Scope::root().provide(&theme, "dark", |scope| {
            assert_eq!(scope.read(&locale).unwrap(), "en");
            scope.provide(&locale, "de", |scope| {
                assert_eq!(scope.read(&theme).unwrap(), "dark");
                assert_eq!(scope.read(&locale).unwrap(), "de");
            });
        });
    }

    #[test]
    fn required_channel_without_provider_fails() {
        let channel: Channel<u32> = Channel::required();
        let err = Scope::root().read(&channel).unwrap_err();
        assert!(matches!(err, CoreError::MissingProvider { channel: id } if id == channel.id()));

        let value = Scope::root().provide(&channel, 7, |scope| scope.read(&channel).unwrap());
        assert_eq!(value, 7);
    }
}
