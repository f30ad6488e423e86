//! Match and transform callbacks.
//!
//! Plain closures are the common form: `Fn(&M) -> bool` is a [`Matcher`],
//! `Fn(&M) -> Option<M>` is a [`Transform`] (`Some` means matched). Wrap a
//! closure in [`fallible`] when it can fail, and in [`with_args`] to keep an
//! explicit argument list in the consumer record.

use crate::error::CallbackError;

/// Decides whether a subscription receives a message.
pub trait Matcher<M>: Send + Sync {
    fn matches(&self, message: &M) -> Result<bool, CallbackError>;
}

/// Decides whether a modifier or captor claims a message, and what it
/// delivers in its place.
pub trait Transform<M>: Send + Sync {
    fn transform(&self, message: &M) -> Result<Option<M>, CallbackError>;
}

impl<M, F> Matcher<M> for F
where
    F: Fn(&M) -> bool + Send + Sync,
{
    fn matches(&self, message: &M) -> Result<bool, CallbackError> {
        Ok(self(message))
    }
}

impl<M, F> Transform<M> for F
where
    F: Fn(&M) -> Option<M> + Send + Sync,
{
    fn transform(&self, message: &M) -> Result<Option<M>, CallbackError> {
        Ok(self(message))
    }
}

/// Matches every message. Used by `observe`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Always;

impl<M> Matcher<M> for Always {
    fn matches(&self, _message: &M) -> Result<bool, CallbackError> {
        Ok(true)
    }
}

/// Adapter for callbacks returning `Result`.
#[derive(Debug, Clone, Copy)]
pub struct Fallible<F>(pub F);

/// Wrap a `Result`-returning callback as a [`Fallible`].
pub fn fallible<F>(f: F) -> Fallible<F> {
    Fallible(f)
}

impl<M, F, E> Matcher<M> for Fallible<F>
where
    F: Fn(&M) -> Result<bool, E> + Send + Sync,
    E: Into<CallbackError>,
{
    fn matches(&self, message: &M) -> Result<bool, CallbackError> {
        (self.0)(message).map_err(Into::into)
    }
}

impl<M, F, E> Transform<M> for Fallible<F>
where
    F: Fn(&M) -> Result<Option<M>, E> + Send + Sync,
    E: Into<CallbackError>,
{
    fn transform(&self, message: &M) -> Result<Option<M>, CallbackError> {
        (self.0)(message).map_err(Into::into)
    }
}

/// A callback together with the extra arguments it is evaluated with.
///
/// ```
/// use nestbus::bus::{with_args, Matcher};
///
/// let prefixed = with_args(|msg: &String, prefix: &String| msg.starts_with(prefix.as_str()), "cmd:".to_string());
/// assert!(prefixed.matches(&"cmd:stop".to_string()).unwrap());
/// assert!(!prefixed.matches(&"evt:stopped".to_string()).unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct WithArgs<F, A> {
    callback: F,
    args: A,
}

/// Pair `callback` with the `args` it is evaluated with.
pub fn with_args<F, A>(callback: F, args: A) -> WithArgs<F, A> {
    WithArgs { callback, args }
}

impl<F, A> WithArgs<F, A> {
    /// The extra arguments passed to every evaluation.
    pub fn args(&self) -> &A {
        &self.args
    }
}

impl<M, F, A> Matcher<M> for WithArgs<F, A>
where
    F: Fn(&M, &A) -> bool + Send + Sync,
    A: Send + Sync,
{
    fn matches(&self, message: &M) -> Result<bool, CallbackError> {
        Ok((self.callback)(message, &self.args))
    }
}

impl<M, F, A> Transform<M> for WithArgs<F, A>
where
    F: Fn(&M, &A) -> Option<M> + Send + Sync,
    A: Send + Sync,
{
    fn transform(&self, message: &M) -> Result<Option<M>, CallbackError> {
        Ok((self.callback)(message, &self.args))
    }
}
