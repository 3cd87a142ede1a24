//! Results that may or may not be available yet.
//!
//! Transforms in a chain are allowed to answer with a plain value, with an error,
//! or with something that settles later. Instead of probing values for
//! promise-like methods, those three cases are spelled out by [`Outcome`], and
//! [`IntoOutcome`] says which types can be turned into one:
//!
//! - `Result<T, E>` is available now, successfully or not,
//! - [`Outcome<T, E>`] is itself,
//! - [`Pipe<X, T, E>`](crate::Pipe) settles with its final value.
//!
//! The continuation of [`then`](crate::Pipe::then) has one more possibility: it
//! may hand over a whole pipe to continue the chain with. That is what [`Step`]
//! and [`IntoStep`] are for.

use std::future::{Future, IntoFuture};

use futures::{future::BoxFuture, FutureExt};

use crate::Pipe;

/// A value, an error, or a future that eventually produces one of them.
pub enum Outcome<T, E> {
    Value(T),
    Error(E),
    Future(BoxFuture<'static, Result<T, E>>),
}

impl<T, E> Outcome<T, E> {
    pub fn future<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        Outcome::Future(future.boxed())
    }

    /// Waits for the outcome, if it has to be waited for.
    pub async fn settle(self) -> Result<T, E> {
        match self {
            Outcome::Value(value) => Ok(value),
            Outcome::Error(error) => Err(error),
            Outcome::Future(future) => future.await,
        }
    }
}

impl<T, E> From<Result<T, E>> for Outcome<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Outcome::Value(value),
            Err(error) => Outcome::Error(error),
        }
    }
}

pub trait IntoOutcome<E> {
    type Output;

    fn into_outcome(self) -> Outcome<Self::Output, E>;
}

impl<T, E> IntoOutcome<E> for Outcome<T, E> {
    type Output = T;

    fn into_outcome(self) -> Outcome<T, E> {
        self
    }
}

impl<T, E> IntoOutcome<E> for Result<T, E> {
    type Output = T;

    fn into_outcome(self) -> Outcome<T, E> {
        self.into()
    }
}

impl<X, T, E> IntoOutcome<E> for Pipe<X, T, E>
where
    X: Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    type Output = T;

    fn into_outcome(self) -> Outcome<T, E> {
        Outcome::Future(self.into_future())
    }
}

/// What the continuation of [`then`](crate::Pipe::then) answers with.
pub enum Step<T, R, E> {
    /// Settle the chain with this outcome.
    Outcome(Outcome<R, E>),
    /// Continue the chain with this pipe, its elements and its final message.
    Pipe(Pipe<T, R, E>),
}

/// Conversion into a [`Step`] following a chain that streams `T`.
///
/// Anything that is not a pipe keeps the element type `T` of the chain it
/// continues; a pipe brings its own.
pub trait IntoStep<T, E> {
    type Emit;
    type Value;

    fn into_step(self) -> Step<Self::Emit, Self::Value, E>;
}

impl<T, R, E> IntoStep<T, E> for Result<R, E> {
    type Emit = T;
    type Value = R;

    fn into_step(self) -> Step<T, R, E> {
        Step::Outcome(self.into())
    }
}

impl<T, R, E> IntoStep<T, E> for Outcome<R, E> {
    type Emit = T;
    type Value = R;

    fn into_step(self) -> Step<T, R, E> {
        Step::Outcome(self)
    }
}

impl<T, U, R, E> IntoStep<T, E> for Pipe<U, R, E> {
    type Emit = U;
    type Value = R;

    fn into_step(self) -> Step<U, R, E> {
        Step::Pipe(self)
    }
}

impl<T, U, R, E> IntoStep<T, E> for Step<U, R, E> {
    type Emit = U;
    type Value = R;

    fn into_step(self) -> Step<U, R, E> {
        self
    }
}
