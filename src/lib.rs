//! Pipes are a single primitive for two things that usually live apart: a
//! value that will be available later (a future, or promise) and a lazy
//! sequence of values pulled one at a time (a backpressured stream).
//!
//! - **Pull-driven** -- Nothing runs until the end of a chain asks for it, and
//!   every element is requested only after the previous one has been handled.
//! - **One interface** -- The same chain can emit any number of elements and
//!   then settle with a final value or an error.
//!
//! A chain is built from stages. Each stage implements [Transition], which has a
//! single operation: hand over the next [Message]. A message is either an
//! element of the stream ([Message::Emit]), the final value ([Message::Resolve])
//! or a failure ([Message::Reject]). Operators such as [map](Pipe::map),
//! [filter](Pipe::filter) or [then](Pipe::then) wrap the previous stage and
//! pull from it on demand.
//!
//! # Deferred values
//!
//! A [Pipe] created with [pipe] runs its producer on the first request. The
//! producer receives a [Resolver] and a [Rejecter]; calling either settles the
//! pipe.
//!
//! ```
//! use std::future::IntoFuture;
//!
//! use futures::executor::block_on;
//!
//! let answer = pipe::pipe(|resolver, _rejecter| {
//!     resolver.resolve(41);
//!     None
//! })
//! .then(|x: i32| Ok::<_, ()>(x + 1));
//!
//! let answer: pipe::Pipe<(), i32, ()> = answer;
//! assert_eq!(block_on(answer.into_future()), Ok(42));
//! ```
//!
//! The handles are `Send` and can be cloned, so settling can happen anywhere:
//! inside a timer, a spawned task or a callback from some other library.
//!
//! # Streams
//!
//! When the producer returns an [Emitter], the pipe is a stream. The emitter is
//! called once for every request and answers it through the one-shot [Next]
//! handle, or ends the stream through the resolver.
//!
//! ```
//! use std::future::IntoFuture;
//!
//! use futures::executor::block_on;
//!
//! let sum = pipe::from::<_, ()>(1..=7).reduce(|sum, x| sum + x, 0);
//! assert_eq!(block_on(sum.into_future()), Ok(28));
//! ```
//!
//! Elements flow only as fast as the end of the chain consumes them. A
//! [for_each](Pipe::for_each) drains its upstream by itself and then passes the
//! final message on, so it can be followed by [then](Pipe::then) or
//! [catch](Pipe::catch).
//!
//! # Failures
//!
//! An error travels downstream as [Message::Reject], skipping every transform
//! until it reaches a [catch](Pipe::catch), or the `.await` of the chain, where
//! it surfaces as `Err`. The error value is never wrapped.
//!
//! ```
//! use futures::executor::block_on;
//!
//! let caught = pipe::resolve::<i32, &str>(1)
//!     .then(|_| Err::<i32, _>("boom"))
//!     .then(|x| Ok(x + 1))
//!     .catch(|error| assert_eq!(error, "boom"));
//!
//! assert_eq!(block_on(caught), None);
//! ```
//!
//! # Bridging push producers
//!
//! Producers that cannot wait to be asked, like event sources, push into a
//! [buffer()]. Its [Feed] side is synchronous and can be shared; its other side is
//! an ordinary pipe. A bounded buffer keeps only the most recent elements.
//!
//! # Running chains
//!
//! Pipes are futures under the hood and need to be polled by some executor.
//! They do not depend on a particular runtime. The [runtimes] module has helpers
//! for detaching a finished chain onto tokio or any `futures` spawner.

pub mod adapt;
pub mod buffer;
mod combinators;
mod continuation;
pub mod error;
mod generate;
pub mod outcome;
mod pipe;
mod relay;
pub mod rendezvous;
pub mod runtimes;

pub use adapt::{event, wrap};
pub use buffer::{buffer, Feed};
pub use combinators::{all, from, from_future, race, reject, resolve};
pub use generate::{pipe, Emitter, Next, Rejecter, Resolver};
pub use outcome::{IntoOutcome, IntoStep, Outcome, Step};
pub use pipe::Pipe;

use std::marker;

use futures::future::{self, BoxFuture};

/// The unit exchanged between two adjacent stages of a chain.
///
/// `T` is the type of streamed elements, `R` the type of the final value and `E`
/// the type of failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message<T, R = (), E = ()> {
    Emit(T),
    Resolve(R),
    Reject(E),
}

impl<T, R, E> Message<T, R, E> {
    /// Returns `true` for [Resolve](Message::Resolve) and [Reject](Message::Reject).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Message::Emit(_))
    }

    pub fn map_emit<U>(self, f: impl FnOnce(T) -> U) -> Message<U, R, E> {
        match self {
            Message::Emit(value) => Message::Emit(f(value)),
            Message::Resolve(value) => Message::Resolve(value),
            Message::Reject(error) => Message::Reject(error),
        }
    }

    pub fn map_resolve<S>(self, f: impl FnOnce(R) -> S) -> Message<T, S, E> {
        match self {
            Message::Emit(value) => Message::Emit(value),
            Message::Resolve(value) => Message::Resolve(f(value)),
            Message::Reject(error) => Message::Reject(error),
        }
    }
}

impl<T, R, E> From<Result<R, E>> for Message<T, R, E> {
    fn from(result: Result<R, E>) -> Self {
        match result {
            Ok(value) => Message::Resolve(value),
            Err(error) => Message::Reject(error),
        }
    }
}

/// A pull-based stage of a chain.
///
/// Awaiting the future returned by [next_message](Transition::next_message) is
/// a request for exactly one message. The future completes at most once, and a
/// stage never produces anything without a request. Since the future borrows
/// the stage mutably, a second request cannot be issued before the first one is
/// answered.
///
/// Stages in this crate keep whatever an unfinished request was waiting for, so
/// a request whose future is dropped is resumed by the next one.
pub trait Transition<T, R, E>: marker::Send {
    fn next_message(&mut self) -> BoxFuture<'_, Message<T, R, E>>;
}

impl<T, R, E, S> Transition<T, R, E> for Box<S>
where
    S: Transition<T, R, E> + ?Sized,
{
    fn next_message(&mut self) -> BoxFuture<'_, Message<T, R, E>> {
        (**self).next_message()
    }
}

/// What a finished stage answers to further requests: nothing, ever.
async fn exhausted<M>(stage: &'static str) -> M {
    tracing::warn!(stage, "message requested after the chain has terminated");
    future::pending().await
}
