use std::{future::IntoFuture, marker};

use futures::{
    future::BoxFuture,
    stream::{self, BoxStream},
    FutureExt, StreamExt,
};

use crate::{
    continuation::{self, Then},
    outcome::{IntoOutcome, IntoStep, Outcome},
    relay::{AndThen, Filter, ForEach, Reduce, Relay},
    Message, Transition,
};

/// A handle to the end of a chain of stages.
///
/// Every operator consumes the handle and returns a new one wrapping the old
/// chain, so each stage has exactly one consumer. Nothing runs before the
/// chain is driven: by `.await`-ing it, by [`catch`](Self::catch), by
/// [`into_stream`](Self::into_stream), or by pulling manually with
/// [`next_message`](Self::next_message).
#[must_use]
pub struct Pipe<T, R = (), E = ()> {
    transition: Box<dyn Transition<T, R, E>>,
}

impl<T, R, E> Pipe<T, R, E> {
    pub(crate) fn into_transition(self) -> Box<dyn Transition<T, R, E>> {
        self.transition
    }
}

impl<T, R, E> Pipe<T, R, E>
where
    T: marker::Send + 'static,
    R: marker::Send + 'static,
    E: marker::Send + 'static,
{
    /// Makes a custom stage the end of a new chain.
    pub fn from_transition(transition: impl Transition<T, R, E> + 'static) -> Self {
        Self {
            transition: Box::new(transition),
        }
    }

    /// Requests a single message from the chain.
    ///
    /// Dropping the returned future before it completes loses nothing: the
    /// request stays pending, and the next call picks it up where it stopped.
    pub fn next_message(&mut self) -> BoxFuture<'_, Message<T, R, E>> {
        self.transition.next_message()
    }

    fn relay<H>(self, handler: H) -> Pipe<H::Emit, H::Resolve, E>
    where
        H: crate::relay::Handler<T, R, E> + 'static,
    {
        Pipe::from_transition(Relay::new(self.transition, handler))
    }

    /// Transforms every element.
    pub fn map<U, F>(self, mut f: F) -> Pipe<U, R, E>
    where
        U: marker::Send + 'static,
        F: FnMut(T) -> U + marker::Send + 'static,
    {
        self.and_then(move |value| Outcome::<U, E>::Value(f(value)))
    }

    /// Transforms every element with a function that may fail or may answer
    /// later. The next element is not requested before the current one has
    /// settled. A failure rejects the chain.
    pub fn and_then<F, O>(self, f: F) -> Pipe<O::Output, R, E>
    where
        F: FnMut(T) -> O + marker::Send + 'static,
        O: IntoOutcome<E> + 'static,
        O::Output: marker::Send + 'static,
    {
        self.relay(AndThen::new(f))
    }

    /// Drops the elements for which `predicate` returns `false`.
    pub fn filter<F>(self, mut predicate: F) -> Pipe<T, R, E>
    where
        F: FnMut(&T) -> bool + marker::Send + 'static,
    {
        self.filter_async(move |value: &T| Outcome::<bool, E>::Value(predicate(value)))
    }

    /// Like [`filter`](Self::filter), with a predicate that may fail or may
    /// answer later.
    pub fn filter_async<F, O>(self, predicate: F) -> Pipe<T, R, E>
    where
        F: FnMut(&T) -> O + marker::Send + 'static,
        O: IntoOutcome<E, Output = bool> + 'static,
    {
        self.relay(Filter::new(predicate))
    }

    /// Folds every element into an accumulator, then resolves with the
    /// accumulator instead of the original final value.
    pub fn reduce<A, F>(self, mut f: F, seed: A) -> Pipe<T, A, E>
    where
        A: marker::Send + 'static,
        F: FnMut(A, T) -> A + marker::Send + 'static,
    {
        self.try_reduce(
            move |accumulator, value| Outcome::<A, E>::Value(f(accumulator, value)),
            seed,
        )
    }

    /// Like [`reduce`](Self::reduce), with steps that may fail or may answer
    /// later.
    pub fn try_reduce<A, F, O>(self, f: F, seed: A) -> Pipe<T, A, E>
    where
        A: marker::Send + 'static,
        F: FnMut(A, T) -> O + marker::Send + 'static,
        O: IntoOutcome<E, Output = A> + 'static,
    {
        self.relay(Reduce::new(f, seed))
    }

    /// Calls `f` with every element, pulling the next one by itself, and passes
    /// on the final message once the upstream ends.
    pub fn for_each<F>(self, f: F) -> Pipe<T, R, E>
    where
        F: FnMut(T) + marker::Send + 'static,
    {
        self.relay(ForEach::new(f))
    }

    /// Continues the chain once it resolves.
    ///
    /// The continuation may answer with `Ok`/`Err`, with an [`Outcome`], or with
    /// a new pipe. A pipe takes over the rest of the chain, including its
    /// elements and its final message. A rejection skips the continuation.
    pub fn then<F, O>(self, f: F) -> Pipe<O::Emit, O::Value, E>
    where
        F: FnOnce(R) -> O + marker::Send + 'static,
        O: IntoStep<T, E>,
        O::Emit: marker::Send + 'static,
        O::Value: marker::Send + 'static,
    {
        let bound = Box::new(move |value| f(value).into_step());
        Pipe::from_transition(Then::new(self.transition, bound))
    }

    /// Drives the chain to its end. Resolves with `Some` final value, or hands
    /// the error of a rejection to `handler` and resolves with `None`. Elements
    /// are discarded.
    pub fn catch<F>(self, handler: F) -> impl std::future::Future<Output = Option<R>> + marker::Send + 'static
    where
        F: FnOnce(E) + marker::Send + 'static,
    {
        continuation::catch(self.transition, handler)
    }

    /// Turns the chain into a stream of its messages, ending after the final
    /// one.
    pub fn into_stream(self) -> BoxStream<'static, Message<T, R, E>> {
        stream::unfold(Some(self.transition), |transition| async move {
            let mut transition = transition?;
            let message = transition.next_message().await;
            let rest = if message.is_terminal() {
                None
            } else {
                Some(transition)
            };
            Some((message, rest))
        })
        .boxed()
    }
}

impl<T, R, E> IntoFuture for Pipe<T, R, E>
where
    T: marker::Send + 'static,
    R: marker::Send + 'static,
    E: marker::Send + 'static,
{
    type Output = Result<R, E>;
    type IntoFuture = BoxFuture<'static, Result<R, E>>;

    /// Drains the chain, discarding its elements, and settles with its final
    /// message.
    fn into_future(mut self) -> Self::IntoFuture {
        async move {
            loop {
                match self.transition.next_message().await {
                    Message::Emit(_) => tracing::trace!("discarding an element of an awaited pipe"),
                    Message::Resolve(value) => return Ok(value),
                    Message::Reject(error) => return Err(error),
                }
            }
        }
        .boxed()
    }
}
