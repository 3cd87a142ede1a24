use std::marker::{self, PhantomData};

use futures::{
    future::{self, BoxFuture},
    FutureExt,
};

use crate::{exhausted, outcome::IntoOutcome, Message, Transition};

/// What a relay does with one message pulled from upstream.
pub(crate) enum Verdict<M, A> {
    /// Hand this message downstream, answering the pending request.
    Dispatch(M),
    /// Swallow the message and pull the next one.
    RequestMore,
    /// Give this back to the handler, then pull the next message.
    Accumulate(A),
}

/// The handling of one message, owning everything it needs.
pub(crate) type Handling<T, R, E, A> = BoxFuture<'static, Verdict<Message<T, R, E>, A>>;

/// The per-message logic of a [`Relay`].
pub(crate) trait Handler<T, R, E>: marker::Send {
    type Emit: marker::Send + 'static;
    type Resolve: marker::Send + 'static;
    type Accumulator: marker::Send + 'static;

    fn handle(&mut self, message: Message<T, R, E>) -> Handling<Self::Emit, Self::Resolve, E, Self::Accumulator>;

    fn accumulate(&mut self, accumulator: Self::Accumulator) {
        let _ = accumulator;
    }
}

/// A stage that pulls from its upstream until its handler has something to
/// dispatch. Pulling happens in a loop, so any number of swallowed messages
/// costs no stack. A handling interrupted by a dropped request is resumed by
/// the next one.
pub(crate) struct Relay<T, R, E, H: Handler<T, R, E>> {
    upstream: Box<dyn Transition<T, R, E>>,
    handler: H,
    in_flight: Option<Handling<H::Emit, H::Resolve, E, H::Accumulator>>,
    finished: bool,
}

impl<T, R, E, H: Handler<T, R, E>> Relay<T, R, E, H> {
    pub(crate) fn new(upstream: Box<dyn Transition<T, R, E>>, handler: H) -> Self {
        Self {
            upstream,
            handler,
            in_flight: None,
            finished: false,
        }
    }
}

impl<T, R, E, H> Transition<H::Emit, H::Resolve, E> for Relay<T, R, E, H>
where
    T: marker::Send + 'static,
    R: marker::Send + 'static,
    E: marker::Send + 'static,
    H: Handler<T, R, E>,
{
    fn next_message(&mut self) -> BoxFuture<'_, Message<H::Emit, H::Resolve, E>> {
        Box::pin(async move {
            if self.finished {
                return exhausted("relay").await;
            }
            loop {
                if self.in_flight.is_none() {
                    let message = self.upstream.next_message().await;
                    self.in_flight = Some(self.handler.handle(message));
                }
                let Some(handling) = self.in_flight.as_mut() else {
                    continue;
                };
                let verdict = handling.await;
                self.in_flight = None;
                match verdict {
                    Verdict::Dispatch(message) => {
                        self.finished = message.is_terminal();
                        return message;
                    }
                    Verdict::RequestMore => continue,
                    Verdict::Accumulate(accumulator) => self.handler.accumulate(accumulator),
                }
            }
        })
    }
}

fn forward<M, A>(message: M) -> BoxFuture<'static, Verdict<M, A>>
where
    M: marker::Send + 'static,
    A: marker::Send + 'static,
{
    future::ready(Verdict::Dispatch(message)).boxed()
}

pub(crate) struct AndThen<F, O> {
    f: F,
    _output: PhantomData<fn() -> O>,
}

impl<F, O> AndThen<F, O> {
    pub(crate) fn new(f: F) -> Self {
        Self {
            f,
            _output: PhantomData,
        }
    }
}

impl<T, R, E, F, O> Handler<T, R, E> for AndThen<F, O>
where
    R: marker::Send + 'static,
    E: marker::Send + 'static,
    F: FnMut(T) -> O + marker::Send,
    O: IntoOutcome<E>,
    O::Output: marker::Send + 'static,
{
    type Emit = O::Output;
    type Resolve = R;
    type Accumulator = ();

    fn handle(&mut self, message: Message<T, R, E>) -> Handling<O::Output, R, E, ()> {
        match message {
            Message::Emit(value) => {
                let outcome = (self.f)(value).into_outcome();
                async move {
                    Verdict::Dispatch(match outcome.settle().await {
                        Ok(value) => Message::Emit(value),
                        Err(error) => Message::Reject(error),
                    })
                }
                .boxed()
            }
            Message::Resolve(value) => forward(Message::Resolve(value)),
            Message::Reject(error) => forward(Message::Reject(error)),
        }
    }
}

pub(crate) struct Filter<F, O> {
    predicate: F,
    _output: PhantomData<fn() -> O>,
}

impl<F, O> Filter<F, O> {
    pub(crate) fn new(predicate: F) -> Self {
        Self {
            predicate,
            _output: PhantomData,
        }
    }
}

impl<T, R, E, F, O> Handler<T, R, E> for Filter<F, O>
where
    T: marker::Send + 'static,
    R: marker::Send + 'static,
    E: marker::Send + 'static,
    F: FnMut(&T) -> O + marker::Send,
    O: IntoOutcome<E, Output = bool>,
{
    type Emit = T;
    type Resolve = R;
    type Accumulator = ();

    fn handle(&mut self, message: Message<T, R, E>) -> Handling<T, R, E, ()> {
        match message {
            Message::Emit(value) => {
                let outcome = (self.predicate)(&value).into_outcome();
                async move {
                    match outcome.settle().await {
                        Ok(true) => Verdict::Dispatch(Message::Emit(value)),
                        Ok(false) => Verdict::RequestMore,
                        Err(error) => Verdict::Dispatch(Message::Reject(error)),
                    }
                }
                .boxed()
            }
            other => forward(other),
        }
    }
}

pub(crate) struct Reduce<F, A, O> {
    f: F,
    accumulator: Option<A>,
    _output: PhantomData<fn() -> O>,
}

impl<F, A, O> Reduce<F, A, O> {
    pub(crate) fn new(f: F, seed: A) -> Self {
        Self {
            f,
            accumulator: Some(seed),
            _output: PhantomData,
        }
    }
}

impl<T, R, E, F, A, O> Handler<T, R, E> for Reduce<F, A, O>
where
    T: marker::Send + 'static,
    E: marker::Send + 'static,
    A: marker::Send + 'static,
    F: FnMut(A, T) -> O + marker::Send,
    O: IntoOutcome<E, Output = A>,
{
    type Emit = T;
    type Resolve = A;
    type Accumulator = A;

    fn handle(&mut self, message: Message<T, R, E>) -> Handling<T, A, E, A> {
        let Some(accumulator) = self.accumulator.take() else {
            return exhausted("reduce").boxed();
        };
        match message {
            Message::Emit(value) => {
                let outcome = (self.f)(accumulator, value).into_outcome();
                async move {
                    match outcome.settle().await {
                        Ok(accumulator) => Verdict::Accumulate(accumulator),
                        Err(error) => Verdict::Dispatch(Message::Reject(error)),
                    }
                }
                .boxed()
            }
            Message::Resolve(_) => {
                tracing::trace!("reduce rewrites the final value with its accumulator");
                forward(Message::Resolve(accumulator))
            }
            Message::Reject(error) => forward(Message::Reject(error)),
        }
    }

    fn accumulate(&mut self, accumulator: A) {
        self.accumulator = Some(accumulator);
    }
}

pub(crate) struct ForEach<F> {
    f: F,
}

impl<F> ForEach<F> {
    pub(crate) fn new(f: F) -> Self {
        Self { f }
    }
}

impl<T, R, E, F> Handler<T, R, E> for ForEach<F>
where
    T: marker::Send + 'static,
    R: marker::Send + 'static,
    E: marker::Send + 'static,
    F: FnMut(T) + marker::Send,
{
    type Emit = T;
    type Resolve = R;
    type Accumulator = ();

    fn handle(&mut self, message: Message<T, R, E>) -> Handling<T, R, E, ()> {
        match message {
            Message::Emit(value) => {
                (self.f)(value);
                future::ready(Verdict::RequestMore).boxed()
            }
            other => forward(other),
        }
    }
}
