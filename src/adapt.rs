//! Adapters from callback-driven code to pipes.

use std::{marker, sync::Arc};

use crate::{buffer::buffer, error::FeedError, generate::pipe, Feed, Pipe};

/// The completion callback handed to a function adapted by [`wrap`].
pub type Callback<R, E> = Box<dyn FnOnce(Result<R, E>) + marker::Send>;

/// Adapts a function reporting its result through a callback into a function
/// returning a pipe.
///
/// The returned function does not call `worker` right away, only once the pipe
/// it returns is first pulled.
///
/// ```
/// use std::future::IntoFuture;
///
/// use futures::executor::block_on;
/// use pipe::adapt::Callback;
///
/// fn divide((a, b): (i32, i32), done: Callback<i32, String>) {
///     if b == 0 {
///         done(Err("division by zero".to_string()))
///     } else {
///         done(Ok(a / b))
///     }
/// }
///
/// let divide = pipe::wrap(divide);
/// assert_eq!(block_on(divide((9, 3)).into_future()), Ok(3));
/// assert!(block_on(divide((9, 0)).into_future()).is_err());
/// ```
pub fn wrap<A, R, E, W>(worker: W) -> impl Fn(A) -> Pipe<(), R, E> + marker::Send + Sync + 'static
where
    A: marker::Send + 'static,
    R: marker::Send + 'static,
    E: marker::Send + 'static,
    W: Fn(A, Callback<R, E>) + marker::Send + Sync + 'static,
{
    let worker = Arc::new(worker);
    move |arguments| {
        let worker = Arc::clone(&worker);
        pipe(move |resolver, rejecter| {
            worker(
                arguments,
                Box::new(move |result: Result<R, E>| match result {
                    Ok(value) => resolver.resolve(value),
                    Err(error) => rejecter.reject(error),
                }),
            );
            None
        })
    }
}

/// What [`Events`] hands over on its first emission: the caller's pattern and
/// the pipe of events.
pub struct Envelope<P, T, E = ()> {
    pub pattern: P,
    pub event: Pipe<T, (), E>,
}

/// Emits events into a pipe that is created on the first emission.
///
/// Returned by [`event`].
pub struct Events<P, T, E, S> {
    // exactly one of the two is set
    pending: Option<(S, P)>,
    feed: Option<Feed<T, (), E>>,
}

/// Creates an event emitter. The first call to [`Events::emit`] creates an
/// unbounded buffer and passes its consuming side to `send`, wrapped in an
/// [`Envelope`] together with `pattern`. Every emission, including the first,
/// is fed into that buffer.
///
/// ```
/// use std::future::IntoFuture;
///
/// use futures::executor::block_on;
///
/// let mut received = None;
/// let mut clicks = pipe::event::<_, u32, (), _>(|envelope| received = Some(envelope), "clicks");
/// clicks.emit(1).unwrap();
/// clicks.emit(2).unwrap();
/// clicks.resolve().unwrap();
/// drop(clicks);
///
/// let envelope = received.unwrap();
/// assert_eq!(envelope.pattern, "clicks");
/// let total = envelope.event.reduce(|total, n| total + n, 0);
/// assert_eq!(block_on(total.into_future()), Ok(3));
/// ```
pub fn event<P, T, E, S>(send: S, pattern: P) -> Events<P, T, E, S>
where
    T: marker::Send + 'static,
    E: marker::Send + 'static,
    S: FnOnce(Envelope<P, T, E>),
{
    Events {
        pending: Some((send, pattern)),
        feed: None,
    }
}

impl<P, T, E, S> Events<P, T, E, S>
where
    T: marker::Send + 'static,
    E: marker::Send + 'static,
    S: FnOnce(Envelope<P, T, E>),
{
    pub fn emit(&mut self, value: T) -> Result<(), FeedError> {
        self.feed().emit(value)
    }

    /// Ends the event stream.
    pub fn resolve(&mut self) -> Result<(), FeedError> {
        self.feed().resolve(())
    }

    /// Ends the event stream with a failure.
    pub fn reject(&mut self, error: E) -> Result<(), FeedError> {
        self.feed().reject(error)
    }

    fn feed(&mut self) -> &Feed<T, (), E> {
        let pending = &mut self.pending;
        self.feed.get_or_insert_with(|| {
            let (feed, event) = buffer(None);
            if let Some((send, pattern)) = pending.take() {
                tracing::trace!("first event, handing over the event pipe");
                send(Envelope { pattern, event });
            }
            feed
        })
    }
}
