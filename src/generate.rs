use std::{
    marker, mem,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use futures::{
    channel::oneshot,
    future::{self, BoxFuture},
    FutureExt,
};
use parking_lot::Mutex;

use crate::{
    exhausted,
    outcome::{IntoOutcome, Outcome},
    rendezvous::Rendezvous,
    Message, Pipe, Transition,
};

/// Answers one request of a streaming pipe. Returned by the producer passed to
/// [`pipe`].
pub type Emitter<T, R, E> = Box<dyn FnMut(Next<T, R, E>) + marker::Send>;

type Slot<T, R, E> = BoxFuture<'static, Message<T, R, E>>;

/// Creates a pipe from a producer.
///
/// The producer is called once, on the first request, with the two handles
/// settling the pipe. If it returns an [`Emitter`], the pipe streams: the
/// emitter is called for that request and every following one, and answers
/// each through its [`Next`] handle until the pipe is resolved or rejected. If
/// it returns `None`, the pipe delivers exactly one message, the one it gets
/// settled with.
///
/// ```
/// use std::{
///     future::IntoFuture,
///     sync::{Arc, Mutex},
/// };
///
/// use futures::executor::block_on;
///
/// let countdown = pipe::pipe::<_, _, (), _>(|resolver, _| {
///     let mut n = 3;
///     Some(Box::new(move |next: pipe::Next<_, _, _>| {
///         if n == 0 {
///             resolver.resolve("liftoff");
///         } else {
///             next.emit(n);
///             n -= 1;
///         }
///     }))
/// });
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&seen);
/// let done = countdown.for_each(move |n| sink.lock().unwrap().push(n));
/// assert_eq!(block_on(done.into_future()), Ok("liftoff"));
/// assert_eq!(*seen.lock().unwrap(), [3, 2, 1]);
/// ```
pub fn pipe<T, R, E, P>(producer: P) -> Pipe<T, R, E>
where
    T: marker::Send + 'static,
    R: marker::Send + 'static,
    E: marker::Send + 'static,
    P: FnOnce(Resolver<T, R, E>, Rejecter<T, R, E>) -> Option<Emitter<T, R, E>>
        + marker::Send
        + 'static,
{
    Pipe::from_transition(Generate {
        shared: Arc::new(Shared::new()),
        mode: Mode::Idle(Box::new(producer)),
        incoming: None,
        in_flight: None,
    })
}

/// Settles a pipe successfully.
pub struct Resolver<T, R, E> {
    shared: Arc<Shared<T, R, E>>,
}

/// Settles a pipe with a failure.
pub struct Rejecter<T, R, E> {
    shared: Arc<Shared<T, R, E>>,
}

/// Answers a single request of a streaming pipe.
#[must_use]
pub struct Next<T, R, E> {
    shared: Arc<Shared<T, R, E>>,
}

impl<T, R, E> Clone for Resolver<T, R, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, R, E> Clone for Rejecter<T, R, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, R, E> Resolver<T, R, E>
where
    T: marker::Send + 'static,
    R: marker::Send + 'static,
    E: marker::Send + 'static,
{
    pub fn resolve(&self, value: R) {
        self.shared
            .terminate(future::ready(Message::Resolve(value)).boxed())
    }

    /// Resolves with whatever `outcome` eventually settles with. A failed
    /// outcome rejects the pipe instead.
    pub fn settle<O>(&self, outcome: O)
    where
        O: IntoOutcome<E, Output = R>,
    {
        let slot = match outcome.into_outcome() {
            Outcome::Value(value) => future::ready(Message::Resolve(value)).boxed(),
            Outcome::Error(error) => future::ready(Message::Reject(error)).boxed(),
            Outcome::Future(future) => future.map(Message::from).boxed(),
        };
        self.shared.terminate(slot)
    }

    pub fn is_settled(&self) -> bool {
        self.shared.is_settled()
    }
}

impl<T, R, E> Rejecter<T, R, E>
where
    T: marker::Send + 'static,
    R: marker::Send + 'static,
    E: marker::Send + 'static,
{
    pub fn reject(&self, error: E) {
        self.shared
            .terminate(future::ready(Message::Reject(error)).boxed())
    }

    pub fn is_settled(&self) -> bool {
        self.shared.is_settled()
    }
}

impl<T, R, E> Next<T, R, E>
where
    T: marker::Send + 'static,
    R: marker::Send + 'static,
    E: marker::Send + 'static,
{
    pub fn emit(self, value: T) {
        self.shared
            .emit(future::ready(Message::Emit(value)).boxed())
    }

    /// Emits whatever `outcome` eventually settles with. A failed outcome
    /// rejects the pipe instead.
    pub fn settle<O>(self, outcome: O)
    where
        O: IntoOutcome<E, Output = T>,
    {
        let slot = match outcome.into_outcome() {
            Outcome::Value(value) => future::ready(Message::Emit(value)).boxed(),
            Outcome::Error(error) => future::ready(Message::Reject(error)).boxed(),
            Outcome::Future(future) => future
                .map(|result| match result {
                    Ok(value) => Message::Emit(value),
                    Err(error) => Message::Reject(error),
                })
                .boxed(),
        };
        self.shared.emit(slot)
    }
}

struct Shared<T, R, E> {
    cell: Rendezvous<Slot<T, R, E>>,
    // a settlement that arrived while an emitted element was still undelivered
    parked: Mutex<Option<Slot<T, R, E>>>,
    settled: AtomicBool,
}

impl<T, R, E> Shared<T, R, E> {
    fn new() -> Self {
        Self {
            cell: Rendezvous::new(),
            parked: Mutex::new(None),
            settled: AtomicBool::new(false),
        }
    }

    fn is_settled(&self) -> bool {
        self.settled.load(Ordering::Acquire)
    }

    fn emit(&self, slot: Slot<T, R, E>) {
        if self.is_settled() {
            tracing::debug!("element emitted after the pipe was settled, ignoring it");
            return;
        }
        if self.cell.put(slot).is_err() {
            tracing::warn!("element emitted twice for a single request, dropping the second");
        }
    }

    fn terminate(&self, slot: Slot<T, R, E>) {
        if self.settled.swap(true, Ordering::AcqRel) {
            tracing::debug!("pipe settled more than once, ignoring the later settlement");
            return;
        }
        // putting and parking happen under one lock, so `waiting` sees either
        let mut parked = self.parked.lock();
        if let Err(slot) = self.cell.put(slot) {
            *parked = Some(slot);
        }
    }

    fn waiting(&self) -> Option<Slot<T, R, E>> {
        let mut parked = self.parked.lock();
        self.cell.try_take().or_else(|| parked.take())
    }
}

type Producer<T, R, E> = Box<
    dyn FnOnce(Resolver<T, R, E>, Rejecter<T, R, E>) -> Option<Emitter<T, R, E>>
        + marker::Send,
>;

enum Mode<T, R, E> {
    Idle(Producer<T, R, E>),
    Streaming(Emitter<T, R, E>),
    Single,
    Done,
}

struct Generate<T, R, E> {
    shared: Arc<Shared<T, R, E>>,
    mode: Mode<T, R, E>,
    // what a cancelled request was waiting for, resumed by the next one
    incoming: Option<oneshot::Receiver<Slot<T, R, E>>>,
    in_flight: Option<Slot<T, R, E>>,
}

impl<T, R, E> Generate<T, R, E>
where
    T: marker::Send + 'static,
    R: marker::Send + 'static,
    E: marker::Send + 'static,
{
    fn request(&mut self) {
        self.mode = match mem::replace(&mut self.mode, Mode::Done) {
            Mode::Idle(producer) => {
                let resolver = Resolver {
                    shared: Arc::clone(&self.shared),
                };
                let rejecter = Rejecter {
                    shared: Arc::clone(&self.shared),
                };
                match producer(resolver, rejecter) {
                    Some(emitter) => {
                        tracing::trace!("producer started in streaming mode");
                        self.emit_with(emitter)
                    }
                    None => {
                        tracing::trace!("producer started in single-value mode");
                        Mode::Single
                    }
                }
            }
            Mode::Streaming(emitter) => self.emit_with(emitter),
            other => other,
        };
    }

    fn emit_with(&self, mut emitter: Emitter<T, R, E>) -> Mode<T, R, E> {
        if !self.shared.is_settled() {
            emitter(Next {
                shared: Arc::clone(&self.shared),
            });
        }
        Mode::Streaming(emitter)
    }

    /// Takes a waiting slot, or asks the producer for one and registers for
    /// its delivery.
    fn start(&mut self) {
        if let Some(slot) = self.shared.waiting() {
            self.in_flight = Some(slot);
            return;
        }
        self.request();
        let (tx, rx) = oneshot::channel();
        self.shared.cell.take(move |slot| {
            let _ = tx.send(slot);
        });
        self.incoming = Some(rx);
    }
}

impl<T, R, E> Transition<T, R, E> for Generate<T, R, E>
where
    T: marker::Send + 'static,
    R: marker::Send + 'static,
    E: marker::Send + 'static,
{
    fn next_message(&mut self) -> BoxFuture<'_, Message<T, R, E>> {
        Box::pin(async move {
            if matches!(self.mode, Mode::Done) {
                return exhausted("generate").await;
            }
            if self.in_flight.is_none() && self.incoming.is_none() {
                self.start();
            }
            if let Some(incoming) = self.incoming.as_mut() {
                let delivered = incoming.await;
                self.incoming = None;
                match delivered {
                    Ok(slot) => self.in_flight = Some(slot),
                    Err(_) => return exhausted("generate").await,
                }
            }
            let Some(slot) = self.in_flight.as_mut() else {
                return exhausted("generate").await;
            };
            let message = slot.await;
            self.in_flight = None;
            if message.is_terminal() {
                self.shared.settled.store(true, Ordering::Release);
                self.mode = Mode::Done;
            }
            message
        })
    }
}
