//! Buffers decouple producers that push from a consumer that pulls.
//!
//! A buffer has two sides. The [`Feed`] accepts elements and the final message
//! synchronously, from as many call sites as needed. The other side is an
//! ordinary [`Pipe`] that hands out what was fed, in feed order, one element per
//! request.
//!
//! ```
//! use std::future::IntoFuture;
//!
//! use futures::executor::block_on;
//!
//! let (feed, events) = pipe::buffer::<u32, (), ()>(Some(2));
//! for n in 1..=5 {
//!     feed.emit(n).unwrap();
//! }
//! feed.resolve(()).unwrap();
//!
//! // only the two most recent elements were kept
//! let kept = events.reduce(|mut kept, n| { kept.push(n); kept }, Vec::new());
//! assert_eq!(block_on(kept.into_future()), Ok(vec![4, 5]));
//! ```

use std::{collections::VecDeque, marker, sync::Arc};

use futures::{channel::oneshot, future::BoxFuture};
use parking_lot::Mutex;

use crate::{error::FeedError, exhausted, Message, Pipe, Transition};

/// Creates a buffer. With `Some(n)`, at most `n` elements are kept waiting and
/// the oldest are dropped to make room. With `None`, the buffer is unbounded.
pub fn buffer<T, R, E>(capacity: Option<usize>) -> (Feed<T, R, E>, Pipe<T, R, E>)
where
    T: marker::Send + 'static,
    R: marker::Send + 'static,
    E: marker::Send + 'static,
{
    let queue = Arc::new(Mutex::new(Queue {
        messages: VecDeque::new(),
        emits: 0,
        capacity,
        terminated: false,
        waiting: None,
    }));
    let feed = Feed {
        queue: Arc::clone(&queue),
    };
    let stage = Drain {
        queue,
        finished: false,
    };
    (feed, Pipe::from_transition(stage))
}

/// The pushing side of a buffer.
pub struct Feed<T, R, E> {
    queue: Arc<Mutex<Queue<T, R, E>>>,
}

impl<T, R, E> Clone for Feed<T, R, E> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
        }
    }
}

impl<T, R, E> Feed<T, R, E> {
    pub fn emit(&self, value: T) -> Result<(), FeedError> {
        self.push(Message::Emit(value))
    }

    pub fn resolve(&self, value: R) -> Result<(), FeedError> {
        self.push(Message::Resolve(value))
    }

    pub fn reject(&self, error: E) -> Result<(), FeedError> {
        self.push(Message::Reject(error))
    }

    /// Number of messages waiting to be pulled.
    pub fn len(&self) -> usize {
        self.queue.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_terminated(&self) -> bool {
        self.queue.lock().terminated
    }

    fn push(&self, message: Message<T, R, E>) -> Result<(), FeedError> {
        let mut queue = self.queue.lock();
        if queue.terminated {
            return Err(FeedError::Terminated);
        }
        queue.terminated = message.is_terminal();
        let message = match queue.waiting.take() {
            Some(waiting) => match waiting.send(message) {
                Ok(()) => return Ok(()),
                Err(message) => message,
            },
            None => message,
        };
        queue.enqueue(message);
        Ok(())
    }
}

struct Queue<T, R, E> {
    messages: VecDeque<Message<T, R, E>>,
    emits: usize,
    capacity: Option<usize>,
    terminated: bool,
    waiting: Option<oneshot::Sender<Message<T, R, E>>>,
}

impl<T, R, E> Queue<T, R, E> {
    fn enqueue(&mut self, message: Message<T, R, E>) {
        if let Message::Emit(_) = message {
            self.emits += 1;
        }
        self.messages.push_back(message);
        let Some(capacity) = self.capacity else {
            return;
        };
        // emits are never queued behind the final message, so the oldest
        // emit is always at the front
        while self.emits > capacity {
            match self.messages.pop_front() {
                Some(Message::Emit(_)) => {
                    self.emits -= 1;
                    tracing::debug!(capacity, "buffer full, dropped its oldest element");
                }
                Some(other) => {
                    self.messages.push_front(other);
                    break;
                }
                None => break,
            }
        }
    }

    fn dequeue(&mut self) -> Option<Message<T, R, E>> {
        let message = self.messages.pop_front()?;
        if let Message::Emit(_) = message {
            self.emits -= 1;
        }
        Some(message)
    }
}

/// The pulling side of a buffer.
struct Drain<T, R, E> {
    queue: Arc<Mutex<Queue<T, R, E>>>,
    finished: bool,
}

impl<T, R, E> Drain<T, R, E> {
    fn pull(&self) -> Result<Message<T, R, E>, oneshot::Receiver<Message<T, R, E>>> {
        let mut queue = self.queue.lock();
        match queue.dequeue() {
            Some(message) => Ok(message),
            None => {
                let (tx, rx) = oneshot::channel();
                queue.waiting = Some(tx);
                Err(rx)
            }
        }
    }
}

impl<T, R, E> Transition<T, R, E> for Drain<T, R, E>
where
    T: marker::Send + 'static,
    R: marker::Send + 'static,
    E: marker::Send + 'static,
{
    fn next_message(&mut self) -> BoxFuture<'_, Message<T, R, E>> {
        Box::pin(async move {
            if self.finished {
                return exhausted("buffer").await;
            }
            let message = match self.pull() {
                Ok(message) => message,
                Err(waiting) => match waiting.await {
                    Ok(message) => message,
                    Err(_) => return exhausted("buffer").await,
                },
            };
            self.finished = message.is_terminal();
            message
        })
    }
}
