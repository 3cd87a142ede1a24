//! A single-slot meeting point between one producer and one consumer.
//!
//! A [`Rendezvous`] holds either nothing, one message that nobody has asked for
//! yet, or one consumer waiting for a message. Whichever side arrives second
//! completes the exchange and leaves the cell empty again. It is the same thing
//! as a channel of capacity one, except that the consumer side is a plain
//! callback and the producer side refuses to overwrite a message that is still
//! waiting.
//!
//! ```
//! use pipe::rendezvous::Rendezvous;
//!
//! let cell = Rendezvous::new();
//! assert_eq!(cell.put(1), Ok(()));
//! assert_eq!(cell.put(2), Err(2));
//! cell.take(|message| assert_eq!(message, 1));
//! assert!(cell.is_empty());
//! ```

use std::{fmt, mem};

use futures::channel::oneshot;
use parking_lot::Mutex;

/// Callback receiving the message of a rendezvous.
pub type Deliver<M> = Box<dyn FnOnce(M) + Send>;

pub struct Rendezvous<M> {
    state: Mutex<State<M>>,
}

enum State<M> {
    Empty,
    MessageWaiting(M),
    ConsumerWaiting(Deliver<M>),
}

impl<M> Default for Rendezvous<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Rendezvous<M> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::Empty),
        }
    }

    /// Offers a message. If a consumer is waiting, it receives the message right
    /// away. If another message is still waiting, the cell is left untouched and
    /// the offered message is handed back.
    pub fn put(&self, message: M) -> Result<(), M> {
        let mut state = self.state.lock();
        match mem::replace(&mut *state, State::Empty) {
            State::Empty => {
                *state = State::MessageWaiting(message);
                Ok(())
            }
            State::ConsumerWaiting(deliver) => {
                drop(state);
                deliver(message);
                Ok(())
            }
            waiting @ State::MessageWaiting(_) => {
                *state = waiting;
                Err(message)
            }
        }
    }

    /// Registers a consumer. If a message is waiting, `deliver` is called with it
    /// right away.
    ///
    /// Only one consumer may wait at a time. Registering a second one drops the
    /// first without calling it.
    pub fn take(&self, deliver: impl FnOnce(M) + Send + 'static) {
        let mut state = self.state.lock();
        match mem::replace(&mut *state, State::Empty) {
            State::Empty => *state = State::ConsumerWaiting(Box::new(deliver)),
            State::MessageWaiting(message) => {
                drop(state);
                deliver(message);
            }
            State::ConsumerWaiting(_) => {
                tracing::warn!("overlapping request on a rendezvous cell, dropping the earlier one");
                *state = State::ConsumerWaiting(Box::new(deliver));
            }
        }
    }

    /// Takes the waiting message, if there is one, without registering a consumer.
    pub fn try_take(&self) -> Option<M> {
        let mut state = self.state.lock();
        match mem::replace(&mut *state, State::Empty) {
            State::MessageWaiting(message) => Some(message),
            other => {
                *state = other;
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(*self.state.lock(), State::Empty)
    }

    pub fn has_message(&self) -> bool {
        matches!(*self.state.lock(), State::MessageWaiting(_))
    }

    pub fn has_consumer(&self) -> bool {
        matches!(*self.state.lock(), State::ConsumerWaiting(_))
    }
}

impl<M: Send + 'static> Rendezvous<M> {
    /// Waits for the next message put into the cell. Resolves with `None` if
    /// another consumer registers before a message arrives.
    pub async fn recv(&self) -> Option<M> {
        let (tx, rx) = oneshot::channel();
        self.take(move |message| {
            let _ = tx.send(message);
        });
        rx.await.ok()
    }
}

impl<M> fmt::Debug for Rendezvous<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match *self.state.lock() {
            State::Empty => "Empty",
            State::MessageWaiting(_) => "MessageWaiting",
            State::ConsumerWaiting(_) => "ConsumerWaiting",
        };
        f.debug_struct("Rendezvous").field("state", &state).finish()
    }
}
