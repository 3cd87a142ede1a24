use std::marker;

use futures::{future::BoxFuture, FutureExt};

use crate::{exhausted, outcome::Step, Message, Transition};

pub(crate) type Bound<R, T, S, E> = Box<dyn FnOnce(R) -> Step<T, S, E> + marker::Send>;

/// Where a [`Then`] stage currently pulls from. The upstream is swapped for
/// the continuation's own pipe once the continuation hands one over.
enum Upstream<T, R, E, U, S> {
    Waiting {
        upstream: Box<dyn Transition<T, R, E>>,
        bound: Option<Bound<R, U, S, E>>,
    },
    Spliced(Box<dyn Transition<U, S, E>>),
    Settling(BoxFuture<'static, Result<S, E>>),
    Finished,
}

/// Binds the final value of its upstream to a continuation.
pub(crate) struct Then<T, R, E, U, S> {
    upstream: Upstream<T, R, E, U, S>,
}

impl<T, R, E, U, S> Then<T, R, E, U, S> {
    pub(crate) fn new(upstream: Box<dyn Transition<T, R, E>>, bound: Bound<R, U, S, E>) -> Self {
        Self {
            upstream: Upstream::Waiting {
                upstream,
                bound: Some(bound),
            },
        }
    }
}

impl<T, R, E, U, S> Transition<U, S, E> for Then<T, R, E, U, S>
where
    T: marker::Send + 'static,
    R: marker::Send + 'static,
    E: marker::Send + 'static,
    U: marker::Send + 'static,
    S: marker::Send + 'static,
{
    fn next_message(&mut self) -> BoxFuture<'_, Message<U, S, E>> {
        Box::pin(async move {
            loop {
                let step = match &mut self.upstream {
                    Upstream::Spliced(spliced) => return spliced.next_message().await,
                    Upstream::Settling(settling) => {
                        let result = settling.await;
                        self.upstream = Upstream::Finished;
                        return result.into();
                    }
                    Upstream::Finished => return exhausted("then").await,
                    Upstream::Waiting { upstream, bound } => match upstream.next_message().await {
                        Message::Emit(_) => {
                            tracing::warn!("then received a streamed element, discarding it");
                            continue;
                        }
                        Message::Reject(error) => {
                            self.upstream = Upstream::Finished;
                            return Message::Reject(error);
                        }
                        Message::Resolve(value) => match bound.take() {
                            Some(bound) => bound(value),
                            None => return exhausted("then").await,
                        },
                    },
                };
                match step {
                    Step::Pipe(pipe) => {
                        tracing::trace!("splicing the continuation's pipe into the chain");
                        self.upstream = Upstream::Spliced(pipe.into_transition());
                    }
                    Step::Outcome(outcome) => {
                        self.upstream = Upstream::Settling(outcome.settle().boxed());
                    }
                }
            }
        })
    }
}

/// Drives a chain to its end, handing a rejection to `handler`.
pub(crate) async fn catch<T, R, E, F>(mut upstream: Box<dyn Transition<T, R, E>>, handler: F) -> Option<R>
where
    F: FnOnce(E),
{
    loop {
        match upstream.next_message().await {
            Message::Emit(_) => continue,
            Message::Resolve(value) => return Some(value),
            Message::Reject(error) => {
                handler(error);
                return None;
            }
        }
    }
}
