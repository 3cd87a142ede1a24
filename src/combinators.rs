use std::{future::Future, iter::Fuse, marker};

use futures::{
    future::{self, BoxFuture},
    FutureExt,
};

use crate::{
    generate::pipe,
    outcome::{IntoOutcome, Outcome},
    Message, Pipe, Transition,
};

/// A pipe resolving with `value`.
pub fn resolve<R, E>(value: R) -> Pipe<(), R, E>
where
    R: marker::Send + 'static,
    E: marker::Send + 'static,
{
    pipe(move |resolver, _| {
        resolver.resolve(value);
        None
    })
}

/// A pipe rejecting with `error`.
pub fn reject<R, E>(error: E) -> Pipe<(), R, E>
where
    R: marker::Send + 'static,
    E: marker::Send + 'static,
{
    pipe(move |_, rejecter| {
        rejecter.reject(error);
        None
    })
}

/// A pipe settling with the result of `future`.
pub fn from_future<R, E, F>(future: F) -> Pipe<(), R, E>
where
    R: marker::Send + 'static,
    E: marker::Send + 'static,
    F: Future<Output = Result<R, E>> + marker::Send + 'static,
{
    pipe(move |resolver, _| {
        resolver.settle(Outcome::future(future));
        None
    })
}

/// A pipe streaming the items of `items` in order, then resolving with `()`.
///
/// Once the items run out, every further request is answered with the same
/// resolution again. Items are never produced twice.
///
/// ```
/// use std::future::IntoFuture;
///
/// use futures::executor::block_on;
///
/// let odds = pipe::from::<_, ()>(1..=9)
///     .filter(|n| n % 2 == 1)
///     .reduce(|mut odds, n| { odds.push(n); odds }, Vec::new());
/// assert_eq!(block_on(odds.into_future()), Ok(vec![1, 3, 5, 7, 9]));
/// ```
pub fn from<I, E>(items: I) -> Pipe<I::Item, (), E>
where
    I: IntoIterator,
    I::IntoIter: marker::Send + 'static,
    I::Item: marker::Send + 'static,
    E: marker::Send + 'static,
{
    Pipe::from_transition(Sequence {
        items: items.into_iter().fuse(),
        resolved: false,
    })
}

struct Sequence<I> {
    items: Fuse<I>,
    resolved: bool,
}

impl<I, E> Transition<I::Item, (), E> for Sequence<I>
where
    I: Iterator + marker::Send,
    I::Item: marker::Send + 'static,
    E: marker::Send + 'static,
{
    fn next_message(&mut self) -> BoxFuture<'_, Message<I::Item, (), E>> {
        let message = match self.items.next() {
            Some(item) => Message::Emit(item),
            None if self.resolved => {
                tracing::debug!("sequence pulled after its end, resolving again");
                Message::Resolve(())
            }
            None => {
                self.resolved = true;
                Message::Resolve(())
            }
        };
        future::ready(message).boxed()
    }
}

/// A pipe resolving with the values of all `items`, in their original order,
/// once every one of them has resolved. The first rejection rejects the pipe,
/// no matter what happens to the other items afterwards.
pub fn all<I, E>(items: I) -> Pipe<(), Vec<<I::Item as IntoOutcome<E>>::Output>, E>
where
    I: IntoIterator,
    I::Item: IntoOutcome<E>,
    <I::Item as IntoOutcome<E>>::Output: marker::Send + 'static,
    E: marker::Send + 'static,
{
    let settling: Vec<_> = items
        .into_iter()
        .map(|item| item.into_outcome().settle())
        .collect();
    from_future(future::try_join_all(settling))
}

/// A pipe settling like whichever of `items` settles first. Later settlements
/// are ignored. Without any items, the pipe never settles.
pub fn race<I, E>(items: I) -> Pipe<(), <I::Item as IntoOutcome<E>>::Output, E>
where
    I: IntoIterator,
    I::Item: IntoOutcome<E>,
    <I::Item as IntoOutcome<E>>::Output: marker::Send + 'static,
    E: marker::Send + 'static,
{
    let settling: Vec<_> = items
        .into_iter()
        .map(|item| item.into_outcome().settle().boxed())
        .collect();
    if settling.is_empty() {
        tracing::warn!("racing no items, the pipe will never settle");
        return pipe(|_, _| None);
    }
    from_future(future::select_all(settling).map(|(result, _, _)| result))
}
