//! Detaching chains onto executors.
//!
//! A detached chain is driven to its end in the background. Anything it
//! settles with is dropped, so the chain should end with
//! [`catch`](crate::Pipe::catch) or [`for_each`](crate::Pipe::for_each) when
//! its elements or its failure matter.

#[cfg(feature = "runtime-tokio")]
pub mod tokio {
    use std::{future::IntoFuture, marker};

    use ::tokio::task::JoinHandle;

    use crate::Pipe;

    /// Spawns `consumer` on the current tokio runtime and forgets about it.
    pub fn detach<F>(consumer: F)
    where
        F: IntoFuture,
        F::IntoFuture: marker::Send + 'static,
        F::Output: marker::Send + 'static,
    {
        drop(::tokio::spawn(consumer.into_future()))
    }

    /// Spawns a task draining `pipe` and returns a handle to its final value.
    pub fn drive<T, R, E>(pipe: Pipe<T, R, E>) -> JoinHandle<Result<R, E>>
    where
        T: marker::Send + 'static,
        R: marker::Send + 'static,
        E: marker::Send + 'static,
    {
        ::tokio::spawn(pipe.into_future())
    }
}

pub mod spawn {
    use std::{future::IntoFuture, marker};

    use futures::{
        task::{SpawnError, SpawnExt},
        FutureExt,
    };

    pub trait Detach {
        fn detach<F>(&self, consumer: F) -> Result<(), SpawnError>
        where
            F: IntoFuture,
            F::IntoFuture: marker::Send + 'static;
    }

    impl<S: futures::task::Spawn + ?Sized> Detach for S {
        fn detach<F>(&self, consumer: F) -> Result<(), SpawnError>
        where
            F: IntoFuture,
            F::IntoFuture: marker::Send + 'static,
        {
            self.spawn(consumer.into_future().map(|_| ()))
        }
    }
}

pub mod local_spawn {
    use std::future::IntoFuture;

    use futures::{
        task::{LocalSpawnExt, SpawnError},
        FutureExt,
    };

    pub trait DetachLocal {
        fn detach_local<F>(&self, consumer: F) -> Result<(), SpawnError>
        where
            F: IntoFuture,
            F::IntoFuture: 'static;
    }

    impl<S: futures::task::LocalSpawn + ?Sized> DetachLocal for S {
        fn detach_local<F>(&self, consumer: F) -> Result<(), SpawnError>
        where
            F: IntoFuture,
            F::IntoFuture: 'static,
        {
            self.spawn_local(consumer.into_future().map(|_| ()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::executor::LocalPool;
    use parking_lot::Mutex;

    use super::{local_spawn::DetachLocal, spawn::Detach};

    #[test]
    fn detached_chain_runs_on_the_pool() {
        let mut pool = LocalPool::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let chain = crate::from::<_, ()>(1..=3).for_each(move |n| sink.lock().push(n));
        pool.spawner().detach(chain).unwrap();
        assert!(seen.lock().is_empty());

        pool.run();
        assert_eq!(*seen.lock(), [1, 2, 3]);
    }

    #[test]
    fn detached_catch_sees_the_failure() {
        let mut pool = LocalPool::new();
        let failure = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&failure);

        let caught = crate::reject::<u8, _>("gone")
            .then(|n| Ok(n + 1))
            .catch(move |error| *sink.lock() = Some(error));
        pool.spawner().detach_local(caught).unwrap();

        pool.run();
        assert_eq!(*failure.lock(), Some("gone"));
    }
}
