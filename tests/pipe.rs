use std::{
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use futures::{FutureExt, StreamExt};
use parking_lot::Mutex;
use pipe::{Message, Next, Outcome, Pipe};
use tokio::time::{sleep, timeout};

fn later<R, E>(millis: u64, value: R) -> Pipe<(), R, E>
where
    R: Send + 'static,
    E: Send + 'static,
{
    pipe::pipe(move |resolver, _| {
        drop(tokio::spawn(async move {
            sleep(Duration::from_millis(millis)).await;
            resolver.resolve(value);
        }));
        None
    })
}

#[tokio::test]
async fn then_chains_plain_values() {
    let result = pipe::resolve::<_, ()>(1)
        .then(|x| Ok(x + 1))
        .then(|x| Ok(x + 2))
        .then(|x| Ok(x + 3))
        .await;
    assert_eq!(result, Ok(7));
}

#[tokio::test]
async fn then_composes_pipes_and_futures() {
    let result = pipe::resolve::<_, ()>(1)
        .then(|x| later(10, x + 1))
        .then(|x| {
            Outcome::future(async move {
                sleep(Duration::from_millis(5)).await;
                Ok(x + 2)
            })
        })
        .then(|x| pipe::resolve(x + 3))
        .await;
    assert_eq!(result, Ok(7));
}

#[tokio::test]
async fn resolving_with_unit() {
    assert_eq!(pipe::resolve::<(), ()>(()).then(Ok).await, Ok(()));
    assert_eq!(pipe::reject::<u8, _>("no").await, Err("no"));
}

#[tokio::test]
async fn error_skips_every_then_up_to_catch() {
    let skipped = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&skipped);
    let failure = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&failure);

    let caught = pipe::resolve::<u32, String>(1)
        .then(|x| Ok(x + 1))
        .then(|_| Err::<u32, _>("broken".to_string()))
        .then(move |x| {
            flag.store(false, Ordering::SeqCst);
            Ok(x + 1)
        })
        .catch(move |error| *sink.lock() = Some(error))
        .await;

    assert_eq!(caught, None);
    assert!(skipped.load(Ordering::SeqCst));
    assert_eq!(failure.lock().as_deref(), Some("broken"));
}

#[tokio::test]
async fn catch_passes_a_resolution_through() {
    let caught = pipe::resolve::<_, &str>(5)
        .then(|x| Ok(x * 2))
        .catch(|_| panic!("nothing failed"))
        .await;
    assert_eq!(caught, Some(10));
}

#[tokio::test]
async fn producer_runs_only_when_pulled() {
    let started = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&started);
    let lazy = pipe::pipe::<(), u8, (), _>(move |resolver, _| {
        flag.store(true, Ordering::SeqCst);
        resolver.resolve(1);
        None
    })
    .then(|x| Ok(x + 1));

    sleep(Duration::from_millis(5)).await;
    assert!(!started.load(Ordering::SeqCst));
    assert_eq!(lazy.await, Ok(2));
    assert!(started.load(Ordering::SeqCst));
}

#[tokio::test]
async fn only_the_first_settlement_counts() {
    let settled = pipe::pipe::<(), u8, &str, _>(|resolver, rejecter| {
        resolver.resolve(1);
        rejecter.reject("too late");
        resolver.resolve(2);
        assert!(resolver.is_settled() && rejecter.is_settled());
        None
    });
    assert_eq!(settled.await, Ok(1));
}

#[tokio::test]
async fn for_each_sees_every_element_in_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let done = pipe::from::<_, ()>(vec!["a", "b", "c"])
        .for_each(move |letter| sink.lock().push(letter))
        .await;
    assert_eq!(done, Ok(()));
    assert_eq!(*seen.lock(), ["a", "b", "c"]);
}

#[tokio::test]
async fn for_each_then_continues_after_the_drain() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let counted = Arc::clone(&seen);
    let count = pipe::from::<_, ()>(vec![3, 1, 2])
        .for_each(move |x| sink.lock().push(x))
        .then(move |()| Ok(counted.lock().len()))
        .await;
    assert_eq!(count, Ok(3));
    assert_eq!(*seen.lock(), [3, 1, 2]);
}

#[tokio::test]
async fn reduce_and_map() {
    let sum = pipe::from::<_, ()>(1..=7).reduce(|sum, x| sum + x, 0);
    assert_eq!(sum.await, Ok(28));

    let total = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&total);
    pipe::from::<_, ()>(1..=7u32)
        .map(|x| x * 10)
        .for_each(move |x| {
            counter.fetch_add(x, Ordering::SeqCst);
        })
        .await
        .unwrap();
    assert_eq!(total.load(Ordering::SeqCst), 280);

    let scaled = pipe::from::<_, ()>(1..=7)
        .map(|x| x * 10)
        .map(|x| x * 10)
        .map(|x| x * 10)
        .reduce(|sum, x| sum + x, 0);
    assert_eq!(scaled.await, Ok(28000));
}

#[tokio::test]
async fn filter_keeps_matching_elements() {
    let odds = pipe::from::<_, ()>(1..=10)
        .filter(|x| x % 2 == 1)
        .reduce(
            |mut odds, x| {
                odds.push(x);
                odds
            },
            Vec::new(),
        );
    assert_eq!(odds.await, Ok(vec![1, 3, 5, 7, 9]));
}

#[tokio::test]
async fn asynchronous_transforms() {
    let sum = pipe::from::<_, ()>(0..10)
        .and_then(|x| later(1, x))
        .try_reduce(|sum, x| later(1, sum + x), 0);
    assert_eq!(sum.await, Ok(45));

    let kept = pipe::from::<_, ()>(0..10)
        .filter_async(|x: &u32| later(1, x % 3 != 0))
        .reduce(|sum, x| sum + x, 0);
    assert_eq!(kept.await, Ok(27));

    let squares = pipe::from::<_, ()>(1..=7)
        .and_then(|x| later(2, x * x))
        .reduce(|sum, x| sum + x, 0);
    assert_eq!(squares.await, Ok(140));
}

#[tokio::test]
async fn failing_transform_rejects_the_chain() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let result = pipe::from::<_, &str>(1..=5)
        .and_then(|x| if x == 3 { Err("three") } else { Ok(x) })
        .for_each(move |x| sink.lock().push(x))
        .await;
    assert_eq!(result, Err("three"));
    assert_eq!(*seen.lock(), [1, 2]);

    let result = pipe::from::<_, &str>(1..=5)
        .filter_async(|x: &i32| if *x < 4 { Ok(true) } else { Err("four") })
        .reduce(|sum, x| sum + x, 0)
        .await;
    assert_eq!(result, Err("four"));
}

#[tokio::test]
async fn streams_continue_through_then() {
    let total = pipe::from::<_, ()>(1..=4)
        .reduce(|sum, x| sum + x, 0)
        .then(|n| pipe::from(1..=n))
        .reduce(|sum, x| sum + x, 0);
    assert_eq!(total.await, Ok(55));
}

#[tokio::test]
async fn then_discards_stray_elements() {
    let result = pipe::from::<_, ()>(1..=3).then(|()| Ok("after"));
    assert_eq!(result.await, Ok("after"));
}

#[tokio::test]
async fn emitter_answering_from_timers() {
    let ticks = pipe::pipe::<u32, &str, (), _>(|resolver, _| {
        let mut tick = 0;
        Some(Box::new(move |next: Next<u32, &'static str, ()>| {
            tick += 1;
            if tick > 5 {
                resolver.resolve("stopped");
                return;
            }
            let tick = tick;
            drop(tokio::spawn(async move {
                sleep(Duration::from_millis(2)).await;
                next.emit(tick);
            }));
        }))
    });

    let messages: Vec<_> = ticks.into_stream().collect().await;
    let mut expected: Vec<Message<u32, &str, ()>> = (1..=5).map(Message::Emit).collect();
    expected.push(Message::Resolve("stopped"));
    assert_eq!(messages, expected);
}

#[tokio::test]
async fn emitter_settling_with_pipes() {
    let doubled = pipe::pipe::<u32, (), &str, _>(|resolver, _| {
        let mut n = 0;
        Some(Box::new(move |next: Next<u32, (), &'static str>| {
            n += 1;
            match n {
                1..=3 => next.settle(later(1, n * 2)),
                4 => next.settle(Err("four")),
                _ => resolver.resolve(()),
            }
        }))
    });

    let messages: Vec<_> = doubled.into_stream().collect().await;
    assert_eq!(
        messages,
        [
            Message::Emit(2),
            Message::Emit(4),
            Message::Emit(6),
            Message::Reject("four"),
        ]
    );
}

#[tokio::test]
async fn settling_a_resolver_with_a_pipe() {
    let chained = pipe::pipe::<(), u32, (), _>(|resolver, _| {
        resolver.settle(later(3, 11));
        None
    });
    assert_eq!(chained.await, Ok(11));
}

#[tokio::test]
async fn long_synchronous_streams_do_not_grow_the_stack() {
    let evens = pipe::from::<_, ()>(0..100_000u64)
        .filter(|x| x % 2 == 0)
        .reduce(|count, _| count + 1, 0u64);
    assert_eq!(evens.await, Ok(50_000));

    let nothing = pipe::from::<_, ()>(0..100_000u64)
        .filter(|_| false)
        .reduce(|count, _| count + 1, 0u64);
    assert_eq!(nothing.await, Ok(0));
}

#[tokio::test]
async fn manual_pulling() {
    let mut numbers = pipe::from::<_, ()>(vec![1, 2]);
    assert_eq!(numbers.next_message().await, Message::Emit(1));
    assert_eq!(numbers.next_message().await, Message::Emit(2));
    assert_eq!(numbers.next_message().await, Message::Resolve(()));
    assert_eq!(numbers.next_message().await, Message::Resolve(()));
}

#[tokio::test]
async fn finished_stages_stay_silent() {
    let mut doubled = pipe::from::<_, ()>(vec![1]).map(|x| x * 2);
    assert_eq!(doubled.next_message().await, Message::Emit(2));
    assert_eq!(doubled.next_message().await, Message::Resolve(()));
    assert!(doubled.next_message().now_or_never().is_none());
}

#[tokio::test]
async fn stream_ends_with_the_rejection() {
    let messages: Vec<_> = pipe::from::<_, &str>(1..=3)
        .and_then(|x| if x == 2 { Err("two") } else { Ok(x) })
        .into_stream()
        .collect()
        .await;
    assert_eq!(messages, [Message::Emit(1), Message::Reject("two")]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn settlement_from_another_thread_is_never_lost() {
    for _ in 0..2000 {
        let mut chain = pipe::pipe::<u32, (), (), _>(|resolver, _| {
            let mut started = false;
            Some(Box::new(move |next: Next<u32, (), ()>| {
                if started {
                    return;
                }
                started = true;
                next.emit(1);
                let resolver = resolver.clone();
                std::thread::spawn(move || resolver.resolve(()));
            }))
        });

        assert_eq!(chain.next_message().await, Message::Emit(1));
        let last = timeout(Duration::from_secs(2), chain.next_message()).await;
        assert_eq!(last, Ok(Message::Resolve(())));
    }
}

#[tokio::test]
async fn interrupted_reduce_resumes() {
    let mut sum = pipe::from::<_, ()>(1..=3).try_reduce(
        |sum, x| {
            Outcome::future(async move {
                sleep(Duration::from_millis(20)).await;
                Ok(sum + x)
            })
        },
        0,
    );
    assert!(timeout(Duration::from_millis(5), sum.next_message()).await.is_err());
    let last = timeout(Duration::from_millis(500), sum.next_message()).await;
    assert_eq!(last, Ok(Message::Resolve(6)));
}

#[tokio::test]
async fn interrupted_then_resumes() {
    let mut next = pipe::resolve::<_, ()>(1).then(|x| {
        Outcome::future(async move {
            sleep(Duration::from_millis(20)).await;
            Ok(x + 1)
        })
    });
    assert!(timeout(Duration::from_millis(5), next.next_message()).await.is_err());
    let last = timeout(Duration::from_millis(500), next.next_message()).await;
    assert_eq!(last, Ok(Message::<(), _, ()>::Resolve(2)));
}

#[tokio::test]
async fn interrupted_producer_resumes() {
    let mut timer = later::<_, ()>(20, "rang");
    assert!(timeout(Duration::from_millis(5), timer.next_message()).await.is_err());
    let rang = timeout(Duration::from_millis(500), timer.next_message()).await;
    assert_eq!(rang, Ok(Message::Resolve("rang")));

    let mut deferred = pipe::from_future::<_, (), _>(async {
        sleep(Duration::from_millis(20)).await;
        Ok(8)
    });
    assert!(timeout(Duration::from_millis(5), deferred.next_message()).await.is_err());
    let settled = timeout(Duration::from_millis(500), deferred.next_message()).await;
    assert_eq!(settled, Ok(Message::Resolve(8)));
}

#[tokio::test]
async fn interrupted_filter_keeps_its_element() {
    let mut evens = pipe::from::<_, ()>(1..=4).filter_async(|x: &u32| {
        let even = x % 2 == 0;
        Outcome::future(async move {
            sleep(Duration::from_millis(10)).await;
            Ok(even)
        })
    });
    assert!(timeout(Duration::from_millis(5), evens.next_message()).await.is_err());
    let mut messages = Vec::new();
    for _ in 0..3 {
        messages.push(evens.next_message().await);
    }
    assert_eq!(
        messages,
        [Message::Emit(2), Message::Emit(4), Message::Resolve(())]
    );
}
