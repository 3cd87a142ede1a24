use std::time::Duration;

use pipe::{
    adapt::{Callback, Envelope},
    runtimes::tokio::detach,
};
use tokio::{sync::mpsc, time::sleep};

/// A lookup reporting through a callback, in the style of many C and event-loop
/// libraries.
fn lookup(key: &'static str, done: Callback<usize, String>) {
    drop(tokio::spawn(async move {
        sleep(Duration::from_millis(fastrand::u64(1..20))).await;
        match key {
            "" => done(Err("empty key".to_string())),
            key => done(Ok(key.len())),
        }
    }));
}

#[tokio::main]
async fn main() {
    let lookup = pipe::wrap(lookup);
    let lengths = pipe::all([lookup("alpha"), lookup("beta"), lookup("gamma")]).await;
    eprintln!("lengths: {lengths:?}");
    if let Err(error) = lookup("").await {
        eprintln!("lookup failed: {error}");
    }

    // clicks pushed by a task that does not wait for anybody
    let (listeners, mut arrivals) = mpsc::unbounded_channel::<Envelope<&'static str, (u32, u32)>>();
    drop(tokio::spawn(async move {
        let mut clicks = pipe::event(
            move |envelope| {
                let _ = listeners.send(envelope);
            },
            "clicks",
        );
        for _ in 0..20 {
            sleep(Duration::from_millis(fastrand::u64(1..10))).await;
            if clicks.emit((fastrand::u32(0..640), fastrand::u32(0..480))).is_err() {
                return;
            }
        }
        let _ = clicks.resolve();
    }));

    let Some(Envelope { pattern, event }) = arrivals.recv().await else {
        return;
    };
    let left_half = event
        .filter(|(x, _)| *x < 320)
        .reduce(|count, _| count + 1, 0u32)
        .await;
    eprintln!("{left_half:?} {pattern} on the left half");

    // a slow consumer only sees the most recent readings
    let (feed, readings) = pipe::buffer::<u32, (), ()>(Some(3));
    let producer = feed.clone();
    drop(tokio::spawn(async move {
        for reading in 0..30 {
            sleep(Duration::from_millis(2)).await;
            let _ = producer.emit(reading);
        }
        let _ = producer.resolve(());
    }));
    let slow = readings
        .and_then(|reading| {
            pipe::from_future(async move {
                sleep(Duration::from_millis(15)).await;
                Ok(reading)
            })
        })
        .for_each(|reading| eprintln!("reading {reading}"));
    detach(slow);
    sleep(Duration::from_millis(100)).await;
    eprintln!("buffer finished: {}", feed.is_terminated());
}
