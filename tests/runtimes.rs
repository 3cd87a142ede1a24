#![cfg(feature = "runtime-tokio")]

use std::time::Duration;

use pipe::runtimes::tokio::{detach, drive};
use tokio::{sync::mpsc, time::sleep};

#[tokio::test]
async fn driven_chain_reports_its_outcome() {
    let sum = drive(pipe::from::<_, ()>(1..=7).reduce(|sum, x| sum + x, 0));
    assert_eq!(sum.await.unwrap(), Ok(28));

    let failure = drive(pipe::reject::<(), _>("down"));
    assert_eq!(failure.await.unwrap(), Err("down"));
}

#[tokio::test]
async fn detached_chain_keeps_running() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let chain = pipe::from::<_, ()>(1..=3)
        .and_then(|n| {
            pipe::from_future(async move {
                sleep(Duration::from_millis(2)).await;
                Ok(n * 100)
            })
        })
        .for_each(move |n| {
            let _ = tx.send(n);
        });
    detach(chain);

    let mut received = Vec::new();
    while let Some(n) = rx.recv().await {
        received.push(n);
    }
    assert_eq!(received, [100, 200, 300]);
}
