use std::time::Duration;

use pipe::{runtimes::tokio::drive, Next, Pipe};
use tokio::time::sleep;

fn jitter() -> Duration {
    Duration::from_millis(fastrand::u64(5..50))
}

/// A sensor answering every request after a random delay, until it has
/// produced `count` readings.
fn sensor(name: &'static str, count: u32) -> Pipe<u32, &'static str, String> {
    pipe::pipe(move |resolver, rejecter| {
        let mut produced = 0;
        Some(Box::new(move |next: Next<u32, &'static str, String>| {
            if produced == count {
                resolver.resolve(name);
                return;
            }
            produced += 1;
            let rejecter = rejecter.clone();
            drop(tokio::spawn(async move {
                sleep(jitter()).await;
                let reading = fastrand::u32(0..100);
                if reading == 99 {
                    rejecter.reject(format!("{name} overheated"));
                } else {
                    next.emit(reading);
                }
            }));
        }))
    })
}

/// Looks up a calibration offset, which takes a while.
fn calibration(reading: u32) -> Pipe<(), u32, String> {
    pipe::from_future(async move {
        sleep(jitter()).await;
        Ok(reading / 10)
    })
}

#[tokio::main]
async fn main() {
    let total = sensor("north", 20)
        .and_then(|reading| calibration(reading).then(move |offset| Ok(reading + offset)))
        .filter(|reading| reading % 2 == 0)
        .reduce(|(count, sum), reading| (count + 1, sum + reading), (0u32, 0u32))
        .then(|(count, sum)| {
            eprintln!("{count} even readings, summing up to {sum}");
            pipe::all([sensor("south", 5), sensor("east", 5)]).then(|names| Ok(names.join(", ")))
        })
        .catch(|error| eprintln!("sensor failure: {error}"));

    match total.await {
        Some(names) => eprintln!("also heard from {names}"),
        None => eprintln!("gave up"),
    }

    let fastest = pipe::race([sensor("west", 3), sensor("up", 3)]);
    match drive(fastest).await {
        Ok(Ok(name)) => eprintln!("{name} finished first"),
        Ok(Err(error)) => eprintln!("race lost to a failure: {error}"),
        Err(panic) => eprintln!("driver crashed: {panic}"),
    }
}
