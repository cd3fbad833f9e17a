use std::{thread, time::Duration};

use rand::Rng;

/// Sleeps a uniformly random time in `[0, max]`. Only ever called outside
/// the critical section.
pub(crate) fn jitter(max: Option<Duration>) {
    let Some(max) = max else {
        return;
    };
    let micros = u64::try_from(max.as_micros()).unwrap_or(u64::MAX);
    if micros == 0 {
        return;
    }
    let pause = rand::thread_rng().gen_range(0..=micros);
    thread::sleep(Duration::from_micros(pause));
}
