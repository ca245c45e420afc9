//! Polling helper.

use std::time::{Duration, Instant};

/// Poll `predicate` every `interval` until it returns true or `timeout` passes.
///
/// The predicate is always evaluated at least once. Returns whether it
/// succeeded.
pub fn wait_until(mut predicate: impl FnMut() -> bool, timeout: Duration, interval: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if predicate() {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        std::thread::sleep(interval.min(deadline - now));
    }
}
