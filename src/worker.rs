//! Helpers shared by the background worker stages.

use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::warn;

/// How long a worker blocks on its input queue before re-checking its
/// stop condition.
pub(crate) const POP_TIMEOUT: Duration = Duration::from_millis(100);

/// Default bound on how long `stop()` waits for a worker to terminate.
pub(crate) const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Join a worker thread with a bounded timeout.
///
/// Returns `true` when the thread terminated within the timeout. On
/// timeout the handle is dropped and cleanup proceeds anyway; the
/// possible resource leak is logged, not fatal.
pub(crate) fn join_with_timeout(name: &str, handle: JoinHandle<()>, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            warn!("worker '{name}' did not stop within {timeout:?}, detaching");
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    if handle.join().is_err() {
        warn!("worker '{name}' panicked before shutdown");
    }
    true
}
