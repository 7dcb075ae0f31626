//! Process interrupt flag.
//!
//! A momentary pulse must put the pre-pulse byte back even when the user
//! hits Ctrl-C mid-wait, so the handler only raises a flag and the engine's
//! sleep polls it in slices and finishes the restore write itself.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use std::time::Instant;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
extern "C" fn on_signal(_signum: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

#[cfg(unix)]
pub fn install() {
    let handler = on_signal as extern "C" fn(libc::c_int);
    unsafe {
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handler as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
pub fn install() {}

pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Block for `duration`, waking every slice to check the flag. Returns true
/// when the full duration elapsed, false when a signal cut it short.
pub fn sleep_interruptible(duration: Duration) -> bool {
    const SLICE: Duration = Duration::from_millis(20);
    let deadline = Instant::now() + duration;
    loop {
        if interrupted() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(SLICE.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_duration_elapses_without_a_signal() {
        let start = Instant::now();
        assert!(sleep_interruptible(Duration::from_millis(50)));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn zero_duration_returns_immediately() {
        assert!(sleep_interruptible(Duration::ZERO));
    }
}
