extern crate std;

use core::sync::atomic::{AtomicUsize, Ordering};

use super::*;

static RESETS: AtomicUsize = AtomicUsize::new(0);
static FATALS: AtomicUsize = AtomicUsize::new(0);

fn count_reset() {
    RESETS.fetch_add(1, Ordering::Relaxed);
}

fn count_fatal(reason: FatalReason) {
    assert_eq!(reason, FatalReason::ResourceExhausted);
    FATALS.fetch_add(1, Ordering::Relaxed);
}

// The hooks are process wide so both are exercised from one test.
#[test]
fn hooks_run_once() {
    reset();
    fatal(FatalReason::StartupFailed);

    handle_reset(Some(&count_reset));
    handle_fatal(Some(&count_fatal));

    fatal(FatalReason::ResourceExhausted);
    fatal(FatalReason::ResourceExhausted);
    assert_eq!(FATALS.load(Ordering::Relaxed), 1);

    reset();
    reset();
    assert_eq!(RESETS.load(Ordering::Relaxed), 1);
}
