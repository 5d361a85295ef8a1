use std::sync::atomic::{AtomicU64, Ordering};

/// Next identifier handed to a thread on its first trace.
static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_ID: u64 = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
}

/// Stable integer identifier of the calling thread.
///
/// Assigned on first use and never reused within the process, so it can key
/// per-thread call trees across every `Tracer`. `std::thread::ThreadId` has
/// no stable integer form, hence our own counter.
pub fn current_thread_id() -> u64 {
    THREAD_ID.with(|id| *id)
}
