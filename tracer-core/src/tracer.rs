//! The call-tree builder.
//!
//! Each thread's calls live in their own `Arc<Mutex<ThreadCalls>>`, registered
//! in a shared map the first time that thread starts a trace. The map is the
//! only structure threads contend on, and only for lookup or first-time
//! insertion; after that a thread works on its own tree. The per-thread mutex
//! is uncontended except while `trace_result()` copies that thread's tree.
//!
//! `trace_result()` clones the `Arc` handles under the map's read lock and
//! releases it before copying, so a snapshot never blocks new threads from
//! registering.

use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::caller::{BacktraceResolver, CallSite, CallerResolver};
use crate::error::TraceError;
use crate::frame::{Closed, ThreadCalls};
use crate::result::TraceResult;
use crate::thread::current_thread_id;

type ThreadCallsArc = Arc<Mutex<ThreadCalls>>;

/// Records nested, timed calls per thread.
///
/// Share it between threads by reference (`std::thread::scope`) or in an
/// `Arc`. Every `start_trace` must be matched by a `stop_trace` on the same
/// thread, innermost first.
pub struct Tracer {
    threads: RwLock<HashMap<u64, ThreadCallsArc>>,
    resolver: Box<dyn CallerResolver>,
}

impl Tracer {
    /// Tracer that names calls from the native backtrace.
    pub fn new() -> Self {
        Self::with_resolver(BacktraceResolver)
    }

    pub fn with_resolver(resolver: impl CallerResolver + 'static) -> Self {
        Self {
            threads: RwLock::new(HashMap::new()),
            resolver: Box::new(resolver),
        }
    }

    /// Handle to the thread's call tree, registering it on first use.
    fn thread_calls(&self, thread_id: u64) -> ThreadCallsArc {
        if let Some(calls) = self.threads.read().get(&thread_id) {
            return Arc::clone(calls);
        }
        let mut threads = self.threads.write();
        let calls = threads.entry(thread_id).or_insert_with(|| {
            tracing::debug!(thread_id, "registered thread");
            Arc::new(Mutex::new(ThreadCalls::new(thread_id)))
        });
        Arc::clone(calls)
    }

    /// Open a call named after the function that called this method.
    ///
    /// If the resolver cannot name the caller, no call is recorded, but the
    /// matching `stop_trace` is still expected and is absorbed silently.
    #[inline(never)]
    pub fn start_trace(&self) {
        let site = self.resolver.resolve();
        self.open(site);
    }

    /// Open a call with an explicit name, bypassing the resolver.
    pub fn start_trace_at(&self, site: CallSite) {
        self.open(Some(site));
    }

    fn open(&self, site: Option<CallSite>) {
        let thread_id = current_thread_id();
        let calls = self.thread_calls(thread_id);
        let mut calls = calls.lock();
        match site {
            Some(site) => {
                tracing::trace!(
                    thread_id,
                    class = %site.class_name,
                    method = %site.method_name,
                    depth = calls.depth(),
                    "start"
                );
                calls.open_frame(site);
            }
            None => {
                tracing::debug!(
                    thread_id,
                    depth = calls.depth(),
                    "caller unresolved, call not recorded"
                );
                calls.open_unresolved();
            }
        }
    }

    /// Close the innermost open call on this thread and record its time.
    ///
    /// Fails without touching any state if this thread has no open call.
    pub fn stop_trace(&self) -> Result<(), TraceError> {
        let thread_id = current_thread_id();
        let calls = self
            .threads
            .read()
            .get(&thread_id)
            .cloned()
            .ok_or(TraceError::UnknownThread { thread_id })?;
        let mut calls = calls.lock();
        match calls.close_innermost()? {
            Closed::Frame { site, time_ms } => tracing::trace!(
                thread_id,
                class = %site.class_name,
                method = %site.method_name,
                time_ms,
                depth = calls.depth(),
                "stop"
            ),
            Closed::Unresolved => {
                tracing::trace!(thread_id, depth = calls.depth(), "stop (unresolved)")
            }
        }
        Ok(())
    }

    /// Snapshot of every thread's calls as they stand now.
    ///
    /// Calls still open report zero time. Take the snapshot after traced work
    /// has finished for meaningful timings.
    pub fn trace_result(&self) -> TraceResult {
        let handles: Vec<(u64, ThreadCallsArc)> = {
            let threads = self.threads.read();
            threads
                .iter()
                .map(|(&id, calls)| (id, Arc::clone(calls)))
                .collect()
        };
        let threads: BTreeMap<_, _> = handles
            .into_iter()
            .map(|(id, calls)| (id, calls.lock().snapshot()))
            .collect();
        tracing::debug!(threads = threads.len(), "trace result taken");
        TraceResult::new(threads)
    }

    /// Start a call named after the caller and stop it when the guard drops.
    #[inline(never)]
    pub fn enter(&self) -> TraceGuard<'_> {
        self.start_trace();
        TraceGuard {
            tracer: self,
            _not_send: PhantomData,
        }
    }

    /// Like [`enter`](Self::enter) with an explicit name.
    pub fn enter_at(&self, site: CallSite) -> TraceGuard<'_> {
        self.start_trace_at(site);
        TraceGuard {
            tracer: self,
            _not_send: PhantomData,
        }
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer")
            .field("threads", &self.threads.read().len())
            .finish_non_exhaustive()
    }
}

/// Stops its call when dropped, on every exit path.
///
/// Not `Send`: the call must be stopped on the thread that started it.
#[must_use = "dropping the guard immediately stops the call; bind it with `let _guard = ...`"]
pub struct TraceGuard<'a> {
    tracer: &'a Tracer,
    _not_send: PhantomData<*const ()>,
}

impl Drop for TraceGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.tracer.stop_trace() {
            tracing::error!("trace guard dropped: {e}");
        }
    }
}
