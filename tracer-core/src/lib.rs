//! Per-thread call-tree tracing.
//!
//! Instrumented code brackets a function body with [`Tracer::start_trace`] and
//! [`Tracer::stop_trace`] (or holds a [`TraceGuard`] from [`Tracer::enter`]).
//! The tracer rebuilds, for every thread that traced at least one call, the
//! forest of calls it made and how long each took. Nesting is implicit: a call
//! started while another call on the same thread is open becomes its child.
//!
//! [`Tracer::trace_result`] returns an immutable [`TraceResult`] that is
//! unaffected by any later tracing.

mod caller;
mod error;
mod frame;
mod result;
mod stopwatch;
mod thread;
mod tracer;

pub use caller::{BacktraceResolver, CallSite, CallerResolver};
pub use error::TraceError;
pub use result::{MethodTrace, ThreadTrace, TraceResult};
pub use thread::current_thread_id;
pub use tracer::{TraceGuard, Tracer};
