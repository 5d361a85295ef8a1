//! Immutable snapshot of traced calls.
//!
//! A [`TraceResult`] owns deep copies of every recorded call, so it can be
//! held, sent across threads, or serialized while tracing continues.

use std::collections::BTreeMap;

/// One recorded call and the calls it made, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodTrace {
    method_name: String,
    class_name: String,
    time_ms: u64,
    methods: Vec<MethodTrace>,
}

impl MethodTrace {
    pub fn new(
        method_name: impl Into<String>,
        class_name: impl Into<String>,
        time_ms: u64,
        methods: Vec<MethodTrace>,
    ) -> Self {
        Self {
            method_name: method_name.into(),
            class_name: class_name.into(),
            time_ms,
            methods,
        }
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Wall time of the call including nested calls. Zero if the call was
    /// still open when the snapshot was taken.
    pub fn time_ms(&self) -> u64 {
        self.time_ms
    }

    /// Nested calls in the order they were made.
    pub fn methods(&self) -> &[MethodTrace] {
        &self.methods
    }

    /// Time spent in this call outside of its nested calls.
    ///
    /// Each call's time is truncated to whole milliseconds independently, so
    /// the children can sum past the parent; the result saturates at zero.
    pub fn self_time_ms(&self) -> u64 {
        let children: u64 = self.methods.iter().map(MethodTrace::time_ms).sum();
        self.time_ms.saturating_sub(children)
    }

    /// Number of levels in this subtree; a leaf has depth 1.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 1)];
        while let Some((call, level)) = pending.pop() {
            deepest = deepest.max(level);
            pending.extend(call.methods.iter().map(|child| (child, level + 1)));
        }
        deepest
    }

    /// Number of calls in this subtree, this one included.
    pub fn call_count(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(call) = pending.pop() {
            count += 1;
            pending.extend(call.methods.iter());
        }
        count
    }
}

// Recursion depth is unbounded, so children are flattened before they drop.
impl Drop for MethodTrace {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.methods);
        while let Some(mut call) = pending.pop() {
            pending.append(&mut call.methods);
        }
    }
}

/// Calls recorded on one thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadTrace {
    time_ms: u64,
    methods: Vec<MethodTrace>,
}

impl ThreadTrace {
    /// Build a thread trace from its top-level calls. The thread's time is
    /// the sum of those calls' times; nested time is already inside them.
    pub fn new(methods: Vec<MethodTrace>) -> Self {
        let time_ms = methods.iter().map(MethodTrace::time_ms).sum();
        Self { time_ms, methods }
    }

    pub fn time_ms(&self) -> u64 {
        self.time_ms
    }

    /// Top-level calls in the order they were made.
    pub fn methods(&self) -> &[MethodTrace] {
        &self.methods
    }

    pub fn call_count(&self) -> usize {
        self.methods.iter().map(MethodTrace::call_count).sum()
    }
}

/// Per-thread call trees, keyed by [`current_thread_id`](crate::current_thread_id).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceResult {
    threads: BTreeMap<u64, ThreadTrace>,
}

impl TraceResult {
    pub fn new(threads: BTreeMap<u64, ThreadTrace>) -> Self {
        Self { threads }
    }

    pub fn threads(&self) -> &BTreeMap<u64, ThreadTrace> {
        &self.threads
    }

    pub fn thread(&self, thread_id: u64) -> Option<&ThreadTrace> {
        self.threads.get(&thread_id)
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}
