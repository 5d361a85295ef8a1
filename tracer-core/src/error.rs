#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TraceError {
    #[error("unbalanced trace calls: thread {thread_id} stopped a trace it never started")]
    UnknownThread { thread_id: u64 },

    #[error("unbalanced trace calls: thread {thread_id} has no open call to stop")]
    Unbalanced { thread_id: u64 },
}
