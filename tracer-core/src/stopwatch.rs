use std::time::{Duration, Instant};

/// Wall-clock timer for one open call.
///
/// Started on creation; `stop` freezes the elapsed time. A stopwatch that was
/// never stopped reports zero, which is how unfinished calls appear in
/// snapshots.
#[derive(Debug)]
pub(crate) struct Stopwatch {
    start: Instant,
    elapsed: Option<Duration>,
}

impl Stopwatch {
    pub(crate) fn start_new() -> Self {
        Self {
            start: Instant::now(),
            elapsed: None,
        }
    }

    /// Freeze the elapsed time. Later calls keep the first reading.
    pub(crate) fn stop(&mut self) -> Duration {
        *self.elapsed.get_or_insert_with(|| self.start.elapsed())
    }

    /// Whole milliseconds between start and stop, truncated.
    pub(crate) fn elapsed_ms(&self) -> u64 {
        self.elapsed
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}
