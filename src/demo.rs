//! Sample workload driven by the `tracer` binary.
//!
//! `Foo` brackets its methods with explicit `start_trace`/`stop_trace` pairs;
//! `Bar` uses guards. Calls are named by the backtrace resolver, so every
//! instrumented method is kept out of line.

use std::thread;
use std::time::Duration;

use tracer_core::{TraceResult, Tracer};

use crate::error::Error;

#[derive(Debug, Clone)]
pub struct DemoConfig {
    /// Base sleep; every simulated piece of work is a multiple of it.
    pub unit: Duration,
    /// Depth of the recursive chain traced on the worker thread. The main
    /// thread recurses one level less.
    pub recursion: u32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            unit: Duration::from_millis(50),
            recursion: 3,
        }
    }
}

pub struct Bar<'a> {
    tracer: &'a Tracer,
    unit: Duration,
}

impl Bar<'_> {
    #[inline(never)]
    pub fn inner_method1(&self) {
        let _guard = self.tracer.enter();
        thread::sleep(self.unit * 2);
    }

    #[inline(never)]
    pub fn inner_method2(&self) {
        let _guard = self.tracer.enter();
        thread::sleep(self.unit * 4);
    }
}

pub struct Foo<'a> {
    tracer: &'a Tracer,
    bar: Bar<'a>,
    unit: Duration,
}

impl<'a> Foo<'a> {
    pub fn new(tracer: &'a Tracer, unit: Duration) -> Self {
        Self {
            tracer,
            bar: Bar { tracer, unit },
            unit,
        }
    }

    #[inline(never)]
    pub fn my_method1(&self) -> Result<(), Error> {
        self.tracer.start_trace();
        thread::sleep(self.unit * 6);
        self.bar.inner_method1();
        self.bar.inner_method2();
        self.tracer.stop_trace()?;
        Ok(())
    }

    #[inline(never)]
    pub fn my_method2(&self) -> Result<(), Error> {
        self.tracer.start_trace();
        self.bar.inner_method2();
        self.tracer.stop_trace()?;
        Ok(())
    }

    #[inline(never)]
    pub fn recursion(&self, count: u32) -> Result<(), Error> {
        if count == 0 {
            return Ok(());
        }
        self.tracer.start_trace();
        thread::sleep(self.unit);
        self.recursion(count - 1)?;
        self.tracer.stop_trace()?;
        Ok(())
    }
}

/// Run the two-thread workload and return what was traced.
pub fn run(tracer: &Tracer, config: &DemoConfig) -> Result<TraceResult, Error> {
    let foo = Foo::new(tracer, config.unit);
    thread::scope(|s| {
        let worker = s.spawn(|| -> Result<(), Error> {
            foo.my_method2()?;
            foo.recursion(config.recursion)
        });

        foo.my_method1()?;
        foo.my_method2()?;
        foo.recursion(config.recursion.saturating_sub(1))?;

        worker
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
    })?;
    let result = tracer.trace_result();
    tracing::info!(threads = result.len(), "demo workload finished");
    Ok(result)
}

/// Trace a single recursive chain of `depth` calls on the current thread.
pub fn run_recursion(tracer: &Tracer, depth: u32, unit: Duration) -> Result<TraceResult, Error> {
    Foo::new(tracer, unit).recursion(depth)?;
    Ok(tracer.trace_result())
}
