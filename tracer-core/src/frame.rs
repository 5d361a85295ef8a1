//! Mutable per-thread call tree.
//!
//! Frames live in an arena owned by their thread's `ThreadCalls` and refer to
//! children by index. Nesting comes entirely from the explicit open stack: a
//! new frame becomes the last child of the innermost open frame, and a stop
//! closes exactly the frame it pops. No tree search is ever needed.

use crate::caller::CallSite;
use crate::error::TraceError;
use crate::result::{MethodTrace, ThreadTrace};
use crate::stopwatch::Stopwatch;

type FrameId = usize;

/// One recorded call, open until its stopwatch is stopped.
#[derive(Debug)]
pub(crate) struct CallFrame {
    site: CallSite,
    stopwatch: Stopwatch,
    children: Vec<FrameId>,
}

/// Entry on a thread's open stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenSlot {
    Frame(FrameId),
    /// A start whose caller could not be named. Holds the stack position so
    /// the matching stop pops it instead of closing an unrelated frame.
    Unresolved,
}

/// What a stop closed.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Closed {
    Frame { site: CallSite, time_ms: u64 },
    Unresolved,
}

/// Every call recorded on one thread, plus the calls still open.
#[derive(Debug)]
pub(crate) struct ThreadCalls {
    thread_id: u64,
    frames: Vec<CallFrame>,
    roots: Vec<FrameId>,
    open: Vec<OpenSlot>,
}

impl ThreadCalls {
    pub(crate) fn new(thread_id: u64) -> Self {
        Self {
            thread_id,
            frames: Vec::new(),
            roots: Vec::new(),
            open: Vec::new(),
        }
    }

    /// Number of starts not yet matched by a stop.
    pub(crate) fn depth(&self) -> usize {
        self.open.len()
    }

    /// Innermost open frame that records a call; unresolved slots are
    /// transparent to nesting.
    fn innermost_frame(&self) -> Option<FrameId> {
        self.open.iter().rev().find_map(|slot| match slot {
            OpenSlot::Frame(id) => Some(*id),
            OpenSlot::Unresolved => None,
        })
    }

    /// Record a new call as the last child of the innermost open call (or as
    /// a new root) and start its stopwatch.
    pub(crate) fn open_frame(&mut self, site: CallSite) {
        let id = self.frames.len();
        match self.innermost_frame() {
            Some(parent) => self.frames[parent].children.push(id),
            None => self.roots.push(id),
        }
        self.open.push(OpenSlot::Frame(id));
        self.frames.push(CallFrame {
            site,
            children: Vec::new(),
            // Started last so bookkeeping above is not billed to the call.
            stopwatch: Stopwatch::start_new(),
        });
    }

    pub(crate) fn open_unresolved(&mut self) {
        self.open.push(OpenSlot::Unresolved);
    }

    /// Close the innermost open call.
    pub(crate) fn close_innermost(&mut self) -> Result<Closed, TraceError> {
        match self.open.pop() {
            Some(OpenSlot::Frame(id)) => {
                let frame = &mut self.frames[id];
                frame.stopwatch.stop();
                Ok(Closed::Frame {
                    site: frame.site.clone(),
                    time_ms: frame.stopwatch.elapsed_ms(),
                })
            }
            Some(OpenSlot::Unresolved) => Ok(Closed::Unresolved),
            None => Err(TraceError::Unbalanced {
                thread_id: self.thread_id,
            }),
        }
    }

    /// Deep copy into the immutable snapshot form.
    ///
    /// Built bottom-up: a child is always pushed after its parent, so walking
    /// the arena backwards finishes every child before the parent takes it.
    pub(crate) fn snapshot(&self) -> ThreadTrace {
        let mut built: Vec<Option<MethodTrace>> = Vec::new();
        built.resize_with(self.frames.len(), || None);
        for (id, frame) in self.frames.iter().enumerate().rev() {
            let children = frame
                .children
                .iter()
                .filter_map(|&child| built[child].take())
                .collect();
            built[id] = Some(MethodTrace::new(
                frame.site.method_name.clone(),
                frame.site.class_name.clone(),
                frame.stopwatch.elapsed_ms(),
                children,
            ));
        }
        ThreadTrace::new(
            self.roots
                .iter()
                .filter_map(|&id| built[id].take())
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(method: &str) -> CallSite {
        CallSite::new("Example", method)
    }

    fn names(methods: &[MethodTrace]) -> Vec<&str> {
        methods.iter().map(MethodTrace::method_name).collect()
    }

    #[test]
    fn sequential_calls_become_roots_in_order() {
        let mut calls = ThreadCalls::new(1);
        for name in ["first", "second", "third"] {
            calls.open_frame(site(name));
            calls.close_innermost().unwrap();
        }
        let trace = calls.snapshot();
        assert_eq!(names(trace.methods()), ["first", "second", "third"]);
        assert!(trace.methods().iter().all(|m| m.methods().is_empty()));
    }

    #[test]
    fn nested_call_attaches_to_innermost_open_frame() {
        let mut calls = ThreadCalls::new(1);
        calls.open_frame(site("outer"));
        calls.open_frame(site("a"));
        calls.close_innermost().unwrap();
        calls.open_frame(site("b"));
        calls.open_frame(site("b_inner"));
        calls.close_innermost().unwrap();
        calls.close_innermost().unwrap();
        calls.close_innermost().unwrap();
        assert_eq!(calls.depth(), 0);

        let trace = calls.snapshot();
        assert_eq!(trace.methods().len(), 1);
        let outer = &trace.methods()[0];
        assert_eq!(names(outer.methods()), ["a", "b"]);
        assert_eq!(names(outer.methods()[1].methods()), ["b_inner"]);
    }

    #[test]
    fn close_reports_the_popped_frame() {
        let mut calls = ThreadCalls::new(1);
        calls.open_frame(site("outer"));
        calls.open_frame(site("inner"));
        match calls.close_innermost().unwrap() {
            Closed::Frame { site, .. } => assert_eq!(site.method_name, "inner"),
            Closed::Unresolved => panic!("expected a recorded frame"),
        }
    }

    #[test]
    fn close_on_empty_stack_is_unbalanced() {
        let mut calls = ThreadCalls::new(7);
        assert_eq!(
            calls.close_innermost(),
            Err(TraceError::Unbalanced { thread_id: 7 })
        );

        calls.open_frame(site("once"));
        calls.close_innermost().unwrap();
        assert_eq!(
            calls.close_innermost(),
            Err(TraceError::Unbalanced { thread_id: 7 })
        );
        assert_eq!(calls.snapshot().methods().len(), 1, "tree left intact");
    }

    #[test]
    fn unresolved_start_keeps_stack_balanced() {
        let mut calls = ThreadCalls::new(1);
        calls.open_frame(site("outer"));
        calls.open_unresolved();
        calls.open_frame(site("nested"));
        assert_eq!(calls.depth(), 3);

        assert!(matches!(calls.close_innermost(), Ok(Closed::Frame { .. })));
        assert_eq!(calls.close_innermost(), Ok(Closed::Unresolved));
        assert!(matches!(calls.close_innermost(), Ok(Closed::Frame { .. })));

        // The call made inside the unresolved one attaches to the nearest
        // recorded ancestor.
        let trace = calls.snapshot();
        assert_eq!(names(trace.methods()), ["outer"]);
        assert_eq!(names(trace.methods()[0].methods()), ["nested"]);
    }

    #[test]
    fn open_frame_reports_zero_and_keeps_finished_children() {
        let mut calls = ThreadCalls::new(1);
        calls.open_frame(site("abandoned"));
        calls.open_frame(site("done"));
        std::thread::sleep(std::time::Duration::from_millis(5));
        calls.close_innermost().unwrap();

        let trace = calls.snapshot();
        let abandoned = &trace.methods()[0];
        assert_eq!(abandoned.time_ms(), 0);
        assert_eq!(names(abandoned.methods()), ["done"]);
        assert!(abandoned.methods()[0].time_ms() >= 5);
        assert_eq!(trace.time_ms(), 0);
    }

    #[test]
    fn deep_nesting_100_levels() {
        let mut calls = ThreadCalls::new(1);
        for _ in 0..100 {
            calls.open_frame(site("recurse"));
        }
        for _ in 0..100 {
            calls.close_innermost().unwrap();
        }
        let trace = calls.snapshot();
        assert_eq!(trace.methods().len(), 1);
        assert_eq!(trace.methods()[0].depth(), 100);
        assert_eq!(trace.call_count(), 100);
    }
}
