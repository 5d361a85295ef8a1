use tracer_core::{MethodTrace, TraceResult};

use crate::error::Error;
use crate::serialize::TraceSerializer;

const NAME_WIDTH: usize = 48;

/// Format a trace result as one indented table per thread.
///
/// Nested calls are indented under their caller. `Total` includes nested
/// calls, `Self` excludes them.
pub fn format_tree(result: &TraceResult) -> String {
    let mut out = String::new();
    for (id, thread) in result.threads() {
        out.push_str(&format!(
            "thread {id}: {} call(s), {}ms\n",
            thread.call_count(),
            thread.time_ms()
        ));
        out.push_str(&format!(
            "{:<NAME_WIDTH$} {:>10} {:>10}\n",
            "Method", "Total", "Self"
        ));
        out.push_str(&format!("{}\n", "-".repeat(NAME_WIDTH + 22)));
        for method in thread.methods() {
            format_method(&mut out, method, 0);
        }
        out.push('\n');
    }
    out
}

fn format_method(out: &mut String, method: &MethodTrace, level: usize) {
    let name = if method.class_name().is_empty() {
        method.method_name().to_owned()
    } else {
        format!("{}::{}", method.class_name(), method.method_name())
    };
    let label = format!("{}{name}", "  ".repeat(level));
    out.push_str(&format!(
        "{label:<NAME_WIDTH$} {:>8}ms {:>8}ms\n",
        method.time_ms(),
        method.self_time_ms()
    ));
    for child in method.methods() {
        format_method(out, child, level + 1);
    }
}

/// The text table as a serializer, so it can be written alongside JSON/XML.
pub struct TextReport;

impl TraceSerializer for TextReport {
    fn serialize(&self, result: &TraceResult) -> Result<String, Error> {
        Ok(format_tree(result))
    }

    fn extension(&self) -> &'static str {
        "txt"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tracer_core::ThreadTrace;

    fn sample() -> TraceResult {
        let inner = MethodTrace::new("inner_method", "InnerClass", 120, Vec::new());
        let outer = MethodTrace::new("outside_method", "ExampleClass", 130, vec![inner]);
        let free = MethodTrace::new("main", "", 5, Vec::new());
        let mut threads = BTreeMap::new();
        threads.insert(3, ThreadTrace::new(vec![outer, free]));
        TraceResult::new(threads)
    }

    #[test]
    fn nested_calls_are_indented_under_caller() {
        let table = format_tree(&sample());
        let outer_line = table
            .lines()
            .find(|l| l.contains("outside_method"))
            .expect("outer in table");
        let inner_line = table
            .lines()
            .find(|l| l.contains("inner_method"))
            .expect("inner in table");
        assert!(outer_line.starts_with("ExampleClass::outside_method"));
        assert!(inner_line.starts_with("  InnerClass::inner_method"));
        let outer_pos = table.find("outside_method").unwrap();
        let inner_pos = table.find("inner_method").unwrap();
        assert!(outer_pos < inner_pos);
    }

    #[test]
    fn header_and_self_time() {
        let table = format_tree(&sample());
        assert!(table.starts_with("thread 3: 3 call(s), 135ms\n"), "{table}");
        let outer_line = table
            .lines()
            .find(|l| l.contains("outside_method"))
            .unwrap();
        assert!(outer_line.trim_end().ends_with("130ms       10ms"), "{outer_line}");
    }

    #[test]
    fn classless_call_shows_bare_name() {
        let table = format_tree(&sample());
        assert!(table.lines().any(|l| l.starts_with("main ")), "{table}");
    }

    #[test]
    fn empty_result_is_empty_table() {
        assert_eq!(format_tree(&TraceResult::default()), "");
    }
}
