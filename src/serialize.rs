//! Rendering a [`TraceResult`] as JSON or XML.
//!
//! Both formats share one shape: a list of threads, each with an `id`, its
//! total `time` in milliseconds and its top-level `methods`; each method has a
//! `name`, `class`, `time` and nested `methods`.

use std::fmt::Write as _;

use serde::Serialize;
use tracer_core::{MethodTrace, ThreadTrace, TraceResult};

use crate::error::Error;
use crate::report::TextReport;

/// Turns a trace result into text.
pub trait TraceSerializer {
    fn serialize(&self, result: &TraceResult) -> Result<String, Error>;

    /// File extension for output written in this format, without the dot.
    fn extension(&self) -> &'static str;
}

/// Output formats selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    Json,
    Xml,
    Text,
}

impl Format {
    pub fn serializer(self) -> Box<dyn TraceSerializer> {
        match self {
            Format::Json => Box::new(JsonSerializer::default()),
            Format::Xml => Box::new(XmlSerializer::default()),
            Format::Text => Box::new(TextReport),
        }
    }
}

#[derive(Serialize)]
struct SerializableTraceResult<'a> {
    threads: Vec<SerializableThread<'a>>,
}

#[derive(Serialize)]
struct SerializableThread<'a> {
    id: u64,
    time: u64,
    methods: Vec<SerializableMethod<'a>>,
}

#[derive(Serialize)]
struct SerializableMethod<'a> {
    name: &'a str,
    class: &'a str,
    time: u64,
    methods: Vec<SerializableMethod<'a>>,
}

impl<'a> SerializableTraceResult<'a> {
    fn new(result: &'a TraceResult) -> Self {
        Self {
            threads: result
                .threads()
                .iter()
                .map(|(&id, thread)| SerializableThread::new(id, thread))
                .collect(),
        }
    }
}

impl<'a> SerializableThread<'a> {
    fn new(id: u64, thread: &'a ThreadTrace) -> Self {
        Self {
            id,
            time: thread.time_ms(),
            methods: thread.methods().iter().map(SerializableMethod::new).collect(),
        }
    }
}

impl<'a> SerializableMethod<'a> {
    fn new(method: &'a MethodTrace) -> Self {
        Self {
            name: method.method_name(),
            class: method.class_name(),
            time: method.time_ms(),
            methods: method.methods().iter().map(SerializableMethod::new).collect(),
        }
    }
}

pub struct JsonSerializer {
    pub pretty: bool,
}

impl Default for JsonSerializer {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl TraceSerializer for JsonSerializer {
    fn serialize(&self, result: &TraceResult) -> Result<String, Error> {
        let doc = SerializableTraceResult::new(result);
        let json = if self.pretty {
            serde_json::to_string_pretty(&doc)?
        } else {
            serde_json::to_string(&doc)?
        };
        Ok(json)
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}

/// Indented XML: `<root>` holding `<thread id time>` elements holding nested
/// `<method name class time>` elements. Methods without children are
/// self-closing.
pub struct XmlSerializer {
    pub indent: usize,
}

impl Default for XmlSerializer {
    fn default() -> Self {
        Self { indent: 2 }
    }
}

impl XmlSerializer {
    fn pad(&self, out: &mut String, level: usize) {
        out.extend(std::iter::repeat_n(' ', self.indent * level));
    }

    fn write_method(&self, out: &mut String, method: &MethodTrace, level: usize) {
        self.pad(out, level);
        let _ = write!(
            out,
            "<method name=\"{}\" class=\"{}\" time=\"{}\"",
            escape(method.method_name()),
            escape(method.class_name()),
            method.time_ms()
        );
        if method.methods().is_empty() {
            out.push_str(" />\n");
            return;
        }
        out.push_str(">\n");
        for child in method.methods() {
            self.write_method(out, child, level + 1);
        }
        self.pad(out, level);
        out.push_str("</method>\n");
    }
}

impl TraceSerializer for XmlSerializer {
    fn serialize(&self, result: &TraceResult) -> Result<String, Error> {
        let mut out = String::from("<root>\n");
        for (id, thread) in result.threads() {
            self.pad(&mut out, 1);
            let _ = writeln!(out, "<thread id=\"{id}\" time=\"{}\">", thread.time_ms());
            for method in thread.methods() {
                self.write_method(&mut out, method, 2);
            }
            self.pad(&mut out, 1);
            out.push_str("</thread>\n");
        }
        out.push_str("</root>");
        Ok(out)
    }

    fn extension(&self) -> &'static str {
        "xml"
    }
}

/// Escape a string for use inside a double-quoted XML attribute.
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
