//! Naming the call being traced.
//!
//! `Tracer::start_trace` asks a [`CallerResolver`] for the class and method of
//! whoever called it. The default [`BacktraceResolver`] reads the native stack;
//! tests and callers that want deterministic names use closures or the
//! [`call_site!`](crate::call_site) macro instead.

/// Class and method name of one traced call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallSite {
    pub class_name: String,
    pub method_name: String,
}

impl CallSite {
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
        }
    }

    /// Derive a call site from a demangled Rust path.
    ///
    /// The last path segment is the method and the segment before it the
    /// class: `app::shapes::Circle::area` gives `Circle`/`area`. Closure
    /// segments are dropped so a closure is named after its enclosing
    /// function, and `<T as Trait>::method` is attributed to `T`. A free
    /// function gets its module as the class.
    pub fn from_symbol(path: &str) -> Option<Self> {
        let segments: Vec<&str> = split_path(path)
            .into_iter()
            .filter(|s| !s.is_empty() && !s.starts_with('{'))
            .collect();
        let (&method, rest) = segments.split_last()?;
        let method_name = strip_generics(method);
        if method_name.is_empty() {
            return None;
        }
        let class_name = rest.last().copied().map_or("", type_name);
        Some(Self::new(class_name, method_name))
    }
}

/// Split a Rust path on `::`, leaving anything inside `<...>` intact.
fn split_path(path: &str) -> Vec<&str> {
    let bytes = path.as_bytes();
    let mut segments = Vec::new();
    let mut nesting = 0usize;
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' => nesting += 1,
            b'>' => nesting = nesting.saturating_sub(1),
            b':' if nesting == 0 && bytes.get(i + 1) == Some(&b':') => {
                segments.push(&path[start..i]);
                i += 2;
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    segments.push(&path[start..]);
    segments
}

fn strip_generics(segment: &str) -> &str {
    segment.split('<').next().unwrap_or(segment).trim()
}

/// Bare type name of a class segment: `Foo`, `Foo<T>`, `<a::Foo as b::Bar>`
/// or `<impl b::Bar for a::Foo>`.
fn type_name(segment: &str) -> &str {
    let Some(qualified) = segment
        .strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
    else {
        return strip_generics(segment);
    };
    let self_ty = match qualified.strip_prefix("impl ") {
        Some(imp) => imp.rsplit(" for ").next().unwrap_or(imp),
        None => qualified.split(" as ").next().unwrap_or(qualified),
    };
    let self_ty = self_ty.trim_start_matches('&').trim_start_matches("mut ");
    split_path(self_ty)
        .last()
        .copied()
        .map_or(self_ty, strip_generics)
}

/// Source of call identities for `Tracer::start_trace`.
///
/// Returning `None` means the caller could not be named; the tracer then
/// records no call for that start but still expects the matching stop.
pub trait CallerResolver: Send + Sync {
    fn resolve(&self) -> Option<CallSite>;
}

impl<F> CallerResolver for F
where
    F: Fn() -> Option<CallSite> + Send + Sync,
{
    fn resolve(&self) -> Option<CallSite> {
        self()
    }
}

/// Names the caller from the symbolized native stack.
///
/// Frames are skipped up to and including the tracer's own; the first frame
/// after them is the instrumented function. Inlined frames are symbolized
/// individually, so inlining does not hide the caller. Binaries stripped of
/// symbols resolve to nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct BacktraceResolver;

fn is_tracer_frame(symbol: &str) -> bool {
    symbol.starts_with("tracer_core::") || symbol.starts_with("<tracer_core::")
}

/// Walk state while scanning symbols outward from the capture point.
#[derive(Debug, Default)]
struct CallerSearch {
    inside_tracer: bool,
    done: bool,
    site: Option<CallSite>,
}

impl CallerSearch {
    /// Feed the next symbol, `None` for a frame without a name. The first
    /// frame after the tracer's own is the caller even when it cannot be
    /// named. Returns false once it has been seen.
    fn visit(&mut self, name: Option<&str>) -> bool {
        if self.done {
            return false;
        }
        match name {
            Some(name) if is_tracer_frame(name) => self.inside_tracer = true,
            _ if self.inside_tracer => {
                self.site = name.and_then(CallSite::from_symbol);
                self.done = true;
            }
            _ => {}
        }
        !self.done
    }
}

impl CallerResolver for BacktraceResolver {
    fn resolve(&self) -> Option<CallSite> {
        let mut search = CallerSearch::default();
        backtrace::trace(|frame| {
            let mut symbolized = false;
            backtrace::resolve_frame(frame, |symbol| {
                symbolized = true;
                let name = symbol.name().map(|name| format!("{name:#}"));
                search.visit(name.as_deref());
            });
            if !symbolized {
                search.visit(None);
            }
            !search.done
        });
        search.site
    }
}

/// Call site of the enclosing function, resolved at compile time.
///
/// ```
/// mod shapes {
///     pub struct Circle;
///     impl Circle {
///         pub fn area(&self) -> tracer_core::CallSite {
///             tracer_core::call_site!()
///         }
///     }
/// }
/// let site = shapes::Circle.area();
/// assert_eq!(site.class_name, "Circle");
/// assert_eq!(site.method_name, "area");
/// ```
#[macro_export]
macro_rules! call_site {
    () => {{
        fn __here() {}
        fn __type_name_of<T>(_: T) -> &'static str {
            ::core::any::type_name::<T>()
        }
        let path = __type_name_of(__here);
        let path = path.strip_suffix("::__here").unwrap_or(path);
        $crate::CallSite::from_symbol(path)
            .unwrap_or_else(|| $crate::CallSite::new(module_path!(), path))
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(path: &str) -> (String, String) {
        let s = CallSite::from_symbol(path).expect("path should resolve");
        (s.class_name, s.method_name)
    }

    #[test]
    fn method_on_type() {
        assert_eq!(
            site("app::example::ExampleClass::simple_method"),
            ("ExampleClass".into(), "simple_method".into())
        );
    }

    #[test]
    fn free_function_uses_module() {
        assert_eq!(site("app::worker::run"), ("worker".into(), "run".into()));
    }

    #[test]
    fn closure_named_after_enclosing_function() {
        assert_eq!(
            site("app::Foo::spawn_all::{{closure}}::{{closure}}"),
            ("Foo".into(), "spawn_all".into())
        );
    }

    #[test]
    fn v0_mangling_forms() {
        assert_eq!(
            site("<app::shapes::Circle>::area"),
            ("Circle".into(), "area".into())
        );
        assert_eq!(
            site("app::worker::run::{closure#0}"),
            ("worker".into(), "run".into())
        );
    }

    #[test]
    fn trait_impl_attributed_to_self_type() {
        assert_eq!(
            site("<app::shapes::Circle as app::Shape>::area"),
            ("Circle".into(), "area".into())
        );
        assert_eq!(
            site("<&mut app::Buf<u8> as std::io::Write>::write"),
            ("Buf".into(), "write".into())
        );
    }

    #[test]
    fn impl_block_segments() {
        assert_eq!(
            site("app::<impl app::Shape for app::Square>::area"),
            ("Square".into(), "area".into())
        );
        assert_eq!(
            site("app::<impl app::Square>::side"),
            ("Square".into(), "side".into())
        );
    }

    #[test]
    fn generic_arguments_removed() {
        assert_eq!(
            site("app::Cache<K,V>::get<str>"),
            ("Cache".into(), "get".into())
        );
    }

    #[test]
    fn bare_name_has_empty_class() {
        assert_eq!(site("main"), (String::new(), "main".into()));
    }

    fn search(frames: &[Option<&str>]) -> Option<CallSite> {
        let mut search = CallerSearch::default();
        for &name in frames {
            if !search.visit(name) {
                break;
            }
        }
        search.site
    }

    #[test]
    fn caller_is_first_frame_after_tracer() {
        let frames = [
            Some("backtrace::backtrace::trace"),
            None,
            Some("<tracer_core::caller::BacktraceResolver as tracer_core::caller::CallerResolver>::resolve"),
            Some("tracer_core::tracer::Tracer::start_trace"),
            Some("app::Shop::checkout"),
            Some("app::main"),
        ];
        assert_eq!(search(&frames), Some(CallSite::new("Shop", "checkout")));
    }

    #[test]
    fn unnamed_caller_is_not_credited_to_its_caller() {
        let frames = [
            Some("tracer_core::tracer::Tracer::start_trace"),
            None,
            Some("app::main"),
        ];
        assert_eq!(search(&frames), None);
    }

    #[test]
    fn no_tracer_frame_means_no_caller() {
        assert_eq!(search(&[Some("app::Shop::checkout"), Some("app::main")]), None);
    }

    #[test]
    fn nothing_to_name() {
        assert!(CallSite::from_symbol("").is_none());
        assert!(CallSite::from_symbol("{{closure}}").is_none());
    }

    #[test]
    fn tracer_frames_recognized() {
        assert!(is_tracer_frame("tracer_core::tracer::Tracer::start_trace"));
        assert!(is_tracer_frame(
            "<tracer_core::caller::BacktraceResolver as tracer_core::caller::CallerResolver>::resolve"
        ));
        assert!(!is_tracer_frame("tracer::demo::Foo::my_method1"));
    }

    #[test]
    fn closures_are_resolvers() {
        let fixed = || Some(CallSite::new("Fixed", "call"));
        assert_eq!(fixed.resolve(), Some(CallSite::new("Fixed", "call")));
    }

    #[test]
    fn call_site_macro_names_enclosing_function() {
        struct Widget;
        impl Widget {
            fn render(&self) -> CallSite {
                crate::call_site!()
            }
        }
        let s = Widget.render();
        assert_eq!(s.method_name, "render");
        assert_eq!(s.class_name, "Widget");
    }
}
