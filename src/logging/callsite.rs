//! Enclosing function names for call sites
//!
//! The macros name the function at compile time. Method calls only know their
//! file, line and column, so the name is looked up once per call site in a
//! captured backtrace and cached. Without debug info the lookup finds nothing
//! and records go out without a function.

use std::backtrace::Backtrace;
use std::collections::HashMap;
use std::panic::Location;
use std::sync::{OnceLock, RwLock};

/// How far below the reported line a multi-line call may resolve
const LINE_SLACK: u32 = 8;

type CallSite = (&'static str, u32, u32);

fn cache() -> &'static RwLock<HashMap<CallSite, Option<&'static str>>> {
    static CACHE: OnceLock<RwLock<HashMap<CallSite, Option<&'static str>>>> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Strip the helper item and closure markers from a `type_name` path
#[doc(hidden)]
pub fn trim_function(name: &str) -> &str {
    let mut name = name.strip_suffix("::here").unwrap_or(name);
    while let Some(outer) = name.strip_suffix("::{{closure}}") {
        name = outer;
    }
    name
}

/// Function containing `location`, resolved from the current stack
pub(crate) fn enclosing_function(location: &'static Location<'static>) -> Option<&'static str> {
    let key = (location.file(), location.line(), location.column());
    if let Some(found) = cache().read().ok().and_then(|c| c.get(&key).copied()) {
        return found;
    }

    let resolved = find_in_backtrace(&Backtrace::force_capture().to_string(), key.0, key.1)
        .map(|name| &*Box::leak(name.into_boxed_str()));
    if let Ok(mut cache) = cache().write() {
        return *cache.entry(key).or_insert(resolved);
    }
    resolved
}

/// Match `file:line` against the `at` lines of a rendered backtrace
fn find_in_backtrace(rendered: &str, file: &str, line: u32) -> Option<String> {
    let file = file.replace('\\', "/");
    let mut symbol: Option<&str> = None;
    let mut nearest: Option<(u32, &str)> = None;

    for entry in rendered.lines().map(str::trim) {
        let Some(location) = entry.strip_prefix("at ") else {
            symbol = Some(strip_frame_index(entry));
            continue;
        };
        let Some(name) = symbol.take() else { continue };
        let Some((path, at_line)) = split_location(location) else { continue };
        if !same_file(&path.replace('\\', "/"), &file) || at_line < line {
            continue;
        }

        let distance = at_line - line;
        if distance == 0 {
            return Some(trim_function(name).to_string());
        }
        if distance <= LINE_SLACK && nearest.map_or(true, |(d, _)| distance < d) {
            nearest = Some((distance, name));
        }
    }
    nearest.map(|(_, name)| trim_function(name).to_string())
}

fn strip_frame_index(entry: &str) -> &str {
    match entry.split_once(": ") {
        Some((index, name)) if index.chars().all(|c| c.is_ascii_digit()) => name,
        _ => entry,
    }
}

/// `path:line:column` or `path:line`
fn split_location(location: &str) -> Option<(&str, u32)> {
    let mut parts = location.rsplitn(3, ':');
    let last = parts.next()?;
    let middle = parts.next()?;
    match parts.next() {
        Some(path) => Some((path, middle.parse().ok()?)),
        None => Some((middle, last.parse().ok()?)),
    }
}

fn same_file(rendered: &str, file: &str) -> bool {
    let rendered = rendered.strip_prefix("./").unwrap_or(rendered);
    rendered == file || rendered.ends_with(&format!("/{file}")) || file.ends_with(&format!("/{rendered}"))
}
