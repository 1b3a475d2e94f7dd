use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

/// Destination for endpoint diagnostics. Injected instead of a process
/// global so the layer is testable in isolation; endpoints resolve their
/// sink at creation (per-endpoint override, then the process default).
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, level: log::Level, message: fmt::Arguments<'_>);
}

/// Default sink: forwards into the `log` facade.
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&self, level: log::Level, message: fmt::Arguments<'_>) {
        log::log!(level, "{}", message);
    }
}

/// Discards everything.
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn report(&self, _level: log::Level, _message: fmt::Arguments<'_>) {}
}

/// Captures rendered lines, for tests asserting on diagnostics.
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> MemorySink {
        MemorySink {
            lines: Mutex::new(Vec::new()),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|line| line.contains(needle))
    }
}

impl DiagnosticSink for MemorySink {
    fn report(&self, level: log::Level, message: fmt::Arguments<'_>) {
        self.lines.lock().push(format!("{level} {message}"));
    }
}

static PROCESS_SINK: RwLock<Option<Arc<dyn DiagnosticSink>>> = RwLock::new(None);

pub(crate) fn install_process_sink(sink: Arc<dyn DiagnosticSink>) -> bool {
    let mut slot = PROCESS_SINK.write();
    if slot.is_some() {
        return false;
    }
    *slot = Some(sink);
    true
}

pub(crate) fn clear_process_sink() {
    *PROCESS_SINK.write() = None;
}

/// The sink endpoints fall back to when no override was given.
pub(crate) fn process_sink() -> Arc<dyn DiagnosticSink> {
    PROCESS_SINK
        .read()
        .clone()
        .unwrap_or_else(|| Arc::new(LogSink))
}
