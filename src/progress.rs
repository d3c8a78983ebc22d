// src/progress.rs
/// Lightweight progress reporting used by long-running operations (paging, enrichment).
/// Frontends implement this to surface status to users.
pub trait Progress {
    /// Called at the start with the total number of items (if known).
    fn begin(&mut self, _total: usize) {}

    /// Free-form status line for human eyes.
    fn log(&mut self, _msg: &str) {}

    /// One key was fetched and merged.
    fn item_done(&mut self, _key: &str) {}

    /// One key failed; the run goes on.
    fn item_failed(&mut self, _key: &str, _reason: &str) {}

    /// Called at the end, successful or not.
    fn finish(&mut self) {}
}

/// A no-op progress sink.
pub struct NullProgress;
impl Progress for NullProgress {}

/// Counts what it is told; handy in tests and summaries.
#[derive(Debug, Default)]
pub struct CountingProgress {
    pub total: usize,
    pub done: Vec<String>,
    pub failed: Vec<String>,
    pub lines: Vec<String>,
    pub finished: bool,
}

impl Progress for CountingProgress {
    fn begin(&mut self, total: usize) { self.total = total; }
    fn log(&mut self, msg: &str) { self.lines.push(msg.to_string()); }
    fn item_done(&mut self, key: &str) { self.done.push(key.to_string()); }
    fn item_failed(&mut self, key: &str, _reason: &str) { self.failed.push(key.to_string()); }
    fn finish(&mut self) { self.finished = true; }
}
