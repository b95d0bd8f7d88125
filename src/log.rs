//! Operator-facing progress sink.
//!
//! Progress lines (status transitions, event history, failure detail) are
//! written through a [`LogSink`] supplied by the host so they land wherever
//! the job's console output goes. Diagnostic logging uses `tracing`.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

/// Append-only line writer for progress output.
pub trait LogSink: Send + Sync {
    /// Appends one line.
    fn line(&self, message: &str);
}

/// Shared handle to a [`LogSink`].
pub type SharedSink = Arc<dyn LogSink>;

/// [`LogSink`] writing newline-terminated lines to any [`Write`].
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    /// Wraps a writer.
    #[must_use]
    pub const fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Wraps a writer and returns it as a [`SharedSink`].
    #[must_use]
    pub fn shared(writer: W) -> SharedSink
    where
        W: 'static,
    {
        Arc::new(Self::new(writer))
    }
}

impl<W: Write + Send> LogSink for WriterSink<W> {
    fn line(&self, message: &str) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{message}").ok();
        writer.flush().ok();
    }
}
