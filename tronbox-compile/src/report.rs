//! User facing progress lines of a compilation
//!
//! The [`Logger`] is handed to the workflow explicitly, there is no global instance. Diagnostics
//! for developers go through `tracing` instead.

use std::{
    fmt,
    io::Write,
    sync::{Arc, Mutex},
};

/// Receives the human readable progress lines of a compilation
///
/// Implementers only listen, a `Logger` can not influence the compilation.
pub trait Logger: Send + Sync {
    fn log(&self, message: &str);
}

impl<T: Logger + ?Sized> Logger for Arc<T> {
    fn log(&self, message: &str) {
        (**self).log(message)
    }
}

/// Prints every line to `stdout`
#[derive(Clone, Copy, Debug, Default)]
pub struct StdoutLogger;

impl Logger for StdoutLogger {
    fn log(&self, message: &str) {
        let mut stdout = std::io::stdout().lock();
        // a closed stdout must not abort the compilation
        let _ = writeln!(stdout, "{message}");
    }
}

/// Discards everything
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _message: &str) {}
}

/// Keeps all lines in memory
#[derive(Default)]
pub struct MemoryLogger {
    lines: Mutex<Vec<String>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// All lines logged so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|lines| lines.clone()).unwrap_or_default()
    }
}

impl Logger for MemoryLogger {
    fn log(&self, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(message.to_string());
        }
    }
}

impl fmt::Debug for MemoryLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryLogger").field("lines", &self.lines().len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_logger_keeps_order() {
        let logger = Arc::new(MemoryLogger::new());
        let shared: Arc<dyn Logger> = logger.clone();
        shared.log("Compiling your contracts...");
        shared.log("");
        assert_eq!(logger.lines(), vec!["Compiling your contracts...".to_string(), String::new()]);
    }
}
