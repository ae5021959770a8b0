//! Leveled line logger.
//!
//! Lines are rendered into a fixed stack buffer and handed to the sink whole,
//! under one lock, so lines from concurrent callers never interleave and the
//! hot path never touches the heap.

use std::ffi::c_int;
use std::fmt::{self, Write as _};
use std::sync::Arc;

use memtier_core::LogLevel;
use parking_lot::Mutex;

/// Longest line written, newline included. Longer lines are truncated.
pub const MAX_LINE: usize = 512;

/// Destination for complete log lines. Each call receives exactly one line
/// terminated by `\n`.
pub trait LogSink: Send {
    fn write_line(&mut self, line: &[u8]);
}

/// Writes to file descriptor 1 with raw `write(2)`, bypassing stdio
/// buffering.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn write_line(&mut self, line: &[u8]) {
        write_all_fd(libc::STDOUT_FILENO, line);
    }
}

fn write_all_fd(fd: c_int, mut buf: &[u8]) {
    while !buf.is_empty() {
        // SAFETY: `buf` is a valid readable slice for its length.
        let rc = unsafe { libc::write(fd, buf.as_ptr().cast(), buf.len()) };
        if rc < 0 {
            if std::io::Error::last_os_error().kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return;
        }
        if rc == 0 {
            return;
        }
        buf = &buf[rc as usize..];
    }
}

/// In-memory sink. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct CaptureSink {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl CaptureSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock()).into_owned()
    }

    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_owned).collect()
    }

    pub fn clear(&self) {
        self.buf.lock().clear();
    }
}

impl LogSink for CaptureSink {
    fn write_line(&mut self, line: &[u8]) {
        self.buf.lock().extend_from_slice(line);
    }
}

/// Fixed-capacity line buffer. Writes past the capacity are dropped; one
/// byte is always kept free for the newline.
pub struct LineBuffer {
    buf: [u8; MAX_LINE],
    len: usize,
}

impl LineBuffer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buf: [0; MAX_LINE],
            len: 0,
        }
    }

    /// Terminate the line and return it.
    pub fn finish(&mut self) -> &[u8] {
        self.buf[self.len] = b'\n';
        &self.buf[..=self.len]
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Write for LineBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = MAX_LINE - 1 - self.len;
        let take = s.len().min(room);
        self.buf[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        Ok(())
    }
}

pub struct Logger {
    level: LogLevel,
    sink: Mutex<Box<dyn LogSink>>,
}

impl Logger {
    pub fn new(level: LogLevel, sink: Box<dyn LogSink>) -> Self {
        Self {
            level,
            sink: Mutex::new(sink),
        }
    }

    #[must_use]
    pub fn with_level(self, level: LogLevel) -> Self {
        Self { level, ..self }
    }

    #[must_use]
    pub fn level(&self) -> LogLevel {
        self.level
    }

    #[inline]
    #[must_use]
    pub fn enabled(&self, level: LogLevel) -> bool {
        self.level.admits(level)
    }

    pub fn log(&self, level: LogLevel, message: fmt::Arguments<'_>) {
        if !self.enabled(level) {
            return;
        }
        let mut line = LineBuffer::new();
        let _ = line.write_str(level.prefix());
        let _ = line.write_fmt(message);
        self.sink.lock().write_line(line.finish());
    }

    pub fn error(&self, message: &dyn fmt::Display) {
        self.log(LogLevel::Error, format_args!("{message}"));
    }

    pub fn info(&self, message: &dyn fmt::Display) {
        self.log(LogLevel::Info, format_args!("{message}"));
    }

    pub fn debug(&self, message: &dyn fmt::Display) {
        self.log(LogLevel::Debug, format_args!("{message}"));
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").field("level", &self.level).finish()
    }
}
