//! Response output.
//!
//! The kernel writes the status line and headers once, then the body in one
//! or more chunks. Sinks decide where that goes: an HTTP response stream,
//! stdout for the CLI, or a buffer for tests and mocks.

use std::any::Any;
use std::io;

use axum::http::HeaderMap;

/// Destination of a response.
pub trait ResponseSink: Send {
    fn write_head(&mut self, code: u16, reason: &str, headers: &HeaderMap) -> io::Result<()>;

    fn write_body(&mut self, chunk: &[u8]) -> io::Result<()>;

    /// True once the receiving side went away.
    fn is_closed(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;
}

/// Collects everything in memory.
#[derive(Debug, Default)]
pub struct BufferedSink {
    head: Option<(u16, String, HeaderMap)>,
    heads_written: usize,
    body: Vec<u8>,
    closed: bool,
}

impl BufferedSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Behaves like a client that already disconnected.
    pub fn closed() -> Self {
        Self {
            closed: true,
            ..Self::default()
        }
    }

    pub fn head(&self) -> Option<&(u16, String, HeaderMap)> {
        self.head.as_ref()
    }

    pub fn heads_written(&self) -> usize {
        self.heads_written
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl ResponseSink for BufferedSink {
    fn write_head(&mut self, code: u16, reason: &str, headers: &HeaderMap) -> io::Result<()> {
        self.heads_written += 1;
        self.head = Some((code, reason.to_string(), headers.clone()));
        Ok(())
    }

    fn write_body(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.body.extend_from_slice(chunk);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Writes the body to any `io::Write`; headers are dropped.
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: W,
}

impl<W: io::Write + Send + 'static> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: io::Write + Send + 'static> ResponseSink for WriterSink<W> {
    fn write_head(&mut self, _code: u16, _reason: &str, _headers: &HeaderMap) -> io::Result<()> {
        Ok(())
    }

    fn write_body(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.writer.write_all(chunk)?;
        self.writer.flush()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
