//! Line sources for the shell loop.

use std::collections::VecDeque;
use std::io::{self, Write};

use crate::stdin::BlockingBuffer;

/// Line returned once input is exhausted.
pub const EXIT_LINE: &str = "exit";

pub trait LineReader {
    /// Next input line without its terminator.
    fn read_line(&mut self, prompt: &str) -> io::Result<String>;
}

/// Lines of a script; ignores the prompt.
pub struct ScriptReader {
    lines: VecDeque<String>,
}

impl ScriptReader {
    pub fn from_source(source: &str) -> Self {
        Self {
            lines: source.lines().map(str::to_string).collect(),
        }
    }
}

impl LineReader for ScriptReader {
    fn read_line(&mut self, _prompt: &str) -> io::Result<String> {
        Ok(self.lines.pop_front().unwrap_or_else(|| EXIT_LINE.to_string()))
    }
}

/// Reads typed lines out of the default input buffer.
///
/// The buffer is the one the stdin router falls back to, so bytes typed
/// while a child ran stay with that child and never show up here.
pub struct TerminalReader {
    buffer: BlockingBuffer,
    pending: Vec<u8>,
    out: Box<dyn Write + Send>,
}

impl TerminalReader {
    pub fn new(buffer: BlockingBuffer, out: Box<dyn Write + Send>) -> Self {
        Self {
            buffer,
            pending: Vec::new(),
            out,
        }
    }

    fn take_line(&mut self, end: usize) -> io::Result<String> {
        let mut line: Vec<u8> = self.pending.drain(..end).collect();
        if self.pending.first() == Some(&b'\n') {
            self.pending.remove(0);
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        String::from_utf8(line).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

impl LineReader for TerminalReader {
    fn read_line(&mut self, prompt: &str) -> io::Result<String> {
        if let Err(e) = self.out.write_all(prompt.as_bytes()).and_then(|()| self.out.flush()) {
            tracing::warn!(error = %e, "Unable to write prompt");
        }

        let mut chunk = [0u8; 1024];
        loop {
            if let Some(end) = self.pending.iter().position(|&b| b == b'\n') {
                return self.take_line(end);
            }

            let n = self.buffer.read_blocking(&mut chunk);
            if n == 0 {
                if self.pending.is_empty() {
                    let _ = writeln!(self.out).and_then(|()| self.out.flush());
                    return Ok(EXIT_LINE.to_string());
                }
                let end = self.pending.len();
                return self.take_line(end);
            }
            self.pending.extend_from_slice(&chunk[..n]);
        }
    }
}
