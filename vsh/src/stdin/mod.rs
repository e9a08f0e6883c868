//! Routing of the shell's single standard-input stream.
//!
//! A background thread copies raw input into a [`SwitchableWriter`]. While no
//! command runs, bytes land in the default [`BlockingBuffer`], which the
//! interactive reader consumes. The dispatcher points the writer at a child's
//! input pipe for the duration of one foreground command.

mod buffer;
mod switch;

pub use buffer::BlockingBuffer;
pub use switch::{Sink, StdinRoute, SwitchableWriter};

use std::io::{self, IsTerminal, Read};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub(crate) const COPY_CHUNK_SIZE: usize = 4096;

/// What a zero-byte read from the input source means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EofPolicy {
    /// The source is exhausted for good (pipes, files).
    Final,
    /// Ctrl-D on a terminal: ends input for the foreground child only.
    /// At the prompt it still ends the shell's input.
    PerCommand,
}

impl EofPolicy {
    pub fn for_source<S: IsTerminal>(source: &S) -> Self {
        if source.is_terminal() {
            Self::PerCommand
        } else {
            Self::Final
        }
    }
}

/// Start the thread that copies `source` into `router` for the shell's
/// lifetime.
pub fn spawn_copier<R>(
    mut source: R,
    router: Arc<SwitchableWriter>,
    policy: EofPolicy,
) -> io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name("stdin-copier".to_string())
        .spawn(move || {
            let mut chunk = [0u8; COPY_CHUNK_SIZE];
            loop {
                match source.read(&mut chunk) {
                    Ok(0) => {
                        if router.end_of_input(policy) {
                            break;
                        }
                    }
                    Ok(n) => {
                        if let Err(e) = router.write(&chunk[..n]) {
                            // the attached child already went away
                            tracing::debug!(bytes = n, route = %router.route(), error = %e, "Dropped input");
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "Input source failed");
                        break;
                    }
                }
            }
            router.close_input();
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::Write;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[test]
    fn copier_feeds_buffer_and_closes_on_eof() {
        let buffer = BlockingBuffer::new();
        let router = Arc::new(SwitchableWriter::new(buffer.clone()));

        let handle = spawn_copier(io::Cursor::new(b"ls /\n".to_vec()), router, EofPolicy::Final).unwrap();
        handle.join().unwrap();

        let mut out = Vec::new();
        buffer.clone().read_to_end(&mut out).unwrap();
        assert_eq!(out, b"ls /\n");
        assert!(buffer.is_closed());
    }

    /// Input source that plays back a fixed sequence of reads.
    enum Step {
        Bytes(&'static [u8]),
        Eof,
        Restore(Arc<SwitchableWriter>),
    }

    struct Scripted(VecDeque<Step>);

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            loop {
                match self.0.pop_front() {
                    Some(Step::Bytes(bytes)) => {
                        buf[..bytes.len()].copy_from_slice(bytes);
                        return Ok(bytes.len());
                    }
                    Some(Step::Restore(router)) => {
                        router.restore();
                    }
                    Some(Step::Eof) | None => return Ok(0),
                }
            }
        }
    }

    /// Child input pipe that records whether it was dropped.
    #[derive(Clone, Default)]
    struct ChildPipe {
        data: Arc<Mutex<Vec<u8>>>,
        closed: Arc<AtomicBool>,
    }

    struct PipeEnd(ChildPipe);

    impl Write for PipeEnd {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.data.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Drop for PipeEnd {
        fn drop(&mut self) {
            self.0.closed.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn terminal_eof_ends_only_the_child_input() {
        let buffer = BlockingBuffer::new();
        let router = Arc::new(SwitchableWriter::new(buffer.clone()));
        let pipe = ChildPipe::default();
        router.switch(StdinRoute::Piped(1), Box::new(PipeEnd(pipe.clone())));

        let source = Scripted(VecDeque::from([
            Step::Bytes(b"data\n"),
            Step::Eof,
            Step::Restore(router.clone()),
            Step::Bytes(b"echo next\n"),
        ]));
        let handle = spawn_copier(source, router, EofPolicy::PerCommand).unwrap();
        handle.join().unwrap();

        assert_eq!(*pipe.data.lock().unwrap(), b"data\n");
        assert!(pipe.closed.load(Ordering::SeqCst));

        // the trailing EOF arrived at the prompt and ended the shell's input
        let mut out = Vec::new();
        buffer.clone().read_to_end(&mut out).unwrap();
        assert_eq!(out, b"echo next\n");
        assert!(buffer.is_closed());
    }

    #[test]
    fn final_eof_while_piped_closes_everything() {
        let buffer = BlockingBuffer::new();
        let router = Arc::new(SwitchableWriter::new(buffer.clone()));
        let pipe = ChildPipe::default();
        router.switch(StdinRoute::Piped(1), Box::new(PipeEnd(pipe.clone())));

        let source = Scripted(VecDeque::from([
            Step::Bytes(b"data\n"),
            Step::Eof,
            Step::Bytes(b"never read\n"),
        ]));
        let handle = spawn_copier(source, router.clone(), EofPolicy::Final).unwrap();
        handle.join().unwrap();

        assert!(pipe.closed.load(Ordering::SeqCst));
        router.restore();
        assert!(buffer.is_closed());
        assert!(buffer.take_available().is_empty());
    }

    #[test]
    fn pipes_and_files_are_not_terminals() {
        let file = tempfile::tempfile().unwrap();
        assert_eq!(EofPolicy::for_source(&file), EofPolicy::Final);
    }
}
