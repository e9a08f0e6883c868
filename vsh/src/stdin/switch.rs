use std::fmt;
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::buffer::BlockingBuffer;
use super::EofPolicy;

/// A writable destination for raw input bytes.
pub type Sink = Box<dyn Write + Send>;

/// Who currently receives raw input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdinRoute {
    /// No foreground process; bytes queue up in the default buffer.
    Buffered,
    /// Bytes go to the input pipe of the child with this id.
    Piped(u32),
}

impl fmt::Display for StdinRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffered => write!(f, "buffered"),
            Self::Piped(id) => write!(f, "piped({id})"),
        }
    }
}

struct Slot {
    route: StdinRoute,
    sink: Sink,
    input_closed: bool,
}

/// Single-slot router for the shell's one input stream.
///
/// Every [`write`](Self::write) goes, whole, to whichever sink is current
/// when the call takes the lock. [`switch`](Self::switch) replaces the sink
/// and hands back the previous one; nothing is drained or moved between them.
pub struct SwitchableWriter {
    default: BlockingBuffer,
    slot: Mutex<Slot>,
}

impl SwitchableWriter {
    pub fn new(default: BlockingBuffer) -> Self {
        let sink: Sink = Box::new(default.clone());
        Self {
            default,
            slot: Mutex::new(Slot {
                route: StdinRoute::Buffered,
                sink,
                input_closed: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The buffer that receives input while no process is attached.
    pub fn default_buffer(&self) -> &BlockingBuffer {
        &self.default
    }

    pub fn route(&self) -> StdinRoute {
        self.lock().route
    }

    /// Route subsequent input to `sink`, returning the sink it replaces.
    ///
    /// If the real input already hit EOF the new sink is dropped right away
    /// so its reader sees end of input instead of waiting forever.
    pub fn switch(&self, route: StdinRoute, sink: Sink) -> Sink {
        let mut slot = self.lock();
        let sink: Sink = if slot.input_closed {
            drop(sink);
            Box::new(io::sink())
        } else {
            sink
        };
        tracing::trace!(from = %slot.route, to = %route, "Switching stdin route");
        slot.route = route;
        std::mem::replace(&mut slot.sink, sink)
    }

    /// Route input back to the default buffer.
    pub fn restore(&self) -> Sink {
        self.switch(StdinRoute::Buffered, Box::new(self.default.clone()))
    }

    /// Forward `data` to the current sink in one piece.
    pub fn write(&self, data: &[u8]) -> io::Result<()> {
        let mut slot = self.lock();
        slot.sink.write_all(data)?;
        slot.sink.flush()
    }

    /// A zero-byte read from the input source. Returns `true` when the
    /// source is done and [`close_input`](Self::close_input) should follow.
    ///
    /// Under [`EofPolicy::PerCommand`] an attached child loses its pipe and
    /// the route stays put until [`restore`](Self::restore).
    pub fn end_of_input(&self, policy: EofPolicy) -> bool {
        let mut slot = self.lock();
        match (policy, slot.route) {
            (EofPolicy::PerCommand, StdinRoute::Piped(id)) => {
                tracing::debug!(child = id, "End of input for foreground child");
                slot.sink = Box::new(io::sink());
                false
            }
            _ => true,
        }
    }

    /// The real input source reached EOF.
    ///
    /// Closes the default buffer and any attached child pipe; later switches
    /// receive an already-closed sink.
    pub fn close_input(&self) {
        let mut slot = self.lock();
        slot.input_closed = true;
        if slot.route != StdinRoute::Buffered {
            slot.sink = Box::new(io::sink());
        }
        drop(slot);
        self.default.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        fn bytes(&self) -> Vec<u8> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn starts_routed_to_default_buffer() {
        let buffer = BlockingBuffer::new();
        let writer = SwitchableWriter::new(buffer.clone());

        writer.write(b"typed early").unwrap();

        assert_eq!(writer.route(), StdinRoute::Buffered);
        assert_eq!(buffer.take_available(), b"typed early");
    }

    #[test]
    fn switch_partitions_the_stream_between_sinks() {
        let buffer = BlockingBuffer::new();
        let writer = SwitchableWriter::new(buffer.clone());
        let child = Capture::default();

        for i in 0..10u8 {
            if i == 4 {
                writer.switch(StdinRoute::Piped(7), Box::new(child.clone()));
            }
            writer.write(&[i]).unwrap();
        }

        assert_eq!(buffer.take_available(), vec![0, 1, 2, 3]);
        assert_eq!(child.bytes(), vec![4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn restore_stops_feeding_the_old_sink() {
        let buffer = BlockingBuffer::new();
        let writer = SwitchableWriter::new(buffer.clone());
        let child = Capture::default();

        writer.switch(StdinRoute::Piped(1), Box::new(child.clone()));
        writer.write(b"for child").unwrap();
        writer.restore();
        writer.write(b"for prompt").unwrap();

        assert_eq!(writer.route(), StdinRoute::Buffered);
        assert_eq!(child.bytes(), b"for child");
        assert_eq!(buffer.take_available(), b"for prompt");
    }

    #[test]
    fn concurrent_writes_are_never_split_or_duplicated() {
        let buffer = BlockingBuffer::new();
        let writer = Arc::new(SwitchableWriter::new(buffer.clone()));
        let child = Capture::default();

        let producer = {
            let writer = writer.clone();
            std::thread::spawn(move || {
                for i in 0..200u32 {
                    writer.write(&i.to_le_bytes()).unwrap();
                }
            })
        };
        for _ in 0..50 {
            writer.switch(StdinRoute::Piped(2), Box::new(child.clone()));
            writer.restore();
        }
        writer.switch(StdinRoute::Piped(2), Box::new(child.clone()));
        producer.join().unwrap();

        let mut seen: Vec<u32> = buffer
            .take_available()
            .chunks(4)
            .chain(child.bytes().chunks(4))
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..200).collect::<Vec<_>>());
    }

    #[test]
    fn per_command_eof_keeps_the_default_buffer_open() {
        let buffer = BlockingBuffer::new();
        let writer = SwitchableWriter::new(buffer.clone());
        let child = Capture::default();

        writer.switch(StdinRoute::Piped(4), Box::new(child.clone()));
        assert!(!writer.end_of_input(EofPolicy::PerCommand));
        writer.write(b"after ctrl-d").unwrap();
        assert_eq!(writer.route(), StdinRoute::Piped(4));

        writer.restore();
        writer.write(b"next line").unwrap();

        assert!(child.bytes().is_empty());
        assert!(!buffer.is_closed());
        assert_eq!(buffer.take_available(), b"next line");
        assert!(writer.end_of_input(EofPolicy::PerCommand));
        assert!(writer.end_of_input(EofPolicy::Final));
    }

    #[test]
    fn close_input_closes_later_sinks() {
        let buffer = BlockingBuffer::new();
        let writer = SwitchableWriter::new(buffer.clone());
        writer.close_input();

        let child = Capture::default();
        writer.switch(StdinRoute::Piped(3), Box::new(child.clone()));
        writer.write(b"ignored").unwrap();

        assert!(buffer.is_closed());
        assert!(child.bytes().is_empty());
    }
}
