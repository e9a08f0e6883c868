use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// Unbounded byte queue whose readers block until data arrives.
///
/// Clones share the same queue. Writers never block; a reader waits on the
/// condition variable until at least one byte is queued (or the buffer is
/// closed) and then takes whatever is available.
#[derive(Clone, Default)]
pub struct BlockingBuffer {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    ready: Condvar,
}

#[derive(Default)]
struct State {
    queue: VecDeque<u8>,
    closed: bool,
}

impl BlockingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append bytes and wake the reader.
    pub fn push(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let mut state = self.lock();
        state.queue.extend(data);
        drop(state);
        self.inner.ready.notify_one();
    }

    /// Mark end of input. Queued bytes stay readable; once they are drained
    /// reads return 0 instead of blocking.
    pub fn close(&self) {
        self.lock().closed = true;
        self.inner.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Block until data is available, then copy as much as fits into `buf`.
    pub fn read_blocking(&self, buf: &mut [u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }
        let mut state = self.lock();
        while state.queue.is_empty() && !state.closed {
            state = self
                .inner
                .ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        let n = buf.len().min(state.queue.len());
        for (slot, byte) in buf.iter_mut().zip(state.queue.drain(..n)) {
            *slot = byte;
        }
        n
    }

    /// Take everything currently queued without waiting.
    pub fn take_available(&self) -> Vec<u8> {
        self.lock().queue.drain(..).collect()
    }
}

impl Read for BlockingBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_blocking(buf))
    }
}

impl Write for BlockingBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.push(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
