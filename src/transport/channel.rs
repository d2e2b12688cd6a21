//! Blocking in-process byte queue shared by the loopback and sound modem transports.

use super::lock;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct QueueState {
    buf: VecDeque<u8>,
    closed: bool,
}

#[derive(Debug, Default)]
pub(crate) struct ByteQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
}

impl ByteQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append bytes and wake one reader. Returns false once the queue is closed.
    pub(crate) fn push(&self, data: &[u8]) -> bool {
        let mut state = lock(&self.state);
        if state.closed {
            return false;
        }
        state.buf.extend(data);
        self.ready.notify_all();
        true
    }

    /// Block until bytes are queued or the queue closes. Bytes queued before the
    /// close are still handed out; 0 means closed and empty.
    pub(crate) fn pop_blocking(&self, out: &mut [u8]) -> usize {
        let mut state = lock(&self.state);
        loop {
            if !state.buf.is_empty() {
                return Self::drain_into(&mut state, out);
            }
            if state.closed {
                return 0;
            }
            state = self
                .ready
                .wait(state)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }

    /// Like [`pop_blocking`](Self::pop_blocking) but gives up after `timeout`.
    pub(crate) fn pop_timeout(&self, out: &mut [u8], timeout: Duration) -> usize {
        let state = lock(&self.state);
        let (mut state, _) = self
            .ready
            .wait_timeout_while(state, timeout, |s| !s.closed && s.buf.is_empty())
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Self::drain_into(&mut state, out)
    }

    /// Take everything queued without blocking.
    pub(crate) fn drain(&self) -> Vec<u8> {
        lock(&self.state).buf.drain(..).collect()
    }

    pub(crate) fn close(&self) -> bool {
        let mut state = lock(&self.state);
        let was_open = !state.closed;
        state.closed = true;
        self.ready.notify_all();
        was_open
    }

    pub(crate) fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    fn drain_into(state: &mut QueueState, out: &mut [u8]) -> usize {
        let n = state.buf.len().min(out.len());
        for (slot, b) in out.iter_mut().zip(state.buf.drain(..n)) {
            *slot = b;
        }
        n
    }
}
