//! Bounded single-producer single-consumer byte ring.
//!
//! Positions are absolute byte offsets since the start of the stream. The
//! ring retains the last `capacity` bytes written, consumed or not, so the
//! reader may rewind within that window.

use crate::error::{StreamError, StreamResult};
use std::future::poll_fn;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

struct State {
    ring: Box<[u8]>,
    read_pos: u64,
    write_pos: u64,
    complete: bool,
    closed: bool,
    fault: Option<StreamError>,
    reader: Option<Waker>,
    writer: Option<Waker>,
}

impl State {
    fn capacity(&self) -> u64 {
        self.ring.len() as u64
    }

    fn available(&self) -> u64 {
        self.write_pos - self.read_pos
    }

    fn free(&self) -> u64 {
        self.capacity() - self.available()
    }

    fn wake_reader(&mut self) {
        if let Some(waker) = self.reader.take() {
            waker.wake();
        }
    }

    fn wake_writer(&mut self) {
        if let Some(waker) = self.writer.take() {
            waker.wake();
        }
    }
}

fn register(slot: &mut Option<Waker>, cx: &Context<'_>) {
    match slot {
        Some(waker) if waker.will_wake(cx.waker()) => {}
        _ => *slot = Some(cx.waker().clone()),
    }
}

/// Fixed-capacity byte channel between the fetch task and the stream.
///
/// Writes wait while the ring is full, reads wait while it is empty.
/// End-of-stream ([`complete`](Self::complete)) and failure
/// ([`fault`](Self::fault)) are distinct terminal signals.
pub struct BoundedByteBuffer {
    state: Mutex<State>,
}

impl BoundedByteBuffer {
    /// Create a buffer holding up to `capacity` bytes (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State {
                ring: vec![0; capacity.max(1)].into_boxed_slice(),
                read_pos: 0,
                write_pos: 0,
                complete: false,
                closed: false,
                fault: None,
                reader: None,
                writer: None,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.lock().ring.len()
    }

    /// Absolute position of the next byte to be read.
    pub fn position(&self) -> u64 {
        self.lock().read_pos
    }

    /// Total bytes written so far.
    pub fn written(&self) -> u64 {
        self.lock().write_pos
    }

    /// Copy as much of `data` as fits, waiting while the ring is full.
    ///
    /// Fails with [`StreamError::Closed`] once the consumer has closed.
    pub fn poll_write(&self, cx: &mut Context<'_>, data: &[u8]) -> Poll<StreamResult<usize>> {
        let mut state = self.lock();
        if state.closed {
            return Poll::Ready(Err(StreamError::Closed));
        }
        if data.is_empty() {
            return Poll::Ready(Ok(0));
        }

        let free = state.free();
        if free == 0 {
            register(&mut state.writer, cx);
            return Poll::Pending;
        }

        let n = data.len().min(free as usize);
        let capacity = state.ring.len();
        let offset = (state.write_pos % capacity as u64) as usize;
        let first = n.min(capacity - offset);
        state.ring[offset..offset + first].copy_from_slice(&data[..first]);
        state.ring[..n - first].copy_from_slice(&data[first..n]);
        state.write_pos += n as u64;
        state.wake_reader();
        Poll::Ready(Ok(n))
    }

    /// Write all of `data`, waiting for space as needed.
    pub async fn write_all(&self, mut data: &[u8]) -> StreamResult<()> {
        while !data.is_empty() {
            let n = poll_fn(|cx| self.poll_write(cx, data)).await?;
            data = &data[n..];
        }
        Ok(())
    }

    /// Read into `out`, waiting while the ring is empty.
    ///
    /// Returns `Ok(0)` only at end-of-stream (or for an empty `out`). A fault
    /// is returned as soon as it is signalled, even if bytes remain.
    pub fn poll_read(&self, cx: &mut Context<'_>, out: &mut [u8]) -> Poll<StreamResult<usize>> {
        let mut state = self.lock();
        if let Some(fault) = &state.fault {
            return Poll::Ready(Err(fault.clone()));
        }
        if out.is_empty() {
            return Poll::Ready(Ok(0));
        }

        let available = state.available();
        if available == 0 {
            if state.complete {
                return Poll::Ready(Ok(0));
            }
            if state.closed {
                return Poll::Ready(Err(StreamError::Closed));
            }
            register(&mut state.reader, cx);
            return Poll::Pending;
        }

        let n = out.len().min(available as usize);
        let capacity = state.ring.len();
        let offset = (state.read_pos % capacity as u64) as usize;
        let first = n.min(capacity - offset);
        out[..first].copy_from_slice(&state.ring[offset..offset + first]);
        out[first..n].copy_from_slice(&state.ring[..n - first]);
        state.read_pos += n as u64;
        state.wake_writer();
        Poll::Ready(Ok(n))
    }

    pub async fn read(&self, out: &mut [u8]) -> StreamResult<usize> {
        poll_fn(|cx| self.poll_read(cx, out)).await
    }

    /// Move the read position to `position`.
    ///
    /// Valid targets are the bytes still retained: from `capacity` bytes
    /// before the write position up to the write position itself.
    pub fn seek(&self, position: u64) -> StreamResult<u64> {
        let mut state = self.lock();
        let low = state.write_pos.saturating_sub(state.capacity());
        let high = state.write_pos;
        if position < low || position > high {
            return Err(StreamError::InvalidSeek {
                position,
                low,
                high,
            });
        }
        state.read_pos = position;
        state.wake_writer();
        Ok(position)
    }

    /// Signal that no more data will be written.
    pub fn complete(&self) {
        let mut state = self.lock();
        state.complete = true;
        state.wake_reader();
    }

    /// Signal a terminal failure; later reads return `error`.
    pub fn fault(&self, error: StreamError) {
        let mut state = self.lock();
        if state.fault.is_none() {
            state.fault = Some(error);
        }
        state.wake_reader();
        state.wake_writer();
    }

    /// Consumer-side shutdown: pending and later writes fail.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.wake_reader();
        state.wake_writer();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for BoundedByteBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("BoundedByteBuffer")
            .field("capacity", &state.ring.len())
            .field("read_pos", &state.read_pos)
            .field("write_pos", &state.write_pos)
            .field("complete", &state.complete)
            .field("closed", &state.closed)
            .finish_non_exhaustive()
    }
}
