//! Event-driven byte sources feeding the ingestion task.

pub mod reader;
pub mod uart;

use std::future::Future;

/// Event reported by a serial driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialEvent {
    /// `len` bytes are waiting in the driver's receive buffer
    Data { len: usize },
    /// Hardware RX FIFO overflowed
    FifoOverflow,
    /// Driver ring buffer filled up
    BufferFull,
    /// RX break condition
    Break,
    ParityError,
    FrameError,
    /// Any event kind the ingestion task does not handle
    Unknown(u32),
}

/// A serial console as seen by the ingestion task
pub trait SerialSource: Send {
    /// Wait for the next driver event
    ///
    /// Returns `None` once the source can produce no more events.
    fn next_event(&mut self) -> impl Future<Output = Option<SerialEvent>> + Send;

    /// Copy up to `len` buffered bytes into `buf`, returning the count copied
    fn read(&mut self, len: usize, buf: &mut [u8]) -> usize;

    /// Discard every byte buffered in the driver
    fn flush_input(&mut self);

    /// Discard every pending event
    fn reset_events(&mut self);
}
