//! In-process model of a UART driver.
//!
//! Received bytes land in a fixed ring buffer and each write is announced
//! through a bounded event queue, the way an interrupt-driven driver reports
//! them. Writing past the ring raises [`SerialEvent::BufferFull`]; events
//! that do not fit the queue are lost.

use super::{SerialEvent, SerialSource};
use esptail_core::limits::READ_BUFFER_SIZE;
use heapless::Deque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::trace;

/// Capacity of the driver ring buffer
pub const UART_RING_SIZE: usize = 2 * READ_BUFFER_SIZE;

/// Capacity of the driver event queue
pub const UART_EVENT_QUEUE_LEN: usize = 10;

type Ring = Deque<u8, UART_RING_SIZE>;

fn lock(ring: &Mutex<Ring>) -> MutexGuard<'_, Ring> {
    ring.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Create a connected writer/driver pair
pub fn simulated_uart() -> (UartWriter, SimulatedUart) {
    let ring = Arc::new(Mutex::new(Deque::new()));
    let (tx, rx) = mpsc::channel(UART_EVENT_QUEUE_LEN);
    (
        UartWriter {
            ring: ring.clone(),
            events: tx,
        },
        SimulatedUart { ring, events: rx },
    )
}

/// Line side of the simulated UART
#[derive(Debug, Clone)]
pub struct UartWriter {
    ring: Arc<Mutex<Ring>>,
    events: mpsc::Sender<SerialEvent>,
}

impl UartWriter {
    /// Receive bytes from the line, returning how many fit the ring
    pub fn write(&self, bytes: &[u8]) -> usize {
        let accepted = {
            let mut ring = lock(&self.ring);
            bytes
                .iter()
                .take_while(|&&b| ring.push_back(b).is_ok())
                .count()
        };

        // one announcement per read the driver side can serve
        let mut unannounced = accepted;
        while unannounced > 0 {
            let len = unannounced.min(READ_BUFFER_SIZE);
            self.signal(SerialEvent::Data { len });
            unannounced -= len;
        }
        if accepted < bytes.len() {
            self.signal(SerialEvent::BufferFull);
        }
        accepted
    }

    /// Raise a driver event, returning false if the event queue was full
    pub fn signal(&self, event: SerialEvent) -> bool {
        let sent = self.events.try_send(event).is_ok();
        if !sent {
            trace!(?event, "UART event queue full, event lost");
        }
        sent
    }
}

/// Driver side of the simulated UART
#[derive(Debug)]
pub struct SimulatedUart {
    ring: Arc<Mutex<Ring>>,
    events: mpsc::Receiver<SerialEvent>,
}

impl SimulatedUart {
    /// Bytes waiting in the ring
    pub fn buffered(&self) -> usize {
        lock(&self.ring).len()
    }
}

impl SerialSource for SimulatedUart {
    async fn next_event(&mut self) -> Option<SerialEvent> {
        if let Some(event) = self.events.recv().await {
            return Some(event);
        }
        // line closed: hand out what the ring still holds before closing
        let pending = self.buffered().min(READ_BUFFER_SIZE);
        (pending > 0).then_some(SerialEvent::Data { len: pending })
    }

    fn read(&mut self, len: usize, buf: &mut [u8]) -> usize {
        let mut ring = lock(&self.ring);
        let want = len.min(buf.len());
        let mut copied = 0;
        while copied < want {
            match ring.pop_front() {
                Some(b) => {
                    buf[copied] = b;
                    copied += 1;
                }
                None => break,
            }
        }
        copied
    }

    fn flush_input(&mut self) {
        lock(&self.ring).clear();
    }

    fn reset_events(&mut self) {
        while self.events.try_recv().is_ok() {}
    }
}
