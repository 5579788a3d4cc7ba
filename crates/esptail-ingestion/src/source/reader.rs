use super::{SerialEvent, SerialSource};
use esptail_core::limits::READ_BUFFER_SIZE;
use esptail_core::IngestionError;
use std::io::ErrorKind;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{error, info};

/// Serial source backed by any async reader
///
/// Used for console devices opened as files (`/dev/ttyUSB0`, with the line
/// discipline configured beforehand) and for stdin. Every successful read
/// becomes a [`SerialEvent::Data`]; end of input closes the source.
pub struct ReaderSource<R> {
    reader: R,
    pending: [u8; READ_BUFFER_SIZE],
    start: usize,
    end: usize,
}

impl<R> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pending: [0; READ_BUFFER_SIZE],
            start: 0,
            end: 0,
        }
    }

    fn unread(&self) -> usize {
        self.end - self.start
    }
}

impl ReaderSource<tokio::fs::File> {
    /// Open a console device or capture file
    pub async fn open(path: &Path) -> Result<Self, IngestionError> {
        let file = tokio::fs::File::open(path).await.map_err(|e| {
            IngestionError::Serial(format!("Failed to open {}: {}", path.display(), e))
        })?;
        info!(device = %path.display(), "Opened serial device");
        Ok(Self::new(file))
    }
}

impl ReaderSource<tokio::io::Stdin> {
    pub fn stdin() -> Self {
        Self::new(tokio::io::stdin())
    }
}

impl<R> SerialSource for ReaderSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn next_event(&mut self) -> Option<SerialEvent> {
        if self.unread() > 0 {
            return Some(SerialEvent::Data { len: self.unread() });
        }

        loop {
            match self.reader.read(&mut self.pending).await {
                Ok(0) => {
                    info!("Serial input reached end of stream");
                    return None;
                }
                Ok(n) => {
                    self.start = 0;
                    self.end = n;
                    return Some(SerialEvent::Data { len: n });
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!(error = %e, "Serial read failed");
                    return None;
                }
            }
        }
    }

    fn read(&mut self, len: usize, buf: &mut [u8]) -> usize {
        let n = len.min(self.unread()).min(buf.len());
        buf[..n].copy_from_slice(&self.pending[self.start..self.start + n]);
        self.start += n;
        n
    }

    fn flush_input(&mut self) {
        self.start = 0;
        self.end = 0;
    }

    fn reset_events(&mut self) {}
}
