//! Loki push payload, serialized into a fixed scratch buffer.
//!
//! Wire format (one stream, one value per request):
//!
//! ```text
//! {"streams":[{"stream":{"emitter":"..","job":"..","level":".."},
//!   "values":[["<unix epoch in nanoseconds>","<log line>"]]}]}
//! ```

use esptail_core::limits::{MAX_STREAM_LABELS, PAYLOAD_CAPACITY};
use esptail_core::{LogEntry, LokiConfig, OutputError};
use heapless::{String as HeaplessString, Vec as HeaplessVec};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fmt::Write as _;
use std::io;

#[derive(Serialize)]
struct PushRequest<'a> {
    streams: [Stream<'a>; 1],
}

#[derive(Serialize)]
struct Stream<'a> {
    stream: StreamLabels<'a>,
    values: [[&'a str; 2]; 1],
}

impl<'a> PushRequest<'a> {
    fn new(labels: &'a [(&'a str, &'a str)], timestamp: &'a str, line: &'a str) -> Self {
        Self {
            streams: [Stream {
                stream: StreamLabels(labels),
                values: [[timestamp, line]],
            }],
        }
    }
}

struct StreamLabels<'a>(&'a [(&'a str, &'a str)]);

impl Serialize for StreamLabels<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

type StreamLabelSet<'a> = HeaplessVec<(&'a str, &'a str), MAX_STREAM_LABELS>;

// i64 nanoseconds never exceed 19 digits
type Timestamp = HeaplessString<20>;

fn too_many_labels<T>(_: T) -> OutputError {
    OutputError::Serialization(format!("more than {} stream labels", MAX_STREAM_LABELS))
}

/// Static labels first, then the entry's own; an entry label replaces a
/// static label with the same key.
fn merge_labels<'a>(
    config: &'a LokiConfig,
    entry: &'a LogEntry,
) -> Result<StreamLabelSet<'a>, OutputError> {
    let mut labels = StreamLabelSet::new();
    labels
        .push(("emitter", config.emitter.as_str()))
        .map_err(too_many_labels)?;
    labels
        .push(("job", config.job.as_str()))
        .map_err(too_many_labels)?;

    for label in &entry.labels {
        match labels.iter_mut().find(|(key, _)| *key == label.key()) {
            Some(slot) => slot.1 = label.value(),
            None => labels
                .push((label.key(), label.value()))
                .map_err(too_many_labels)?,
        }
    }
    Ok(labels)
}

fn unix_nanos(entry: &LogEntry) -> Timestamp {
    let nanos = entry.received_at.timestamp_nanos_opt().unwrap_or(0).max(0);
    let mut timestamp = Timestamp::new();
    let _ = write!(timestamp, "{}", nanos);
    timestamp
}

struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct ScratchWriter<'a, const N: usize>(&'a mut HeaplessVec<u8, N>);

impl<const N: usize> io::Write for ScratchWriter<'_, N> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.extend_from_slice(buf).map_err(|_| {
            io::Error::new(io::ErrorKind::WriteZero, "payload scratch buffer full")
        })?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn serialized_len(request: &PushRequest<'_>) -> Result<usize, OutputError> {
    let mut counter = ByteCounter(0);
    serde_json::to_writer(&mut counter, request)
        .map_err(|e| OutputError::Serialization(e.to_string()))?;
    Ok(counter.0)
}

/// A push request body ready to send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payload<'a> {
    pub body: &'a [u8],
    /// The line was cut, either at capture or to fit the scratch buffer
    pub truncated: bool,
}

/// Serializes entries into a scratch buffer allocated once
pub struct PayloadBuilder {
    scratch: HeaplessVec<u8, PAYLOAD_CAPACITY>,
}

impl PayloadBuilder {
    pub fn new() -> Self {
        Self {
            scratch: HeaplessVec::new(),
        }
    }

    /// Build the push request for one entry
    ///
    /// The serialized size is measured before anything is written. If it
    /// exceeds `PAYLOAD_CAPACITY`, the line is shortened on a character
    /// boundary until the request fits and the payload is flagged truncated.
    pub fn build(
        &mut self,
        config: &LokiConfig,
        entry: &LogEntry,
    ) -> Result<Payload<'_>, OutputError> {
        let labels = merge_labels(config, entry)?;
        let timestamp = unix_nanos(entry);
        let mut line = entry.line();
        let mut truncated = entry.is_truncated();

        loop {
            let needed = serialized_len(&PushRequest::new(&labels, &timestamp, line))?;
            if needed <= PAYLOAD_CAPACITY {
                break;
            }
            if line.is_empty() {
                return Err(OutputError::PayloadOverflow {
                    needed,
                    capacity: PAYLOAD_CAPACITY,
                });
            }
            // escaping never shrinks a character, so dropping `excess` raw bytes
            // removes at least `excess` serialized bytes
            let mut keep = line.len().saturating_sub(needed - PAYLOAD_CAPACITY);
            while !line.is_char_boundary(keep) {
                keep -= 1;
            }
            line = &line[..keep];
            truncated = true;
        }

        self.scratch.clear();
        serde_json::to_writer(
            ScratchWriter(&mut self.scratch),
            &PushRequest::new(&labels, &timestamp, line),
        )
        .map_err(|e| OutputError::Serialization(e.to_string()))?;

        Ok(Payload {
            body: &self.scratch[..],
            truncated,
        })
    }
}

impl Default for PayloadBuilder {
    fn default() -> Self {
        Self::new()
    }
}
