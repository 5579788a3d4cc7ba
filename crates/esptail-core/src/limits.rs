//! Compile-time limits for every fixed-size buffer in the pipeline.

/// Maximum length of a captured line, in bytes.
pub const MAX_LINE_LEN: usize = 512;

/// Maximum number of labels attached to a single entry.
pub const MAX_LABELS: usize = 4;

/// Maximum length of a label key, in bytes.
pub const MAX_LABEL_KEY_LEN: usize = 32;

/// Maximum length of a label value, in bytes.
pub const MAX_LABEL_VALUE_LEN: usize = 64;

/// Number of static labels every stream carries (emitter, job).
pub const STATIC_LABELS: usize = 2;

/// Upper bound on labels in one pushed stream.
pub const MAX_STREAM_LABELS: usize = STATIC_LABELS + MAX_LABELS;

/// Size of one raw read from the serial source.
pub const READ_BUFFER_SIZE: usize = 1024;

/// Default capacity of the entry queue between ingestion and shipping.
pub const DEFAULT_QUEUE_CAPACITY: usize = 15;

/// Default bounded wait of a queue pop, in milliseconds.
pub const DEFAULT_POP_WAIT_MS: u64 = 100;

// {"streams":[{"stream":{...},"values":[["<20 digits>",""]]}]} plus slack.
const PAYLOAD_OVERHEAD: usize = 128;

// "key":"value", with room for escaped quotes and backslashes.
const LABEL_SLOT: usize = 2 * (MAX_LABEL_KEY_LEN + MAX_LABEL_VALUE_LEN) + 6;

/// Size of the scratch buffer a push payload is serialized into.
pub const PAYLOAD_CAPACITY: usize =
    PAYLOAD_OVERHEAD + MAX_STREAM_LABELS * LABEL_SLOT + 2 * MAX_LINE_LEN;
