use crate::limits::{MAX_LABELS, MAX_LABEL_KEY_LEN, MAX_LABEL_VALUE_LEN, MAX_LINE_LEN};
use chrono::{DateTime, Utc};
use heapless::{String as HeaplessString, Vec as HeaplessVec};
use thiserror::Error;

/// Fixed-capacity storage for one captured line
pub type LogLine = HeaplessString<MAX_LINE_LEN>;

/// Severity tag printed by the firmware logger (`E (1234) tag: msg`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Verbose,
    Debug,
    Info,
    Warning,
    Error,
}

impl Level {
    /// Map the single-letter firmware tag to a level
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'V' => Some(Level::Verbose),
            b'D' => Some(Level::Debug),
            b'I' => Some(Level::Info),
            b'W' => Some(Level::Warning),
            b'E' => Some(Level::Error),
            _ => None,
        }
    }

    /// Label value used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Verbose => "verbose",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a label cannot be attached to an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LabelError {
    #[error("label key exceeds {} bytes", MAX_LABEL_KEY_LEN)]
    KeyTooLong,

    #[error("label value exceeds {} bytes", MAX_LABEL_VALUE_LEN)]
    ValueTooLong,

    #[error("entry already carries {} labels", MAX_LABELS)]
    Full,
}

/// A single `key -> value` stream label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    key: HeaplessString<MAX_LABEL_KEY_LEN>,
    value: HeaplessString<MAX_LABEL_VALUE_LEN>,
}

impl Label {
    pub fn new(key: &str, value: &str) -> Result<Self, LabelError> {
        let mut k = HeaplessString::new();
        k.push_str(key).map_err(|_| LabelError::KeyTooLong)?;
        let mut v = HeaplessString::new();
        v.push_str(value).map_err(|_| LabelError::ValueTooLong)?;
        Ok(Self { key: k, value: v })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Ordered set of labels with unique keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels {
    pairs: HeaplessVec<Label, MAX_LABELS>,
}

impl Labels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a label, replacing the value of an existing key in place
    pub fn insert(&mut self, key: &str, value: &str) -> Result<(), LabelError> {
        let label = Label::new(key, value)?;
        if let Some(existing) = self.pairs.iter_mut().find(|l| l.key() == key) {
            *existing = label;
            return Ok(());
        }
        self.pairs.push(label).map_err(|_| LabelError::Full)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|l| l.key() == key)
            .map(|l| l.value())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Label> {
        self.pairs.iter()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<'a> IntoIterator for &'a Labels {
    type Item = &'a Label;
    type IntoIter = std::slice::Iter<'a, Label>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One captured, labeled, timestamped console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Wall-clock time the line was captured
    pub received_at: DateTime<Utc>,

    /// Labels attached by the processing modules
    pub labels: Labels,

    line: LogLine,
    truncated: bool,
}

impl LogEntry {
    /// Create an entry from text, cutting it at `MAX_LINE_LEN` bytes
    pub fn new(received_at: DateTime<Utc>, line: &str) -> Self {
        let mut entry = Self::empty(received_at);
        entry.truncated = !push_bounded(&mut entry.line, line);
        entry
    }

    /// Create an entry from raw console bytes
    ///
    /// Invalid UTF-8 sequences are replaced with U+FFFD.
    pub fn from_bytes(received_at: DateTime<Utc>, bytes: &[u8]) -> Self {
        let mut entry = Self::empty(received_at);
        for chunk in bytes.utf8_chunks() {
            let fits = push_bounded(&mut entry.line, chunk.valid())
                && (chunk.invalid().is_empty() || entry.line.push('\u{FFFD}').is_ok());
            if !fits {
                entry.truncated = true;
                break;
            }
        }
        entry
    }

    fn empty(received_at: DateTime<Utc>) -> Self {
        Self {
            received_at,
            labels: Labels::new(),
            line: LogLine::new(),
            truncated: false,
        }
    }

    pub fn line(&self) -> &str {
        &self.line
    }

    /// Whether the captured line was cut to fit `MAX_LINE_LEN`
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

// Copies whole characters until the buffer is full. Line delimiters are skipped.
fn push_bounded(out: &mut LogLine, text: &str) -> bool {
    for c in text.chars().filter(|c| !matches!(c, '\r' | '\n')) {
        if out.push(c).is_err() {
            return false;
        }
    }
    true
}
