//! Splits a filtered chunk into lines.
//!
//! Each chunk is framed on its own: a line cut by a chunk boundary comes out
//! as two fragments, one per chunk.

use std::iter::FusedIterator;

fn is_delimiter(byte: u8) -> bool {
    byte == b'\r' || byte == b'\n'
}

/// Lines of one chunk, split on CR or LF, empty fragments skipped
///
/// Cloning the iterator restarts the sequence from the clone's position.
#[derive(Debug, Clone)]
pub struct Lines<'a> {
    rest: &'a [u8],
}

/// Frame a chunk into lines
pub fn frame(chunk: &[u8]) -> Lines<'_> {
    Lines { rest: chunk }
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        while !self.rest.is_empty() {
            let (line, rest) = match self.rest.iter().position(|b| is_delimiter(*b)) {
                Some(end) => (&self.rest[..end], &self.rest[end + 1..]),
                None => (self.rest, &self.rest[self.rest.len()..]),
            };
            self.rest = rest;
            if !line.is_empty() {
                return Some(line);
            }
        }
        None
    }
}

impl FusedIterator for Lines<'_> {}
