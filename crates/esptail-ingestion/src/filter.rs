//! Terminal escape-sequence removal.
//!
//! The filter recognizes CSI (`ESC [ ... final`), OSC (`ESC ] ... BEL|ST`)
//! and short escapes (`ESC` up to the first alphabetic byte). Its state lives
//! for a single [`filter`] call: a sequence split across two capture chunks
//! is not recognized, and the tail of it leaks into the second chunk.

use heapless::Vec as HeaplessVec;

const ESC: u8 = 0x1b;
const BEL: u8 = 0x07;

/// Position of the filter relative to an escape sequence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilterState {
    #[default]
    Normal,
    /// Saw ESC, sequence type not known yet
    Escape,
    /// Inside `ESC [`
    Csi,
    /// Inside `ESC ]`
    Osc,
    /// Saw ESC inside an OSC string
    OscEscape,
}

/// Advance the filter by one byte
///
/// Returns the next state and the byte to emit, if any.
pub fn step(state: FilterState, byte: u8) -> (FilterState, Option<u8>) {
    use FilterState::*;

    match (state, byte) {
        (Normal, ESC) => (Escape, None),
        (Normal, b) => (Normal, Some(b)),
        (Escape, b'[') => (Csi, None),
        (Escape, b']') => (Osc, None),
        (Escape, b) if b.is_ascii_alphabetic() => (Normal, None),
        (Escape, _) => (Escape, None),
        (Csi, 0x40..=0x7e) => (Normal, None),
        (Csi, _) => (Csi, None),
        (Osc, BEL) => (Normal, None),
        (Osc, ESC) => (OscEscape, None),
        (Osc, _) => (Osc, None),
        (OscEscape, b'\\') => (Normal, None),
        (OscEscape, b) => step(Escape, b),
    }
}

/// Outcome of filtering one chunk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterReport {
    /// Bytes written to the output buffer
    pub written: usize,
    /// Output capacity was reached and the rest of the input was skipped
    pub truncated: bool,
    /// Input ended inside an escape sequence
    pub unterminated: bool,
}

/// Strip escape sequences from `input` into `out`
///
/// `out` is cleared first. Copying stops once `out` is full.
pub fn filter<const N: usize>(input: &[u8], out: &mut HeaplessVec<u8, N>) -> FilterReport {
    out.clear();
    let mut state = FilterState::Normal;
    let mut report = FilterReport::default();

    for &byte in input {
        let (next, emitted) = step(state, byte);
        state = next;
        if let Some(b) = emitted {
            if out.push(b).is_err() {
                report.truncated = true;
                break;
            }
        }
    }

    report.written = out.len();
    report.unterminated = !report.truncated && state != FilterState::Normal;
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run<const N: usize>(input: &[u8]) -> (HeaplessVec<u8, N>, FilterReport) {
        let mut out = HeaplessVec::new();
        let report = filter(input, &mut out);
        (out, report)
    }

    #[test]
    fn test_escape_free_input_is_unchanged() {
        let input: Vec<u8> = (0u8..=255).filter(|b| *b != ESC).collect();
        let (out, report) = run::<512>(&input);
        assert_eq!(&out[..], &input[..]);
        assert_eq!(report.written, input.len());
        assert!(!report.truncated);
        assert!(!report.unterminated);
    }

    #[test]
    fn test_removes_color_csi() {
        let (out, _) = run::<64>(b"\x1b[0;32mI (100) ok\x1b[0m\r\n");
        assert_eq!(&out[..], b"I (100) ok\r\n");
    }

    #[test]
    fn test_removes_cursor_csi() {
        let (out, _) = run::<64>(b"a\x1b[2Kb\x1b[10;20Hc");
        assert_eq!(&out[..], b"abc");
    }

    #[test]
    fn test_removes_osc_with_bel() {
        let (out, _) = run::<64>(b"\x1b]0;window title\x07text");
        assert_eq!(&out[..], b"text");
    }

    #[test]
    fn test_removes_osc_with_st() {
        let (out, _) = run::<64>(b"\x1b]0;title\x1b\\text");
        assert_eq!(&out[..], b"text");
    }

    #[test]
    fn test_removes_short_escape() {
        // charset designation ends at the first alphabetic byte
        let (out, _) = run::<64>(b"\x1b(Bhi");
        assert_eq!(&out[..], b"hi");
    }

    #[test]
    fn test_truncates_at_capacity() {
        let (out, report) = run::<4>(b"abcdefgh");
        assert_eq!(&out[..], b"abcd");
        assert_eq!(report.written, 4);
        assert!(report.truncated);
    }

    #[test]
    fn test_escape_bytes_do_not_count_against_capacity() {
        let (out, report) = run::<4>(b"\x1b[0;31mabcd\x1b[0m");
        assert_eq!(&out[..], b"abcd");
        assert!(!report.truncated);
    }

    #[test]
    fn test_sequence_split_across_chunks_leaks() {
        let (first, report) = run::<64>(b"ok\x1b[0");
        assert_eq!(&first[..], b"ok");
        assert!(report.unterminated);

        // the second chunk starts in Normal state, so the tail is kept
        let (second, report) = run::<64>(b";32mnext");
        assert_eq!(&second[..], b";32mnext");
        assert!(!report.unterminated);
    }

    #[test]
    fn test_output_is_cleared_between_calls() {
        let mut out: HeaplessVec<u8, 16> = HeaplessVec::new();
        filter(b"first", &mut out);
        filter(b"2nd", &mut out);
        assert_eq!(&out[..], b"2nd");
    }

    #[test]
    fn test_step_transitions() {
        use FilterState::*;

        assert_eq!(step(Normal, b'a'), (Normal, Some(b'a')));
        assert_eq!(step(Normal, ESC), (Escape, None));
        assert_eq!(step(Escape, b'['), (Csi, None));
        assert_eq!(step(Escape, b']'), (Osc, None));
        assert_eq!(step(Escape, b'('), (Escape, None));
        assert_eq!(step(Escape, b'M'), (Normal, None));
        assert_eq!(step(Csi, b'3'), (Csi, None));
        assert_eq!(step(Csi, b'm'), (Normal, None));
        assert_eq!(step(Csi, b'@'), (Normal, None));
        assert_eq!(step(Osc, b'x'), (Osc, None));
        assert_eq!(step(Osc, BEL), (Normal, None));
        assert_eq!(step(Osc, ESC), (OscEscape, None));
        assert_eq!(step(OscEscape, b'\\'), (Normal, None));
        assert_eq!(step(OscEscape, b'['), (Csi, None));
    }
}
