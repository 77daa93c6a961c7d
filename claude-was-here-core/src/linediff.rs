use similar::{Algorithm, DiffOp, TextDiff};

use crate::ranges::{LineRange, RangeSet};

/// One hunk of a line-level diff, in unified-diff coordinates: 1-based
/// starts, inclusive lengths. A pure insertion has `old_len == 0` and
/// `old_start` naming the pre-image line the insertion follows (0 when
/// inserting at the top); a pure deletion mirrors that on the new side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiffHunk {
    pub old_start: u32,
    pub old_len: u32,
    pub new_start: u32,
    pub new_len: u32,
}

fn op_to_hunk(op: &DiffOp) -> Option<DiffHunk> {
    match *op {
        DiffOp::Equal { .. } => None,
        DiffOp::Delete {
            old_index,
            old_len,
            new_index,
        } => Some(DiffHunk {
            old_start: old_index as u32 + 1,
            old_len: old_len as u32,
            new_start: new_index as u32,
            new_len: 0,
        }),
        DiffOp::Insert {
            old_index,
            new_index,
            new_len,
        } => Some(DiffHunk {
            old_start: old_index as u32,
            old_len: 0,
            new_start: new_index as u32 + 1,
            new_len: new_len as u32,
        }),
        DiffOp::Replace {
            old_index,
            old_len,
            new_index,
            new_len,
        } => Some(DiffHunk {
            old_start: old_index as u32 + 1,
            old_len: old_len as u32,
            new_start: new_index as u32 + 1,
            new_len: new_len as u32,
        }),
    }
}

/// Line-level diff of two in-memory buffers as zero-context hunks, ordered
/// by pre-image position.
pub fn diff_hunks(old: &str, new: &str) -> Vec<DiffHunk> {
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_lines(old, new);

    diff.ops().iter().filter_map(op_to_hunk).collect()
}

/// Post-image lines introduced or modified by the transformation `old` →
/// `new`: every new-side line of an insert or replace hunk.
pub fn touched_lines(old: &str, new: &str) -> RangeSet {
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_lines(old, new);

    let mut out = Vec::new();
    for op in diff.ops() {
        let (new_index, new_len) = match *op {
            DiffOp::Insert {
                new_index, new_len, ..
            }
            | DiffOp::Replace {
                new_index, new_len, ..
            } => (new_index, new_len),
            _ => continue,
        };
        if new_len > 0 {
            out.push(LineRange {
                start: new_index as u32 + 1,
                end: (new_index + new_len) as u32,
            });
        }
    }
    out
}

/// Number of lines in a buffer; a trailing newline does not open a new line.
pub fn line_count(text: &str) -> u32 {
    text.split_inclusive('\n').count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rs(pairs: &[(u32, u32)]) -> RangeSet {
        pairs
            .iter()
            .map(|&(start, end)| LineRange { start, end })
            .collect()
    }

    #[test]
    fn append_produces_a_single_insert_hunk() {
        let hunks = diff_hunks("a\nb\n", "a\nb\nc\nd\n");
        assert_eq!(
            hunks,
            vec![DiffHunk {
                old_start: 2,
                old_len: 0,
                new_start: 3,
                new_len: 2,
            }]
        );
        assert_eq!(touched_lines("a\nb\n", "a\nb\nc\nd\n"), rs(&[(3, 4)]));
    }

    #[test]
    fn deletion_in_the_middle() {
        let old = "1\n2\n3\n4\n5\n";
        let new = "1\n2\n5\n";
        assert_eq!(
            diff_hunks(old, new),
            vec![DiffHunk {
                old_start: 3,
                old_len: 2,
                new_start: 2,
                new_len: 0,
            }]
        );
        assert_eq!(touched_lines(old, new), rs(&[]));
    }

    #[test]
    fn replacement_touches_only_the_new_span() {
        let old = "a\nb\nc\n";
        let new = "a\nX\nY\nc\n";
        assert_eq!(touched_lines(old, new), rs(&[(2, 3)]));
    }

    #[test]
    fn creation_from_empty_touches_every_line() {
        let hunks = diff_hunks("", "x\ny\nz\n");
        assert_eq!(
            hunks,
            vec![DiffHunk {
                old_start: 0,
                old_len: 0,
                new_start: 1,
                new_len: 3,
            }]
        );
        assert_eq!(touched_lines("", "x\ny\nz\n"), rs(&[(1, 3)]));
    }

    #[test]
    fn identical_buffers_produce_nothing() {
        assert!(diff_hunks("same\n", "same\n").is_empty());
        assert!(touched_lines("same\n", "same\n").is_empty());
    }

    #[test]
    fn line_count_ignores_trailing_newline() {
        assert_eq!(line_count(""), 0);
        assert_eq!(line_count("one"), 1);
        assert_eq!(line_count("one\n"), 1);
        assert_eq!(line_count("one\ntwo"), 2);
    }
}
