use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::linediff::DiffHunk;

/// Inclusive 1-based line range. Serialized as a two-element array `[s, e]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl LineRange {
    pub fn len(&self) -> u64 {
        u64::from(self.end - self.start) + 1
    }
}

impl Serialize for LineRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.start, self.end).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for LineRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (start, end) = <(u32, u32)>::deserialize(deserializer)?;
        if start < 1 || end < start {
            return Err(serde::de::Error::custom(format!(
                "malformed line range [{start}, {end}]"
            )));
        }
        Ok(LineRange { start, end })
    }
}

/// Sorted, non-overlapping list of inclusive ranges. Functions below that
/// build sets from scratch (`compact`, `union`) also merge adjacent ranges;
/// `remap` preserves the fragment boundaries the diff produced.
pub type RangeSet = Vec<LineRange>;

/// Sort and coalesce overlapping or adjacent ranges into canonical form.
fn normalize(mut ranges: Vec<LineRange>) -> RangeSet {
    ranges.retain(|r| r.start >= 1 && r.start <= r.end);
    ranges.sort_by_key(|r| (r.start, r.end));

    let mut out: RangeSet = Vec::with_capacity(ranges.len());
    for r in ranges {
        match out.last_mut() {
            Some(last) if u64::from(r.start) <= u64::from(last.end) + 1 => {
                last.end = last.end.max(r.end);
            }
            _ => out.push(r),
        }
    }
    out
}

/// Build a canonical range set from an unordered multiset of line numbers.
/// Duplicates are dropped; consecutive integers merge into one range.
pub fn compact(lines: &[u32]) -> RangeSet {
    let mut sorted: Vec<u32> = lines.iter().copied().filter(|&l| l >= 1).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut out = Vec::new();
    for line in sorted {
        match out.last_mut() {
            Some(LineRange { end, .. }) if *end + 1 == line => *end = line,
            _ => out.push(LineRange {
                start: line,
                end: line,
            }),
        }
    }
    out
}

/// Enumerate every line number covered by the set, ascending.
pub fn expand(ranges: &[LineRange]) -> Vec<u32> {
    let mut out = Vec::new();
    for r in ranges {
        out.extend(r.start..=r.end);
    }
    out
}

pub fn union(a: &[LineRange], b: &[LineRange]) -> RangeSet {
    let mut all = Vec::with_capacity(a.len() + b.len());
    all.extend_from_slice(a);
    all.extend_from_slice(b);
    normalize(all)
}

pub fn intersect(a: &[LineRange], b: &[LineRange]) -> RangeSet {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let start = a[i].start.max(b[j].start);
        let end = a[i].end.min(b[j].end);
        if start <= end {
            out.push(LineRange { start, end });
        }
        if a[i].end < b[j].end {
            i += 1;
        } else {
            j += 1;
        }
    }
    out
}

/// Remove every line of `b` from `a`.
pub fn subtract(a: &[LineRange], b: &[LineRange]) -> RangeSet {
    let mut out = Vec::new();
    let mut j = 0;
    for r in a {
        let mut cur = r.start;
        while j < b.len() && b[j].end < cur {
            j += 1;
        }
        let mut k = j;
        while k < b.len() && b[k].start <= r.end {
            if b[k].start > cur {
                out.push(LineRange {
                    start: cur,
                    end: b[k].start - 1,
                });
            }
            cur = b[k].end.saturating_add(1);
            if cur > r.end {
                break;
            }
            k += 1;
        }
        if cur <= r.end {
            out.push(LineRange {
                start: cur,
                end: r.end,
            });
        }
    }
    out
}

/// Add `delta` to every endpoint. The portion of a range pushed to or below
/// zero is dropped; a range that straddles the boundary is clamped to 1.
pub fn shift(a: &[LineRange], delta: i64) -> RangeSet {
    let mut out = Vec::new();
    for r in a {
        let start = i64::from(r.start) + delta;
        let end = i64::from(r.end) + delta;
        if end < 1 {
            continue;
        }
        out.push(LineRange {
            start: start.max(1) as u32,
            end: end as u32,
        });
    }
    out
}

/// O(log n) membership test over a sorted range list.
pub fn contains(ranges: &[LineRange], line: u32) -> bool {
    ranges
        .binary_search_by(|r| {
            if r.end < line {
                std::cmp::Ordering::Less
            } else if r.start > line {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }
        })
        .is_ok()
}

/// Total number of lines covered.
pub fn line_count(ranges: &[LineRange]) -> u64 {
    ranges.iter().map(LineRange::len).sum()
}

/// First line of the new file affected by the hunk. Lines at or past this
/// point are shifted by the hunk's size delta; for a pure insertion the
/// unchanged region extends through `old_start` itself.
fn shift_threshold(h: &DiffHunk) -> u64 {
    if h.old_len > 0 {
        u64::from(h.old_start) + u64::from(h.old_len)
    } else {
        u64::from(h.old_start) + 1
    }
}

fn size_delta(h: &DiffHunk) -> i64 {
    i64::from(h.new_len) - i64::from(h.old_len)
}

/// Drop degenerate hunks, order by old position, and merge old spans that
/// overlap or nest so the remap walk sees disjoint ascending spans.
fn sanitize_hunks(hunks: &[DiffHunk]) -> Vec<DiffHunk> {
    let mut hs: Vec<DiffHunk> = hunks
        .iter()
        .copied()
        .filter(|h| h.old_len > 0 || h.new_len > 0)
        .collect();
    hs.sort_by_key(|h| (h.old_start, h.old_len));

    let mut out: Vec<DiffHunk> = Vec::with_capacity(hs.len());
    for h in hs {
        match out.last_mut() {
            Some(last)
                if last.old_len > 0
                    && h.old_len > 0
                    && u64::from(h.old_start)
                        < u64::from(last.old_start) + u64::from(last.old_len) =>
            {
                let last_end = u64::from(last.old_start) + u64::from(last.old_len);
                let h_end = u64::from(h.old_start) + u64::from(h.old_len);
                last.old_len = (last_end.max(h_end) - u64::from(last.old_start)) as u32;
                last.new_len = last.new_len.saturating_add(h.new_len);
            }
            _ => out.push(h),
        }
    }
    out
}

/// Translate a range set over the diff's pre-image into a range set over its
/// post-image. Lines inside a deleted or replaced span are dropped; surviving
/// lines shift by the running delta. Inserted lines are never added here.
pub fn remap(a: &[LineRange], hunks: &[DiffHunk]) -> RangeSet {
    if a.is_empty() {
        return Vec::new();
    }
    if hunks.is_empty() {
        return a.to_vec();
    }

    let hs = sanitize_hunks(hunks);
    let mut out: RangeSet = Vec::new();
    let mut delta: i64 = 0;
    let mut hi = 0;

    let mut push = |start: i64, end: i64| {
        if end >= 1 {
            out.push(LineRange {
                start: start.max(1) as u32,
                end: end as u32,
            });
        }
    };

    for r in a {
        let mut cur = u64::from(r.start);
        let rend = u64::from(r.end);

        loop {
            while hi < hs.len() && shift_threshold(&hs[hi]) <= cur {
                delta += size_delta(&hs[hi]);
                hi += 1;
            }

            let Some(h) = hs.get(hi) else {
                push(cur as i64 + delta, rend as i64 + delta);
                break;
            };

            if h.old_len == 0 {
                // Insertion after h.old_start; everything through that line
                // is untouched.
                let stop = rend.min(u64::from(h.old_start));
                push(cur as i64 + delta, stop as i64 + delta);
                if rend <= u64::from(h.old_start) {
                    break;
                }
                cur = u64::from(h.old_start) + 1;
                continue;
            }

            let del_lo = u64::from(h.old_start);
            let del_hi = del_lo + u64::from(h.old_len) - 1;

            if cur < del_lo {
                let stop = rend.min(del_lo - 1);
                push(cur as i64 + delta, stop as i64 + delta);
                if rend < del_lo {
                    break;
                }
                cur = del_lo;
            } else if rend <= del_hi {
                // Remainder of the range sits inside the deleted span.
                break;
            } else {
                cur = del_hi + 1;
            }
        }
    }

    out
}
