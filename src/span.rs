/*
    TagStore Library (extent and link annotation store)
        by Maarten van Gompel <proycon@anaproy.nl>

        Licensed under the GNU General Public License v3
*/

//! This module contains the [`Span`] and [`TextRange`] types: the canonical representation of the
//! (possibly discontinuous) stretch of text an extent tag covers, and its textual serialisation
//! such as `5~8,10~12`.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::TagStoreError;

/// Separates the ranges of a discontinuous span in its textual form
pub const RANGE_SEPARATOR: char = ',';

/// Separates begin and end within one range in its textual form
pub const RANGE_DELIMITER: char = '~';

/// Textual form of the span of a non-consuming tag
pub const NONCONSUMING_SPAN: &str = "-1~-1";

#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
/// A single half-open range `[begin, end)` of unicode codepoints, `begin < end` always holds.
pub struct TextRange {
    begin: usize,
    end: usize,
}

impl TextRange {
    /// Creates a new range, fails if `begin >= end`
    pub fn new(begin: usize, end: usize) -> Result<Self, TagStoreError> {
        if begin >= end {
            Err(TagStoreError::MalformedSpan(
                format!("{}{}{}", begin, RANGE_DELIMITER, end),
                "begin must be smaller than end",
            ))
        } else {
            Ok(Self { begin, end })
        }
    }

    /// Return the begin position (unicode points)
    pub fn begin(&self) -> usize {
        self.begin
    }

    /// Return the end position (non-inclusive) in unicode points
    pub fn end(&self) -> usize {
        self.end
    }

    /// Number of codepoints covered
    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.begin && offset < self.end
    }
}

impl Ord for TextRange {
    // this determines the canonical ordering: by begin, then by end
    fn cmp(&self, other: &Self) -> Ordering {
        self.begin
            .cmp(&other.begin)
            .then_with(|| self.end.cmp(&other.end))
    }
}

impl PartialOrd for TextRange {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}{}", self.begin, RANGE_DELIMITER, self.end)
    }
}

/// A normalized span: ranges sorted ascending, none overlapping or touching.
///
/// The span of a non-consuming tag is a reserved sentinel which anchors nowhere in the text;
/// it is represented internally without any ranges and formats as `-1~-1`. Apart from the
/// sentinel, a span is never empty.
#[derive(PartialEq, Eq, Debug, Clone, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Span(SmallVec<[TextRange; 1]>);

impl Span {
    /// Returns the sentinel span used by non-consuming tags
    pub fn nonconsuming() -> Self {
        Self(SmallVec::new())
    }

    /// Is this the sentinel span of a non-consuming tag?
    pub fn is_nonconsuming(&self) -> bool {
        self.0.is_empty()
    }

    /// Creates a span consisting of a single range
    pub fn single(begin: usize, end: usize) -> Result<Self, TagStoreError> {
        let range = TextRange::new(begin, end)?;
        let mut ranges = SmallVec::new();
        ranges.push(range);
        Ok(Self(ranges))
    }

    /// Normalizes an unordered list of raw `(begin, end)` ranges into a span.
    ///
    /// Ranges are sorted by begin (ties by end) and then folded left to right; a range is merged
    /// into the running range when its begin is smaller than *or equal to* the running end, so
    /// adjacent ranges such as `[0,3)` and `[3,5)` coalesce into `[0,5)`.
    ///
    /// Fails with [`TagStoreError::MalformedSpan`] when no ranges are given or when any range has `begin >= end`.
    pub fn merge<I>(ranges: I) -> Result<Self, TagStoreError>
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        let mut sorted: SmallVec<[TextRange; 4]> = SmallVec::new();
        for (begin, end) in ranges {
            sorted.push(TextRange::new(begin, end)?);
        }
        if sorted.is_empty() {
            return Err(TagStoreError::MalformedSpan(
                String::new(),
                "a span needs at least one range",
            ));
        }
        sorted.sort_unstable();

        let mut merged: SmallVec<[TextRange; 1]> = SmallVec::with_capacity(sorted.len());
        let mut running = sorted[0];
        for next in sorted.into_iter().skip(1) {
            if next.begin <= running.end {
                running.end = running.end.max(next.end);
            } else {
                merged.push(running);
                running = next;
            }
        }
        merged.push(running);
        Ok(Self(merged))
    }

    /// Parses the textual form of a span, e.g. `5~8,10~12` or `-1~-1` for non-consuming spans.
    /// The result is normalized, so unordered or overlapping input ranges are merged.
    pub fn parse(text: &str) -> Result<Self, TagStoreError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TagStoreError::MalformedSpan(
                text.to_string(),
                "empty span",
            ));
        }
        let mut raw: SmallVec<[(usize, usize); 4]> = SmallVec::new();
        let mut sentinel = false;
        for part in text.split(RANGE_SEPARATOR) {
            let (begin, end) = part.split_once(RANGE_DELIMITER).ok_or_else(|| {
                TagStoreError::MalformedSpan(text.to_string(), "range lacks a begin~end delimiter")
            })?;
            let begin = parse_offset(begin, text)?;
            let end = parse_offset(end, text)?;
            match (begin, end) {
                (-1, -1) => sentinel = true,
                (begin, end) if begin < 0 || end < 0 => {
                    return Err(TagStoreError::MalformedSpan(
                        text.to_string(),
                        "negative offsets are only allowed in the non-consuming span",
                    ))
                }
                (begin, end) => raw.push((begin as usize, end as usize)),
            }
        }
        if sentinel {
            if raw.is_empty() && !text.contains(RANGE_SEPARATOR) {
                Ok(Self::nonconsuming())
            } else {
                Err(TagStoreError::MalformedSpan(
                    text.to_string(),
                    "the non-consuming span can not be combined with other ranges",
                ))
            }
        } else {
            Self::merge(raw).map_err(|e| match e {
                TagStoreError::MalformedSpan(_, msg) => {
                    TagStoreError::MalformedSpan(text.to_string(), msg)
                }
                e => e,
            })
        }
    }

    /// Returns the textual form of the span, the inverse of [`Self::parse()`]
    pub fn format(&self) -> String {
        self.to_string()
    }

    /// Returns the ranges of this span, in ascending order. Empty for non-consuming spans.
    pub fn ranges(&self) -> &[TextRange] {
        &self.0
    }

    /// Returns the begin of the first range, None for non-consuming spans
    pub fn begin(&self) -> Option<usize> {
        self.0.first().map(|r| r.begin)
    }

    /// Returns the end of the last range, None for non-consuming spans
    pub fn end(&self) -> Option<usize> {
        self.0.last().map(|r| r.end)
    }

    /// Returns the number of offsets covered by this span
    pub fn len(&self) -> usize {
        self.0.iter().map(|r| r.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Does the span cover the specified offset?
    pub fn contains(&self, offset: usize) -> bool {
        self.0.iter().any(|r| r.contains(offset))
    }

    /// Iterates over the ranges as raw `(begin, end)` tuples, as accepted by [`Self::merge()`]
    pub fn raw_ranges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.0.iter().map(|r| (r.begin, r.end))
    }

    /// Iterates over all offsets covered by this span, in ascending order
    pub fn offsets(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().flat_map(|r| r.begin..r.end)
    }
}

fn parse_offset(token: &str, text: &str) -> Result<i64, TagStoreError> {
    token.trim().parse::<i64>().map_err(|_| {
        TagStoreError::MalformedSpan(text.to_string(), "offset is not an integer")
    })
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_nonconsuming() {
            return write!(f, "{}", NONCONSUMING_SPAN);
        }
        for (i, range) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", RANGE_SEPARATOR)?;
            }
            write!(f, "{}", range)?;
        }
        Ok(())
    }
}

impl FromStr for Span {
    type Err = TagStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Span {
    type Error = TagStoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Span> for String {
    fn from(span: Span) -> String {
        span.to_string()
    }
}

impl From<TextRange> for Span {
    fn from(range: TextRange) -> Self {
        let mut ranges = SmallVec::new();
        ranges.push(range);
        Self(ranges)
    }
}
