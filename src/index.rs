/*
    TagStore Library (extent and link annotation store)
        by Maarten van Gompel <proycon@anaproy.nl>

        Licensed under the GNU General Public License v3
*/

//! Derived indices of the [`crate::AnnotationStore`]: the [`CharacterIndex`] mapping character offsets to
//! the extent tags covering them, and the [`DocumentText`] used to derive the text of extent tags.

use smallvec::SmallVec;
use std::collections::{btree_map, BTreeMap};

use crate::error::TagStoreError;
use crate::extenttag::ExtentTagHandle;
use crate::span::Span;

/// Maps every covered character offset to the extent tags whose span covers it.
/// Non-consuming tags have no entries. Handles under each offset are kept in ascending order.
#[derive(Debug, Clone, Default)]
pub(crate) struct CharacterIndex(BTreeMap<usize, SmallVec<[ExtentTagHandle; 2]>>);

impl CharacterIndex {
    /// Adds index entries for every offset of the span
    pub fn insert(&mut self, handle: ExtentTagHandle, span: &Span) {
        for offset in span.offsets() {
            let entry = self.0.entry(offset).or_default();
            if let Err(pos) = entry.binary_search(&handle) {
                entry.insert(pos, handle);
            }
        }
    }

    /// Adds index entries for many tags at once, as done when a batch is committed.
    /// Entries are collected per offset first so every offset is visited only once.
    pub fn extend<'a, I>(&mut self, tags: I)
    where
        I: IntoIterator<Item = (ExtentTagHandle, &'a Span)>,
    {
        let mut pairs: Vec<(usize, ExtentTagHandle)> = Vec::new();
        for (handle, span) in tags {
            pairs.extend(span.offsets().map(|offset| (offset, handle)));
        }
        pairs.sort_unstable();
        pairs.dedup();
        for (offset, handle) in pairs {
            let entry = self.0.entry(offset).or_default();
            match entry.last() {
                Some(last) if *last >= handle => {
                    if let Err(pos) = entry.binary_search(&handle) {
                        entry.insert(pos, handle);
                    }
                }
                _ => entry.push(handle),
            }
        }
    }

    /// Removes all index entries of the tag for the given span
    pub fn remove(&mut self, handle: ExtentTagHandle, span: &Span) {
        for offset in span.offsets() {
            if let btree_map::Entry::Occupied(mut entry) = self.0.entry(offset) {
                entry.get_mut().retain(|h| *h != handle);
                if entry.get().is_empty() {
                    entry.remove();
                }
            }
        }
    }

    /// Returns the tags covering the offset
    pub fn at(&self, offset: usize) -> &[ExtentTagHandle] {
        self.0.get(&offset).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Iterates over the tags covering any offset in `[begin, end)`, may yield duplicates
    pub fn range(&self, begin: usize, end: usize) -> impl Iterator<Item = ExtentTagHandle> + '_ {
        self.0
            .range(begin..end)
            .flat_map(|(_, handles)| handles.iter().copied())
    }

    /// Number of indexed offsets
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// The text of the annotated document, with a mapping from unicode points to utf-8 bytes
#[derive(Debug, Clone)]
pub(crate) struct DocumentText {
    text: String,
    /// Byte position of every character, followed by the total length in bytes
    bytepos: Vec<usize>,
}

impl DocumentText {
    pub fn new(text: String) -> Self {
        let mut bytepos: Vec<usize> = text.char_indices().map(|(pos, _)| pos).collect();
        bytepos.push(text.len());
        Self { text, bytepos }
    }

    pub fn as_str(&self) -> &str {
        self.text.as_str()
    }

    /// Length of the text in unicode points
    pub fn textlen(&self) -> usize {
        self.bytepos.len() - 1
    }

    /// Converts a unicode point to a utf-8 byte offset
    fn utf8byte(&self, charpos: usize) -> Result<usize, TagStoreError> {
        self.bytepos.get(charpos).copied().ok_or(TagStoreError::OffsetOutOfBounds(
            charpos,
            "offset exceeds the length of the document text",
        ))
    }

    /// Checks that the span does not reach past the end of the text
    pub fn validate(&self, span: &Span) -> Result<(), TagStoreError> {
        match span.end() {
            Some(end) if end > self.textlen() => Err(TagStoreError::OffsetOutOfBounds(
                end,
                "span exceeds the length of the document text",
            )),
            _ => Ok(()),
        }
    }

    /// Returns the text covered by the span, the fragments of a discontinuous span are joined by the separator
    pub fn text_of(&self, span: &Span, separator: &str) -> Result<String, TagStoreError> {
        let mut fragments: SmallVec<[&str; 1]> = SmallVec::new();
        for range in span.ranges() {
            let begin = self.utf8byte(range.begin())?;
            let end = self.utf8byte(range.end())?;
            fragments.push(&self.text[begin..end]);
        }
        Ok(fragments.join(separator))
    }
}
