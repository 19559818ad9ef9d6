/*
    TagStore Library (extent and link annotation store)
        by Maarten van Gompel <proycon@anaproy.nl>

        Licensed under the GNU General Public License v3
*/

//! This module contains the [`ExtentTag`] type, an annotation anchored in the text by a [`Span`],
//! and the [`ExtentTagBuilder`] recipe used to create one in an [`AnnotationStore`].

use sealed::sealed;
use std::collections::BTreeMap;

use crate::annotationstore::AnnotationStore;
use crate::error::TagStoreError;
use crate::linktag::LinkTag;
use crate::results::GroupedTags;
use crate::span::Span;
use crate::store::*;
use crate::tagtype::{TagType, TagTypeHandle};
use crate::types::*;

/// Functionality common to both extent tags and link tags
#[sealed(pub(crate))]
pub trait Tag: Storable {
    /// Returns a handle to the tag type in the registry
    fn tagtype_handle(&self) -> TagTypeHandle;

    /// Returns all attribute values of this tag
    fn attributes(&self) -> &BTreeMap<String, String>;

    /// Returns the value of a single attribute
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes().get(name).map(|s| s.as_str())
    }

    #[doc(hidden)]
    fn attributes_mut(&mut self) -> &mut BTreeMap<String, String>;
}

/// An `ExtentTag` is an instance of an extent [`TagType`]: an annotation covering a [`Span`] of text.
/// Non-consuming extent tags carry the sentinel span and anchor nowhere in particular.
#[derive(Debug, Clone)]
pub struct ExtentTag {
    ///Internal numeric ID, corresponds with the index in the AnnotationStore. May be unbound (None) only during creation.
    intid: Option<ExtentTagHandle>,

    /// Public identifier, the prefix of the tag type followed by a number (unless supplied otherwise)
    id: String,

    tagtype: TagTypeHandle,

    span: Span,

    /// The covered text, derived from the span and the document text
    text: String,

    attributes: BTreeMap<String, String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExtentTagHandle(u32);

#[sealed]
impl Handle for ExtentTagHandle {
    fn new(intid: usize) -> Self {
        Self(intid as u32)
    }
    fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

#[sealed]
impl TypeInfo for ExtentTag {
    fn typeinfo() -> Type {
        Type::ExtentTag
    }
}

#[sealed]
impl Storable for ExtentTag {
    type HandleType = ExtentTagHandle;
    type StoreType = AnnotationStore;

    fn id(&self) -> Option<&str> {
        Some(self.id.as_str())
    }
    fn handle(&self) -> Option<ExtentTagHandle> {
        self.intid
    }
    fn set_handle(&mut self, handle: ExtentTagHandle) {
        self.intid = Some(handle);
    }
}

#[sealed]
impl Tag for ExtentTag {
    fn tagtype_handle(&self) -> TagTypeHandle {
        self.tagtype
    }
    fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }
    fn attributes_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.attributes
    }
}

impl PartialEq<ExtentTag> for ExtentTag {
    fn eq(&self, other: &ExtentTag) -> bool {
        self.id == other.id
            && self.tagtype == other.tagtype
            && self.span == other.span
            && self.attributes == other.attributes
    }
}

impl ExtentTag {
    pub(crate) fn new(
        id: String,
        tagtype: TagTypeHandle,
        span: Span,
        text: String,
        attributes: BTreeMap<String, String>,
    ) -> Self {
        Self {
            intid: None,
            id,
            tagtype,
            span,
            text,
            attributes,
        }
    }

    /// Returns the public identifier
    pub fn as_str(&self) -> &str {
        self.id.as_str()
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Returns the text covered by this tag (empty if no document text is known)
    pub fn text(&self) -> &str {
        self.text.as_str()
    }

    pub fn is_nonconsuming(&self) -> bool {
        self.span.is_nonconsuming()
    }

    /// Replaces the span, returns the old one
    pub(crate) fn set_span(&mut self, span: Span) -> Span {
        std::mem::replace(&mut self.span, span)
    }

    pub(crate) fn set_text(&mut self, text: String) {
        self.text = text;
    }
}

impl<'store> ResultItem<'store, ExtentTag> {
    /// Returns the public identifier, with the lifetime of the store
    pub fn as_str(&self) -> &'store str {
        self.as_ref().as_str()
    }

    pub fn span(&self) -> &'store Span {
        self.as_ref().span()
    }

    /// Returns the covered text, with the lifetime of the store
    pub fn text(&self) -> &'store str {
        self.as_ref().text()
    }

    /// Returns the tag type of this tag
    pub fn tagtype(&self) -> ResultItem<'store, TagType> {
        self.store()
            .registry()
            .tagtype_by_handle(self.as_ref().tagtype_handle())
            .expect("tag type of a stored tag must exist")
    }

    /// Returns all link tags that have an argument bound to this tag, grouped by type
    pub fn links(&self) -> GroupedTags<'store, LinkTag> {
        self.store().links_referencing_handle(self.handle())
    }
}

/// Recipe for an [`ExtentTag`]: pass it to [`AnnotationStore::create_extent_tag()`].
///
/// If no ID is given, one is allocated. If no span is given, the tag type must be non-consuming
/// and the sentinel span is used. If no text is given, it is derived from the document text.
#[derive(Debug, Clone, Default)]
pub struct ExtentTagBuilder {
    pub(crate) tagtype: String,
    pub(crate) id: Option<String>,
    pub(crate) span: Option<Span>,
    pub(crate) text: Option<String>,
    pub(crate) attributes: BTreeMap<String, String>,
}

impl ExtentTagBuilder {
    pub fn new(tagtype: impl Into<String>) -> Self {
        Self {
            tagtype: tagtype.into(),
            ..Self::default()
        }
    }

    /// Use this identifier instead of allocating one (as done when loading documents)
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Sets the span from raw, possibly unordered and overlapping, `(begin, end)` ranges
    pub fn with_ranges<I>(mut self, ranges: I) -> Result<Self, TagStoreError>
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        self.span = Some(Span::merge(ranges)?);
        Ok(self)
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}
