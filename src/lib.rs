/*
    TagStore Library (extent and link annotation store)
        by Maarten van Gompel <proycon@anaproy.nl>

        Licensed under the GNU General Public License v3
*/

//! ## Introduction
//!
//! This library is the annotation store at the core of a text annotation tool. Annotators mark up a
//! document with *extent tags*, which cover a (possibly discontinuous) span of characters, and with
//! *link tags*, which relate extent tags to one another through named argument roles. What kinds of
//! tags exist, which attributes they take and which roles links have, is declared up front in a schema.
//!
//! **What can you do with this library?**
//!
//! * Declare a schema of tag types in a [`TagTypeRegistry`], in code or from JSON
//! * Keep all tags of a document in an [`AnnotationStore`], with:
//!    * identifiers issued per tag type (`P0`, `P1`, ...) by the [`IdAllocator`]
//!    * fast lookup of the tags covering a character offset or a range
//!    * reverse lookup of the link tags that refer to an extent tag
//!    * referential integrity: deleting an extent tag deletes the link tags that refer to it
//!    * validated attributes, including references to other tags
//! * Load documents in one atomic batch from [`TagRecord`]s, as produced by readers of annotation files
//! * Read and write all tags as JSON or CSV
//!
//! Spans have a canonical textual form, handled by [`Span`]: ranges `begin~end` in unicode points,
//! separated by commas, e.g. `5~8,10~12`. Non-consuming tags, which anchor nowhere in the text, carry the
//! special span `-1~-1`.
//!
//! High-level API:
//! * [`AnnotationStore`]
//! * [`TagTypeRegistry`]
//! * [`ResultItem<ExtentTag>`](struct.ResultItem.html#impl-ResultItem<'store,+ExtentTag>)
//! * [`ResultItem<LinkTag>`](struct.ResultItem.html#impl-ResultItem<'store,+LinkTag>)
//! * [`GroupedTags`] - query results
//! * [`Span`]
//!
//! Low-level API:
//! * [`ExtentTag`]
//! * [`LinkTag`]
//! * [`TagType`]
//! * [`IdAllocator`]

mod annotationstore;
mod config;
mod error;
mod extenttag;
mod file;
mod idalloc;
mod index;
mod json;
mod linktag;
mod loader;
mod results;
mod span;
mod store;
mod tagtype;
mod types;

#[cfg(feature = "csv")]
mod csv;

// Our internal crate structure is not very relevant to the outside world,
// expose all structs and traits in the root namespace, and be explicit about it:

#[cfg(feature = "csv")]
pub use crate::csv::ToCsv;
pub use annotationstore::AnnotationStore;
pub use config::{Config, Configurable, DEFAULT_MAX_SPAN_LENGTH, DEFAULT_TEXT_SEPARATOR};
pub use error::TagStoreError;
pub use extenttag::{ExtentTag, ExtentTagBuilder, ExtentTagHandle, Tag};
pub use idalloc::IdAllocator;
pub use json::{FromJson, ToJson};
pub use linktag::{LinkTag, LinkTagBuilder, LinkTagHandle};
pub use loader::{ExtentRecord, LinkRecord, LoadMode, LoadReport, StoreRecords, TagRecord};
pub use results::GroupedTags;
pub use span::{Span, TextRange, NONCONSUMING_SPAN, RANGE_DELIMITER, RANGE_SEPARATOR};
pub use store::{IdMap, RelationMap, ResultItem, Storable, Store, StoreFor};
pub use tagtype::{
    AttributeKind, AttributeSpec, TagKind, TagType, TagTypeBuilder, TagTypeHandle, TagTypeRegistry,
    MAX_TAGTYPES,
};
pub use types::*;

mod tests;
