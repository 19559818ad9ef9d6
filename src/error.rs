/*
    TagStore Library (extent and link annotation store)
        by Maarten van Gompel <proycon@anaproy.nl>

        Licensed under the GNU General Public License v3
*/

//! This module contains the [`TagStoreError`] type that is used throughout the library.

use std::error::Error;
use std::fmt;
use std::io;

/// This is the error type used throughout the library. Each variant carries the offending value(s)
/// and a short static context message describing where the error arose.
#[derive(Debug)]
pub enum TagStoreError {
    /// No tag type of this name exists in the registry
    UnknownTagType(String, &'static str),

    /// The tag type exists but is of the wrong kind (extent vs link) for the operation
    WrongTagKind(String, &'static str),

    /// The argument role (first) is not declared for the link tag type (second)
    UnknownRole(String, String, &'static str),

    /// No tag with this public ID exists
    UnknownId(String, &'static str),

    /// A tag with this public ID already exists or was already reserved
    DuplicateId(String, &'static str),

    /// An argument role (first) was bound to an extent tag ID (second) that does not exist
    DanglingArgumentReference(String, String, &'static str),

    /// More argument bindings (first) were provided than the link tag type (third) declares (second)
    TooManyArguments(usize, usize, String),

    /// The span (first, formatted) can not be used for the tag type (second)
    InvalidSpanForType(String, String, &'static str),

    /// The textual or raw span representation could not be turned into a valid span
    MalformedSpan(String, &'static str),

    /// An attribute (first) on a tag type (second) was given an invalid value or is not declared
    InvalidAttribute(String, String, &'static str),

    /// The schema definition is inconsistent (duplicate names, roles, prefixes, etc)
    InvalidSchema(String, &'static str),

    /// An offset lies beyond the end of the document text
    OffsetOutOfBounds(usize, &'static str),

    /// The operation is not allowed given the current batch state
    BatchError(&'static str),

    /// Internal handle does not resolve to an item
    HandleError(&'static str),

    /// The item was already bound to a store
    AlreadyBound(&'static str),

    IOError(io::Error, String, &'static str),
    JsonError(
        serde_path_to_error::Error<serde_json::error::Error>,
        String,
        &'static str,
    ),
    SerializationError(String),
}

impl From<&TagStoreError> for String {
    /// Returns the error message as a String
    fn from(error: &TagStoreError) -> String {
        match error {
            TagStoreError::UnknownTagType(name, contextmsg) => {
                format!("UnknownTagType: No such tag type: {} ({})", name, contextmsg)
            }
            TagStoreError::WrongTagKind(name, contextmsg) => {
                format!(
                    "WrongTagKind: Tag type {} is of the wrong kind ({})",
                    name, contextmsg
                )
            }
            TagStoreError::UnknownRole(role, tagtype, contextmsg) => format!(
                "UnknownRole: Argument role {} is not declared for {} ({})",
                role, tagtype, contextmsg
            ),
            TagStoreError::UnknownId(id, contextmsg) => {
                format!("UnknownId: No such ID: {} ({})", id, contextmsg)
            }
            TagStoreError::DuplicateId(id, contextmsg) => {
                format!("DuplicateId: ID already exists: {} ({})", id, contextmsg)
            }
            TagStoreError::DanglingArgumentReference(role, id, contextmsg) => format!(
                "DanglingArgumentReference: Argument {} refers to non-existing extent tag {} ({})",
                role, id, contextmsg
            ),
            TagStoreError::TooManyArguments(given, allowed, tagtype) => format!(
                "TooManyArguments: {} arguments given but {} declares only {}",
                given, tagtype, allowed
            ),
            TagStoreError::InvalidSpanForType(span, tagtype, contextmsg) => format!(
                "InvalidSpanForType: Span {} is not valid for {} ({})",
                span, tagtype, contextmsg
            ),
            TagStoreError::MalformedSpan(text, contextmsg) => {
                format!("MalformedSpan: {:?} ({})", text, contextmsg)
            }
            TagStoreError::InvalidAttribute(name, tagtype, contextmsg) => format!(
                "InvalidAttribute: Attribute {} on {} ({})",
                name, tagtype, contextmsg
            ),
            TagStoreError::InvalidSchema(name, contextmsg) => {
                format!("InvalidSchema: {} ({})", name, contextmsg)
            }
            TagStoreError::OffsetOutOfBounds(offset, contextmsg) => format!(
                "OffsetOutOfBounds: Offset {} is out of bounds ({})",
                offset, contextmsg
            ),
            TagStoreError::BatchError(contextmsg) => format!("BatchError: {}", contextmsg),
            TagStoreError::HandleError(contextmsg) => {
                format!("HandleError: Handle not found or deleted ({})", contextmsg)
            }
            TagStoreError::AlreadyBound(contextmsg) => {
                format!("AlreadyBound: Item is already bound ({})", contextmsg)
            }
            TagStoreError::IOError(err, filename, contextmsg) => {
                format!("IOError: {} ({}): {}", filename, contextmsg, err)
            }
            TagStoreError::JsonError(err, filename, contextmsg) => format!(
                "JsonError: {} at {} ({}): {}",
                filename,
                err.path(),
                contextmsg,
                err.inner()
            ),
            TagStoreError::SerializationError(msg) => format!("SerializationError: {}", msg),
        }
    }
}

impl fmt::Display for TagStoreError {
    /// Formats the error message for printing
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let errmsg: String = String::from(self);
        write!(f, "[TagStoreError] {}", errmsg)
    }
}

impl Error for TagStoreError {}

impl From<TagStoreError> for io::Error {
    fn from(err: TagStoreError) -> io::Error {
        io::Error::new(io::ErrorKind::Other, String::from(&err))
    }
}
