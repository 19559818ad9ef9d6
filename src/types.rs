/*
    TagStore Library (extent and link annotation store)
        by Maarten van Gompel <proycon@anaproy.nl>

        Licensed under the GNU General Public License v3
*/

//! This module contains some common types and traits that are used throughout the library.

use sealed::sealed;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

use crate::config::Config;

/// The handle trait is implemented on various handle types. They have in common that refer to the internal id
/// a [`crate::Storable`] item in a [`crate::Store`] by index. Types implementing this are lightweight and do not borrow anything,
/// they can be passed and copied freely.
/// This is a sealed trait, not implementable outside this crate.
#[sealed(pub(crate))] //<-- this ensures nobody outside this crate can implement the trait
pub trait Handle:
    Clone + Copy + core::fmt::Debug + PartialEq + Eq + PartialOrd + Ord + Hash
{
    /// Create a new handle for an internal ID. You shouldn't need to use this as handles will always be generated for you by higher-level functions.
    fn new(intid: usize) -> Self;
    /// Returns the internal index for this handle
    fn as_usize(&self) -> usize;
}

/// The kinds of structures in the model, used for introspection and messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    TagType,
    TagTypeRegistry,
    ExtentTag,
    LinkTag,
    AnnotationStore,
    Config,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::TagType => "TagType",
            Self::TagTypeRegistry => "TagTypeRegistry",
            Self::ExtentTag => "ExtentTag",
            Self::LinkTag => "LinkTag",
            Self::AnnotationStore => "AnnotationStore",
            Self::Config => "Config",
        };
        write!(f, "{}", s)
    }
}

#[sealed(pub(crate))]
pub trait TypeInfo {
    /// Return the type (introspection)
    fn typeinfo() -> Type;
}

/// Serialisation formats supported for export
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub enum DataFormat {
    /// JSON records, optionally compact (single line)
    Json { compact: bool },

    /// Comma separated values, one row per tag
    #[cfg(feature = "csv")]
    Csv,
}

impl Default for DataFormat {
    fn default() -> Self {
        Self::Json { compact: false }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Json { .. } => write!(f, "json"),
            #[cfg(feature = "csv")]
            Self::Csv => write!(f, "csv"),
        }
    }
}

/// Emits a debug message if debug mode is enabled in the configuration.
/// The message is produced by a closure so no formatting takes place when debugging is off.
pub(crate) fn debug<F>(config: &Config, message_func: F)
where
    F: FnOnce() -> String,
{
    if config.debug {
        tracing::debug!(target: "tagstore", "{}", message_func());
    }
}
