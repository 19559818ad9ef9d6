/*
    TagStore Library (extent and link annotation store)
        by Maarten van Gompel <proycon@anaproy.nl>

        Licensed under the GNU General Public License v3
*/

//! This module contains the [`Config`] structure and the [`Configurable`] trait.

use sealed::sealed;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::TagStoreError;
use crate::file::*;
use crate::json::ToJson;
use crate::types::*;

/// Separator placed between the text fragments of a discontinuous extent tag
pub const DEFAULT_TEXT_SEPARATOR: &str = " ... ";

/// Default upper bound on the number of character offsets a single span may cover
pub const DEFAULT_MAX_SPAN_LENGTH: usize = 1 << 24;

pub trait Configurable: Sized {
    //// Obtain the configuration
    fn config(&self) -> &Config;

    ///Builder pattern to associate a configuration
    fn with_config(mut self, config: Config) -> Self {
        self.set_config(config);
        self
    }

    ///Setter to associate a configuration
    fn set_config(&mut self, config: Config) -> &mut Self;
}

/// This holds the configuration. It is not limited to configuring a single part of the model, but unifies all in a single configuration.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    /// Debug mode
    pub(crate) debug: bool,

    /// The working directory
    pub(crate) workdir: Option<PathBuf>,

    /// Allocate identifiers (tag type prefix followed by a number) for tags that are created without one
    pub(crate) generate_ids: bool,

    /// Release the identifier of a deleted tag so it can be issued again
    pub(crate) reuse_ids: bool,

    /// Separator between the text fragments of a discontinuous span
    pub(crate) text_separator: String,

    /// Spans covering more offsets than this are refused. Every covered offset gets an entry in the
    /// character index, so this also bounds the memory a single tag can claim when no document text is known.
    pub(crate) max_span_length: Option<usize>,

    /// The chosen dataformat for serialisation, defaults to JSON.
    pub(crate) dataformat: DataFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            workdir: None,
            generate_ids: true,
            reuse_ids: true,
            text_separator: DEFAULT_TEXT_SEPARATOR.to_string(),
            max_span_length: Some(DEFAULT_MAX_SPAN_LENGTH),
            dataformat: DataFormat::Json { compact: false },
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable debug mode. In debug mode, verbose output is emitted via `tracing` at debug level
    pub fn with_debug(mut self, value: bool) -> Self {
        self.debug = value;
        self
    }

    /// Is debug mode enabled or not?
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Set the working directory, relative filenames are resolved against it
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    ///  Return the working directory, if set
    pub fn workdir(&self) -> Option<&Path> {
        self.workdir.as_deref()
    }

    /// Allocate public IDs for tags created without one.
    /// If disabled, every tag must be given an explicit ID.
    pub fn with_generate_ids(mut self, value: bool) -> Self {
        self.generate_ids = value;
        self
    }

    /// Is generation of public IDs when missing enabled or not?
    pub fn generate_ids(&self) -> bool {
        self.generate_ids
    }

    /// Release IDs of deleted tags so the allocator may hand them out again
    pub fn with_reuse_ids(mut self, value: bool) -> Self {
        self.reuse_ids = value;
        self
    }

    pub fn reuse_ids(&self) -> bool {
        self.reuse_ids
    }

    /// Sets the separator placed between the text fragments of discontinuous extent tags
    pub fn with_text_separator(mut self, value: impl Into<String>) -> Self {
        self.text_separator = value.into();
        self
    }

    pub fn text_separator(&self) -> &str {
        self.text_separator.as_str()
    }

    /// Sets the maximum number of offsets a span may cover, `None` disables the limit
    pub fn with_max_span_length(mut self, value: Option<usize>) -> Self {
        self.max_span_length = value;
        self
    }

    pub fn max_span_length(&self) -> Option<usize> {
        self.max_span_length
    }

    /// Sets chosen dataformat for serialisation, defaults to JSON.
    pub fn with_dataformat(mut self, value: DataFormat) -> Self {
        self.dataformat = value;
        self
    }

    /// Returns the configured dataformat for serialisation.
    pub fn dataformat(&self) -> DataFormat {
        self.dataformat
    }

    /// Loads configuration from a JSON file
    pub fn from_file(filename: &str) -> Result<Self, TagStoreError> {
        let reader = open_file_reader(filename, &Config::default())?;
        let deserializer = &mut serde_json::Deserializer::from_reader(reader);
        let result: Result<Self, _> = serde_path_to_error::deserialize(deserializer);
        result.map_err(|e| {
            TagStoreError::JsonError(e, filename.to_string(), "Reading config from file")
        })
    }

    /// Loads configuration from a JSON string
    pub fn from_json_str(string: &str) -> Result<Self, TagStoreError> {
        let deserializer = &mut serde_json::Deserializer::from_str(string);
        let result: Result<Self, _> = serde_path_to_error::deserialize(deserializer);
        result.map_err(|e| {
            TagStoreError::JsonError(e, "(string)".to_string(), "Reading config from string")
        })
    }
}

#[sealed]
impl TypeInfo for Config {
    fn typeinfo() -> Type {
        Type::Config
    }
}

impl ToJson for Config {}
