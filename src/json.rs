/*
    TagStore Library (extent and link annotation store)
        by Maarten van Gompel <proycon@anaproy.nl>

        Licensed under the GNU General Public License v3
*/

//! This module contains the [`ToJson`] and [`FromJson`] traits that are used
//! in serialisation to/from JSON. The actual serialisation methods are implemented
//! alongside the data structures themselves, not here.

use std::io::Write;

use crate::config::Config;
use crate::error::TagStoreError;
use crate::file::*;
use crate::types::*;

pub trait ToJson
where
    Self: TypeInfo + serde::Serialize,
{
    /// Writes a JSON serialisation to any writer
    /// Lower-level function
    fn to_json_writer<W>(&self, writer: W, compact: bool) -> Result<(), TagStoreError>
    where
        W: std::io::Write,
    {
        match compact {
            false => serde_json::to_writer_pretty(writer, &self),
            true => serde_json::to_writer(writer, &self),
        }
        .map_err(|e| {
            TagStoreError::SerializationError(format!(
                "Writing {} to file: {}",
                Self::typeinfo(),
                e
            ))
        })
    }

    /// Writes this structure to a file
    fn to_json_file(&self, filename: &str, config: &Config) -> Result<(), TagStoreError> {
        debug(config, || {
            format!("{}.to_json_file: filename={:?}", Self::typeinfo(), filename)
        });
        let compact = match config.dataformat() {
            DataFormat::Json { compact } => compact,
            #[allow(unreachable_patterns)]
            _ => false,
        };
        let mut writer = open_file_writer(filename, config)?;
        self.to_json_writer(&mut writer, compact)?;
        writer.flush().map_err(|e| {
            TagStoreError::IOError(e, filename.to_string(), "Flushing JSON output failed")
        })
    }

    /// Serializes this structure to one string.
    fn to_json_string(&self, config: &Config) -> Result<String, TagStoreError> {
        match config.dataformat() {
            DataFormat::Json { compact: true } => serde_json::to_string(&self),
            _ => serde_json::to_string_pretty(&self),
        }
        .map_err(|e| {
            TagStoreError::SerializationError(format!(
                "Writing {} to string: {}",
                Self::typeinfo(),
                e
            ))
        })
    }
}

pub trait FromJson
where
    Self: TypeInfo + Sized,
{
    fn from_json_file(filename: &str, config: Config) -> Result<Self, TagStoreError>;

    fn from_json_str(string: &str, config: Config) -> Result<Self, TagStoreError>;
}
