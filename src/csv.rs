/*
    TagStore Library (extent and link annotation store)
        by Maarten van Gompel <proycon@anaproy.nl>

        Licensed under the GNU General Public License v3
*/

//! CSV serialisation: one row per tag. Argument bindings and attributes are packed into a single
//! column each, as a JSON object mapping names to values (left empty when there are none).

use sealed::sealed;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io::Write;

use crate::annotationstore::AnnotationStore;
use crate::config::{Config, Configurable};
use crate::error::TagStoreError;
use crate::extenttag::*;
use crate::file::*;
use crate::loader::{ExtentRecord, LinkRecord, LoadMode, LoadReport, TagRecord};
use crate::tagtype::TagKind;
use crate::types::*;

#[derive(Serialize, Deserialize)]
struct TagCsv<'a> {
    #[serde(rename = "Kind")]
    kind: TagKind,
    #[serde(rename = "Type")]
    tagtype: Cow<'a, str>,
    #[serde(rename = "Id")]
    id: Cow<'a, str>,
    #[serde(rename = "Spans")]
    spans: Cow<'a, str>,
    #[serde(rename = "Text")]
    text: Cow<'a, str>,
    #[serde(rename = "Arguments")]
    arguments: Cow<'a, str>,
    #[serde(rename = "Attributes")]
    attributes: Cow<'a, str>,
}

fn pack<'a, I>(pairs: I) -> Result<String, TagStoreError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let pairs: BTreeMap<&str, &str> = pairs.into_iter().collect();
    if pairs.is_empty() {
        return Ok(String::new());
    }
    serde_json::to_string(&pairs).map_err(|e| {
        TagStoreError::SerializationError(format!("Failure serializing CSV column: {}", e))
    })
}

fn unpack(packed: &str) -> Result<BTreeMap<String, String>, TagStoreError> {
    if packed.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    let deserializer = &mut serde_json::Deserializer::from_str(packed);
    serde_path_to_error::deserialize(deserializer)
        .map_err(|e| TagStoreError::JsonError(e, "(csv)".to_string(), "Reading CSV column"))
}

impl<'a> TagCsv<'a> {
    fn into_record(self) -> Result<TagRecord, TagStoreError> {
        let id = if self.id.is_empty() {
            None
        } else {
            Some(self.id.into_owned())
        };
        let attributes = unpack(&self.attributes)?;
        Ok(match self.kind {
            TagKind::Extent => TagRecord::Extent(ExtentRecord {
                tagtype: self.tagtype.into_owned(),
                id,
                spans: self.spans.into_owned(),
                text: if self.text.is_empty() {
                    None
                } else {
                    Some(self.text.into_owned())
                },
                attributes,
            }),
            TagKind::Link => TagRecord::Link(LinkRecord {
                tagtype: self.tagtype.into_owned(),
                id,
                arguments: unpack(&self.arguments)?,
                attributes,
            }),
        })
    }
}

#[sealed(pub(crate))]
pub trait ToCsv: TypeInfo {
    /// Writes CSV output to the writer
    fn to_csv_writer<W>(&self, writer: W) -> Result<(), TagStoreError>
    where
        W: std::io::Write;

    /// Writes CSV output to a file, `-` writes to standard output
    fn to_csv_file(&self, filename: &str, config: &Config) -> Result<(), TagStoreError> {
        debug(config, || {
            format!("{}.to_csv_file: filename={:?}", Self::typeinfo(), filename)
        });
        let mut writer = open_file_writer(filename, config)?;
        self.to_csv_writer(&mut writer)?;
        writer.flush().map_err(|e| {
            TagStoreError::IOError(e, filename.to_string(), "Flushing CSV output failed")
        })
    }

    /// Serializes to a CSV string
    fn to_csv_string(&self) -> Result<String, TagStoreError> {
        let mut buffer: Vec<u8> = Vec::new();
        self.to_csv_writer(&mut buffer)?;
        String::from_utf8(buffer).map_err(|e| {
            TagStoreError::SerializationError(format!("CSV output is not valid UTF-8: {}", e))
        })
    }
}

#[sealed]
impl ToCsv for AnnotationStore {
    fn to_csv_writer<W>(&self, writer: W) -> Result<(), TagStoreError>
    where
        W: std::io::Write,
    {
        let mut writer = csv::Writer::from_writer(writer);
        for tag in self.extent_tags() {
            writer
                .serialize(TagCsv {
                    kind: TagKind::Extent,
                    tagtype: Cow::Borrowed(tag.tagtype().as_ref().name()),
                    id: Cow::Borrowed(tag.as_ref().as_str()),
                    spans: Cow::Owned(tag.span().to_string()),
                    text: Cow::Borrowed(tag.as_ref().text()),
                    arguments: Cow::Borrowed(""),
                    attributes: Cow::Owned(pack(
                        tag.as_ref()
                            .attributes()
                            .iter()
                            .map(|(k, v)| (k.as_str(), v.as_str())),
                    )?),
                })
                .map_err(|e| {
                    TagStoreError::SerializationError(format!("Failure serializing CSV: {:?}", e))
                })?;
        }
        for tag in self.link_tags() {
            let arguments: Vec<(&str, &str)> = tag
                .arguments()
                .filter_map(|(role, extent)| extent.map(|extent| (role, extent.as_ref().as_str())))
                .collect();
            writer
                .serialize(TagCsv {
                    kind: TagKind::Link,
                    tagtype: Cow::Borrowed(tag.tagtype().as_ref().name()),
                    id: Cow::Borrowed(tag.as_ref().as_str()),
                    spans: Cow::Borrowed(""),
                    text: Cow::Borrowed(""),
                    arguments: Cow::Owned(pack(arguments)?),
                    attributes: Cow::Owned(pack(
                        tag.as_ref()
                            .attributes()
                            .iter()
                            .map(|(k, v)| (k.as_str(), v.as_str())),
                    )?),
                })
                .map_err(|e| {
                    TagStoreError::SerializationError(format!("Failure serializing CSV: {:?}", e))
                })?;
        }
        writer.flush().map_err(|e| {
            TagStoreError::IOError(e, "(csv)".to_string(), "Flushing CSV output failed")
        })
    }
}

impl AnnotationStore {
    /// Loads tags from CSV as written by [`ToCsv::to_csv_writer()`]
    pub fn load_csv_reader<R>(&mut self, reader: R, mode: LoadMode) -> Result<LoadReport, TagStoreError>
    where
        R: std::io::Read,
    {
        let mut reader = csv::Reader::from_reader(reader);
        let mut records = Vec::new();
        for row in reader.deserialize() {
            let row: TagCsv = row.map_err(|e| {
                TagStoreError::SerializationError(format!("Failure parsing CSV: {}", e))
            })?;
            records.push(row.into_record()?);
        }
        self.load_records(records, mode)
    }

    /// Loads tags from a CSV file, `-` reads from standard input
    pub fn load_csv_file(&mut self, filename: &str, mode: LoadMode) -> Result<LoadReport, TagStoreError> {
        debug(self.config(), || {
            format!("AnnotationStore.load_csv_file: filename={:?}", filename)
        });
        let reader = open_file_reader(filename, self.config())?;
        self.load_csv_reader(reader, mode)
    }
}
