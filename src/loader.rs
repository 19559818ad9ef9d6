/*
    TagStore Library (extent and link annotation store)
        by Maarten van Gompel <proycon@anaproy.nl>

        Licensed under the GNU General Public License v3
*/

//! This module contains the boundary used to load documents into an [`AnnotationStore`]. Readers of
//! annotation files produce [`TagRecord`]s, which still carry their spans in textual form, and hand
//! them to [`AnnotationStore::load_records()`]. The same records are used for JSON import and export.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::annotationstore::AnnotationStore;
use crate::config::{Config, Configurable};
use crate::error::TagStoreError;
use crate::extenttag::*;
use crate::file::*;
use crate::json::ToJson;
use crate::linktag::LinkTagBuilder;
use crate::span::Span;
use crate::tagtype::TagTypeRegistry;
use crate::types::*;

use std::sync::Arc;

/// A parsed extent tag, as read from an annotation file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtentRecord {
    /// Name of the tag type
    #[serde(rename = "type")]
    pub tagtype: String,

    /// Identifier, allocated on load if absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Span in textual form, e.g. `5~8,10~12` or `-1~-1`
    pub spans: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

/// A parsed link tag, as read from an annotation file. Arguments map roles to identifiers of extent tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    #[serde(rename = "type")]
    pub tagtype: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub arguments: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

/// A tag as read from an annotation file, to be passed to [`AnnotationStore::load_records()`]
#[derive(Debug, Clone, PartialEq)]
pub enum TagRecord {
    Extent(ExtentRecord),
    Link(LinkRecord),
}

impl ExtentRecord {
    pub fn new(tagtype: impl Into<String>, id: impl Into<String>, spans: impl Into<String>) -> Self {
        Self {
            tagtype: tagtype.into(),
            id: Some(id.into()),
            spans: spans.into(),
            text: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Parses the span and turns the record into a recipe for the store
    fn into_builder(self) -> Result<ExtentTagBuilder, TagStoreError> {
        let span = Span::parse(&self.spans)?;
        let mut builder = ExtentTagBuilder::new(self.tagtype).with_span(span);
        builder.id = self.id;
        builder.text = self.text;
        builder.attributes = self.attributes;
        Ok(builder)
    }
}

impl LinkRecord {
    pub fn new(tagtype: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            tagtype: tagtype.into(),
            id: Some(id.into()),
            arguments: BTreeMap::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_argument(mut self, role: impl Into<String>, extent_id: impl Into<String>) -> Self {
        self.arguments.insert(role.into(), extent_id.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    fn into_builder(self) -> LinkTagBuilder {
        let mut builder = LinkTagBuilder::new(self.tagtype);
        builder.id = self.id;
        builder.arguments = self.arguments.into_iter().collect();
        builder.attributes = self.attributes;
        builder
    }
}

impl From<ExtentRecord> for TagRecord {
    fn from(record: ExtentRecord) -> Self {
        Self::Extent(record)
    }
}

impl From<LinkRecord> for TagRecord {
    fn from(record: LinkRecord) -> Self {
        Self::Link(record)
    }
}

/// All tags of a store as records, this is the form in which a store is serialised to JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreRecords {
    #[serde(default)]
    pub extent_tags: Vec<ExtentRecord>,
    #[serde(default)]
    pub link_tags: Vec<LinkRecord>,
}

impl StoreRecords {
    /// Returns all records, extent tags first
    pub fn into_records(self) -> impl Iterator<Item = TagRecord> {
        self.extent_tags
            .into_iter()
            .map(TagRecord::Extent)
            .chain(self.link_tags.into_iter().map(TagRecord::Link))
    }
}

/// How to deal with records that can not be loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Skip invalid records with a warning, and report them in the [`LoadReport`]
    #[default]
    SkipInvalid,
    /// Abort the entire load on the first invalid record, nothing is loaded
    Strict,
}

/// Outcome of [`AnnotationStore::load_records()`]
#[derive(Debug, Default)]
pub struct LoadReport {
    extent_tags: usize,
    link_tags: usize,
    skipped: Vec<(Option<String>, TagStoreError)>,
}

impl LoadReport {
    /// Number of extent tags loaded
    pub fn extent_tags(&self) -> usize {
        self.extent_tags
    }

    /// Number of link tags loaded
    pub fn link_tags(&self) -> usize {
        self.link_tags
    }

    /// Records that were skipped, by identifier, along with the reason
    pub fn skipped(&self) -> &[(Option<String>, TagStoreError)] {
        &self.skipped
    }

    /// Were all records loaded?
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

impl AnnotationStore {
    /// Loads tags from records, as produced by a reader of annotation files.
    ///
    /// All records are loaded in a single batch: extent tags first, then link tags, so links may refer
    /// to extent tags regardless of the order of the records. Identifiers are kept verbatim.
    /// In [`LoadMode::Strict`], the first failure aborts the batch and is returned; in
    /// [`LoadMode::SkipInvalid`], failing records are skipped and listed in the [`LoadReport`].
    /// Link tags that refer to a skipped extent tag are skipped too.
    pub fn load_records<I>(&mut self, records: I, mode: LoadMode) -> Result<LoadReport, TagStoreError>
    where
        I: IntoIterator<Item = TagRecord>,
    {
        self.begin_batch()?;
        let mut report = LoadReport::default();
        let mut links = Vec::new();
        for record in records {
            match record {
                TagRecord::Extent(record) => {
                    let id = record.id.clone();
                    match record
                        .into_builder()
                        .and_then(|builder| self.create_extent_tag(builder))
                    {
                        Ok(_) => report.extent_tags += 1,
                        Err(err) => self.record_failure(&mut report, mode, id, err)?,
                    }
                }
                TagRecord::Link(record) => links.push(record),
            }
        }
        for record in links {
            let id = record.id.clone();
            match self.create_link_tag(record.into_builder()) {
                Ok(_) => report.link_tags += 1,
                Err(err) => self.record_failure(&mut report, mode, id, err)?,
            }
        }
        self.commit_batch()?;
        debug(self.config(), || {
            format!(
                "AnnotationStore.load_records: loaded {} extent tags and {} link tags, skipped {}",
                report.extent_tags,
                report.link_tags,
                report.skipped.len()
            )
        });
        Ok(report)
    }

    fn record_failure(
        &mut self,
        report: &mut LoadReport,
        mode: LoadMode,
        id: Option<String>,
        err: TagStoreError,
    ) -> Result<(), TagStoreError> {
        match mode {
            LoadMode::Strict => {
                self.abort_batch()?;
                Err(err)
            }
            LoadMode::SkipInvalid => {
                tracing::warn!(
                    target: "tagstore",
                    "skipping tag {}: {}",
                    id.as_deref().unwrap_or("(without identifier)"),
                    err
                );
                report.skipped.push((id, err));
                Ok(())
            }
        }
    }

    /// Returns all tags as records
    pub fn to_records(&self) -> StoreRecords {
        StoreRecords {
            extent_tags: self
                .extent_tags()
                .map(|tag| ExtentRecord {
                    tagtype: tag.tagtype().name().to_string(),
                    id: Some(tag.as_str().to_string()),
                    spans: tag.span().to_string(),
                    text: if tag.text().is_empty() {
                        None
                    } else {
                        Some(tag.text().to_string())
                    },
                    attributes: tag.attributes().clone(),
                })
                .collect(),
            link_tags: self
                .link_tags()
                .map(|tag| LinkRecord {
                    tagtype: tag.tagtype().name().to_string(),
                    id: Some(tag.as_str().to_string()),
                    arguments: tag
                        .arguments()
                        .filter_map(|(role, extent)| {
                            extent.map(|extent| (role.to_string(), extent.as_str().to_string()))
                        })
                        .collect(),
                    attributes: tag.attributes().clone(),
                })
                .collect(),
        }
    }

    /// Loads tags from a JSON string of the form `{"extent_tags": [...], "link_tags": [...]}`
    pub fn load_json_str(&mut self, string: &str, mode: LoadMode) -> Result<LoadReport, TagStoreError> {
        let deserializer = &mut serde_json::Deserializer::from_str(string);
        let result: Result<StoreRecords, _> = serde_path_to_error::deserialize(deserializer);
        let records = result.map_err(|e| {
            TagStoreError::JsonError(e, "(string)".to_string(), "Reading tags from string")
        })?;
        self.load_records(records.into_records(), mode)
    }

    /// Loads tags from a JSON file, see [`Self::load_json_str()`]
    pub fn load_json_file(&mut self, filename: &str, mode: LoadMode) -> Result<LoadReport, TagStoreError> {
        debug(self.config(), || {
            format!("AnnotationStore.load_json_file: filename={:?}", filename)
        });
        let reader = open_file_reader(filename, self.config())?;
        let deserializer = &mut serde_json::Deserializer::from_reader(reader);
        let result: Result<StoreRecords, _> = serde_path_to_error::deserialize(deserializer);
        let records = result.map_err(|e| {
            TagStoreError::JsonError(e, filename.to_string(), "Reading tags from file")
        })?;
        self.load_records(records.into_records(), mode)
    }

    /// Creates a store from a JSON string, failing if any tag is invalid
    pub fn from_json_str(
        string: &str,
        registry: Arc<TagTypeRegistry>,
        config: Config,
    ) -> Result<Self, TagStoreError> {
        let mut store = Self::new(registry, config);
        store.load_json_str(string, LoadMode::Strict)?;
        store.mark_unchanged();
        Ok(store)
    }

    /// Creates a store from a JSON file, failing if any tag is invalid
    pub fn from_json_file(
        filename: &str,
        registry: Arc<TagTypeRegistry>,
        config: Config,
    ) -> Result<Self, TagStoreError> {
        let mut store = Self::new(registry, config);
        store.load_json_file(filename, LoadMode::Strict)?;
        store.mark_unchanged();
        Ok(store)
    }

    /// Writes all tags to file, in the data format set in the configuration
    pub fn to_file(&self, filename: &str) -> Result<(), TagStoreError> {
        debug(self.config(), || {
            format!(
                "AnnotationStore.to_file: filename={:?} format={}",
                filename,
                self.config().dataformat()
            )
        });
        match self.config().dataformat() {
            DataFormat::Json { .. } => self.to_json_file(filename, self.config()),
            #[cfg(feature = "csv")]
            DataFormat::Csv => {
                use crate::csv::ToCsv;
                self.to_csv_file(filename, self.config())
            }
        }
    }
}
