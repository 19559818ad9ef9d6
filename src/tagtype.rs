/*
    TagStore Library (extent and link annotation store)
        by Maarten van Gompel <proycon@anaproy.nl>

        Licensed under the GNU General Public License v3
*/

//! This module contains the annotation schema: [`TagType`] definitions with their [`AttributeSpec`]s
//! and argument roles, and the [`TagTypeRegistry`] that holds them.
//!
//! The registry is populated once, when the schema is loaded, and is shared read-only
//! (behind an [`Arc`](std::sync::Arc)) by the [`crate::AnnotationStore`] and any other component
//! that needs schema introspection.

use sealed::sealed;
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::config::{Config, Configurable};
use crate::error::TagStoreError;
use crate::file::*;
use crate::json::{FromJson, ToJson};
use crate::store::*;
use crate::types::*;

/// Distinguishes tags anchored in the text from relations between such tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    /// Extent tags cover a span of text (or none at all, if non-consuming)
    Extent,
    /// Link tags relate extent tags via named argument roles and have no span of their own
    Link,
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Extent => write!(f, "extent"),
            Self::Link => write!(f, "link"),
        }
    }
}

/// The kind of values an attribute takes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AttributeKind {
    /// Free-form text
    #[default]
    Data,
    /// The value is the public ID of another tag in the store (or empty)
    IdRef,
    /// The value must be one of the listed values (or empty)
    Enumerated(Vec<String>),
}

/// Declares an attribute of a [`TagType`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSpec {
    name: String,
    #[serde(default)]
    required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default: Option<String>,
    #[serde(default)]
    kind: AttributeKind,
}

impl AttributeSpec {
    /// Declares a free-form attribute
    pub fn data(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
            default: None,
            kind: AttributeKind::Data,
        }
    }

    /// Declares an attribute that refers to another tag by ID
    pub fn idref(name: impl Into<String>) -> Self {
        Self {
            kind: AttributeKind::IdRef,
            ..Self::data(name)
        }
    }

    /// Declares an attribute with a closed set of values
    pub fn enumerated<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: AttributeKind::Enumerated(values.into_iter().map(|v| v.into()).collect()),
            ..Self::data(name)
        }
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn required(&self) -> bool {
        self.required
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn kind(&self) -> &AttributeKind {
        &self.kind
    }

    /// Tests whether the value is admissible for an enumerated attribute. Always true for other kinds.
    /// The empty value stands for 'unset' and is always admissible.
    pub fn admits(&self, value: &str) -> bool {
        match &self.kind {
            AttributeKind::Enumerated(values) => {
                value.is_empty() || values.iter().any(|v| v == value)
            }
            _ => true,
        }
    }
}

/// A `TagType` is an entry in the annotation schema: a named kind of tag, the prefix its
/// identifiers get, and the attributes (and for links, the argument roles) it declares.
#[derive(Debug, Clone)]
pub struct TagType {
    ///Internal numeric ID, corresponds with the index in the TagTypeRegistry. May be unbound (None) only during creation.
    intid: Option<TagTypeHandle>,
    name: String,
    prefix: String,
    kind: TagKind,
    nonconsuming: bool,
    attributes: Vec<AttributeSpec>,
    arguments: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TagTypeHandle(u16);

/// Maximum number of tag types a single registry can hold
pub const MAX_TAGTYPES: usize = u16::MAX as usize + 1;

#[sealed]
impl Handle for TagTypeHandle {
    fn new(intid: usize) -> Self {
        Self(intid as u16)
    }
    fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

#[sealed]
impl TypeInfo for TagType {
    fn typeinfo() -> Type {
        Type::TagType
    }
}

#[sealed]
impl Storable for TagType {
    type HandleType = TagTypeHandle;
    type StoreType = TagTypeRegistry;

    fn id(&self) -> Option<&str> {
        Some(self.name.as_str())
    }
    fn handle(&self) -> Option<TagTypeHandle> {
        self.intid
    }
    fn set_handle(&mut self, handle: TagTypeHandle) {
        self.intid = Some(handle);
    }
}

impl PartialEq<TagType> for TagType {
    fn eq(&self, other: &TagType) -> bool {
        self.name.to_lowercase() == other.name.to_lowercase()
    }
}

impl Serialize for TagType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("TagType", 6)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("prefix", &self.prefix)?;
        state.serialize_field("kind", &self.kind)?;
        if self.nonconsuming {
            state.serialize_field("nonconsuming", &self.nonconsuming)?;
        }
        state.serialize_field("attributes", &self.attributes)?;
        if self.kind == TagKind::Link {
            state.serialize_field("arguments", &self.arguments)?;
        }
        state.end()
    }
}

impl TagType {
    /// Returns the name of the tag type, in its declared casing
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the prefix that identifiers of tags of this type start with
    pub fn prefix(&self) -> &str {
        self.prefix.as_str()
    }

    pub fn kind(&self) -> TagKind {
        self.kind
    }

    pub fn is_extent(&self) -> bool {
        self.kind == TagKind::Extent
    }

    pub fn is_link(&self) -> bool {
        self.kind == TagKind::Link
    }

    /// Non-consuming extent tags do not anchor in the text, they carry the sentinel span
    pub fn is_nonconsuming(&self) -> bool {
        self.nonconsuming
    }

    /// Returns the declared attributes, in declaration order
    pub fn attributes(&self) -> &[AttributeSpec] {
        &self.attributes
    }

    /// Returns the declaration of the attribute with the given name
    pub fn attribute(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Returns the declared argument roles (link types only), in declaration order
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Returns the position of the argument role
    pub fn role_index(&self, role: &str) -> Option<usize> {
        self.arguments.iter().position(|r| r == role)
    }
}

/// Recipe for a [`TagType`], pass it to [`TagTypeRegistry::add_tagtype()`].
/// It can be deserialized from JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct TagTypeBuilder {
    name: String,
    prefix: String,
    kind: TagKind,
    #[serde(default)]
    nonconsuming: bool,
    #[serde(default)]
    attributes: Vec<AttributeSpec>,
    #[serde(default)]
    arguments: Vec<String>,
}

impl TagTypeBuilder {
    /// Start building an extent tag type
    pub fn extent(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            kind: TagKind::Extent,
            nonconsuming: false,
            attributes: Vec::new(),
            arguments: Vec::new(),
        }
    }

    /// Start building a link tag type
    pub fn link(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            kind: TagKind::Link,
            ..Self::extent(name, prefix)
        }
    }

    pub fn with_nonconsuming(mut self, value: bool) -> Self {
        self.nonconsuming = value;
        self
    }

    pub fn with_attribute(mut self, attribute: AttributeSpec) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Adds an argument role (link types only)
    pub fn with_argument(mut self, role: impl Into<String>) -> Self {
        self.arguments.push(role.into());
        self
    }

    /// Checks internal consistency and produces an unbound [`TagType`]
    pub fn build(self) -> Result<TagType, TagStoreError> {
        if self.name.trim().is_empty() {
            return Err(TagStoreError::InvalidSchema(
                self.name,
                "tag type name must not be empty",
            ));
        }
        if self.prefix.is_empty() {
            return Err(TagStoreError::InvalidSchema(
                self.name,
                "tag type prefix must not be empty",
            ));
        }
        match self.kind {
            TagKind::Extent if !self.arguments.is_empty() => {
                return Err(TagStoreError::InvalidSchema(
                    self.name,
                    "extent tag types can not declare argument roles",
                ));
            }
            TagKind::Link if self.nonconsuming => {
                return Err(TagStoreError::InvalidSchema(
                    self.name,
                    "only extent tag types can be non-consuming",
                ));
            }
            TagKind::Link if self.arguments.is_empty() => {
                return Err(TagStoreError::InvalidSchema(
                    self.name,
                    "link tag types must declare at least one argument role",
                ));
            }
            _ => {}
        }
        for (i, role) in self.arguments.iter().enumerate() {
            if role.is_empty() || self.arguments[..i].contains(role) {
                return Err(TagStoreError::InvalidSchema(
                    format!("{}.{}", self.name, role),
                    "argument roles must be non-empty and unique",
                ));
            }
        }
        for (i, attribute) in self.attributes.iter().enumerate() {
            if attribute.name.is_empty()
                || self.attributes[..i].iter().any(|a| a.name == attribute.name)
            {
                return Err(TagStoreError::InvalidSchema(
                    format!("{}.{}", self.name, attribute.name),
                    "attribute names must be non-empty and unique",
                ));
            }
            if let Some(default) = attribute.default.as_deref() {
                if !attribute.admits(default) {
                    return Err(TagStoreError::InvalidSchema(
                        format!("{}.{}", self.name, attribute.name),
                        "default value is not among the allowed values",
                    ));
                }
            }
        }
        Ok(TagType {
            intid: None,
            name: self.name,
            prefix: self.prefix,
            kind: self.kind,
            nonconsuming: self.nonconsuming,
            attributes: self.attributes,
            arguments: self.arguments,
        })
    }
}

/// Holds the annotation schema: all declared [`TagType`]s.
///
/// Lookups by name are case-insensitive. Both names and prefixes are unique in a registry.
#[derive(Debug)]
pub struct TagTypeRegistry {
    tagtypes: Store<TagType>,

    /// Maps lowercased names to handles
    names: HashMap<String, TagTypeHandle>,

    /// Maps prefixes to handles
    prefixes: HashMap<String, TagTypeHandle>,

    config: Config,
}

impl Default for TagTypeRegistry {
    fn default() -> Self {
        Self {
            tagtypes: Vec::new(),
            names: HashMap::new(),
            prefixes: HashMap::new(),
            config: Config::default(),
        }
    }
}

#[sealed]
impl TypeInfo for TagTypeRegistry {
    fn typeinfo() -> Type {
        Type::TagTypeRegistry
    }
}

impl Configurable for TagTypeRegistry {
    fn config(&self) -> &Config {
        &self.config
    }

    fn set_config(&mut self, config: Config) -> &mut Self {
        self.config = config;
        self
    }
}

#[sealed]
impl StoreFor<TagType> for TagTypeRegistry {
    fn store(&self) -> &Store<TagType> {
        &self.tagtypes
    }
    fn store_mut(&mut self) -> &mut Store<TagType> {
        &mut self.tagtypes
    }
    fn store_typeinfo() -> &'static str {
        "TagType in TagTypeRegistry"
    }

    fn preinsert(&self, item: &mut TagType) -> Result<(), TagStoreError> {
        if self.tagtypes.len() >= MAX_TAGTYPES {
            return Err(TagStoreError::InvalidSchema(
                item.name.clone(),
                "the registry can not hold any more tag types",
            ));
        }
        if self.names.contains_key(&item.name.to_lowercase()) {
            return Err(TagStoreError::InvalidSchema(
                item.name.clone(),
                "a tag type with this name (case-insensitive) already exists",
            ));
        }
        if self.prefixes.contains_key(&item.prefix) {
            return Err(TagStoreError::InvalidSchema(
                item.prefix.clone(),
                "a tag type with this prefix already exists",
            ));
        }
        Ok(())
    }

    fn inserted(&mut self, handle: TagTypeHandle) -> Result<(), TagStoreError> {
        let (name, prefix) = {
            let tagtype = self.get(handle)?;
            (tagtype.name.to_lowercase(), tagtype.prefix.clone())
        };
        self.names.insert(name, handle);
        self.prefixes.insert(prefix, handle);
        Ok(())
    }
}

impl TagTypeRegistry {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Adds a tag type to the registry
    pub fn add_tagtype(&mut self, builder: TagTypeBuilder) -> Result<TagTypeHandle, TagStoreError> {
        let tagtype = builder.build()?;
        debug(self.config(), || {
            format!(
                "TagTypeRegistry.add_tagtype: {} ({}, prefix {})",
                tagtype.name, tagtype.kind, tagtype.prefix
            )
        });
        self.insert(tagtype)
    }

    /// Builder pattern variant of [`Self::add_tagtype()`]
    pub fn with_tagtype(mut self, builder: TagTypeBuilder) -> Result<Self, TagStoreError> {
        self.add_tagtype(builder)?;
        Ok(self)
    }

    /// Resolves a tag type name (case-insensitive) to a handle
    pub fn resolve(&self, name: &str) -> Result<TagTypeHandle, TagStoreError> {
        self.names
            .get(&name.to_lowercase())
            .copied()
            .ok_or_else(|| TagStoreError::UnknownTagType(name.to_string(), "resolving tag type"))
    }

    /// Returns a tag type by name (case-insensitive)
    pub fn tagtype(&self, name: &str) -> Option<ResultItem<'_, TagType>> {
        let handle = self.resolve(name).ok()?;
        self.get(handle).ok().map(|t| ResultItem::new(t, self))
    }

    /// Returns a tag type by handle
    pub fn tagtype_by_handle(&self, handle: TagTypeHandle) -> Option<ResultItem<'_, TagType>> {
        self.get(handle).ok().map(|t| ResultItem::new(t, self))
    }

    /// Returns the tag type that issues identifiers with this prefix
    pub fn tagtype_by_prefix(&self, prefix: &str) -> Option<ResultItem<'_, TagType>> {
        let handle = self.prefixes.get(prefix)?;
        self.tagtype_by_handle(*handle)
    }

    /// Iterates over all tag types in declaration order
    pub fn tagtypes(&self) -> impl Iterator<Item = ResultItem<'_, TagType>> {
        self.iter().map(move |t| ResultItem::new(t, self))
    }

    /// Iterates over all extent tag types in declaration order
    pub fn extent_types(&self) -> impl Iterator<Item = ResultItem<'_, TagType>> {
        self.tagtypes().filter(|t| t.is_extent())
    }

    /// Iterates over all link tag types in declaration order
    pub fn link_types(&self) -> impl Iterator<Item = ResultItem<'_, TagType>> {
        self.tagtypes().filter(|t| t.is_link())
    }

    /// Returns the number of declared tag types
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Serialize for TagTypeRegistry {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("TagTypeRegistry", 1)?;
        let tagtypes: Vec<&TagType> = self.iter().collect();
        state.serialize_field("tagtypes", &tagtypes)?;
        state.end()
    }
}

impl ToJson for TagTypeRegistry {}

#[derive(Deserialize)]
struct TagTypeRegistryBuilder {
    tagtypes: Vec<TagTypeBuilder>,
}

impl TagTypeRegistryBuilder {
    fn build(self, config: Config) -> Result<TagTypeRegistry, TagStoreError> {
        let mut registry = TagTypeRegistry::new(config);
        for builder in self.tagtypes {
            registry.add_tagtype(builder)?;
        }
        Ok(registry)
    }
}

impl FromJson for TagTypeRegistry {
    /// Loads a schema from a JSON file of the form `{"tagtypes": [...]}`
    fn from_json_file(filename: &str, config: Config) -> Result<Self, TagStoreError> {
        debug(&config, || {
            format!("TagTypeRegistry::from_json_file: filename={:?}", filename)
        });
        let reader = open_file_reader(filename, &config)?;
        let deserializer = &mut serde_json::Deserializer::from_reader(reader);
        let result: Result<TagTypeRegistryBuilder, _> =
            serde_path_to_error::deserialize(deserializer);
        let builder = result.map_err(|e| {
            TagStoreError::JsonError(e, filename.to_string(), "Reading schema from file")
        })?;
        builder.build(config)
    }

    /// Loads a schema from a JSON string of the form `{"tagtypes": [...]}`
    fn from_json_str(string: &str, config: Config) -> Result<Self, TagStoreError> {
        let deserializer = &mut serde_json::Deserializer::from_str(string);
        let result: Result<TagTypeRegistryBuilder, _> =
            serde_path_to_error::deserialize(deserializer);
        let builder = result.map_err(|e| {
            TagStoreError::JsonError(e, "(string)".to_string(), "Reading schema from string")
        })?;
        builder.build(config)
    }
}
