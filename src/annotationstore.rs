/*
    TagStore Library (extent and link annotation store)
        by Maarten van Gompel <proycon@anaproy.nl>

        Licensed under the GNU General Public License v3
*/

//! This module contains the [`AnnotationStore`], which owns all extent tags and link tags of a document,
//! keeps the indices needed to query them, and guards the referential integrity between them.

use sealed::sealed;
use serde::{Serialize, Serializer};
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crate::config::{Config, Configurable};
use crate::error::TagStoreError;
use crate::extenttag::*;
use crate::idalloc::IdAllocator;
use crate::index::{CharacterIndex, DocumentText};
use crate::json::ToJson;
use crate::linktag::{LinkTag, LinkTagBuilder, LinkTagHandle};
use crate::results::GroupedTags;
use crate::span::Span;
use crate::store::*;
use crate::tagtype::{AttributeKind, TagKind, TagType, TagTypeHandle, TagTypeRegistry};
use crate::types::*;

/// An `AnnotationStore` holds all extent tags and link tags of one annotated document, validated against
/// a shared [`TagTypeRegistry`].
///
/// Tags are created through [`Self::create_extent_tag()`] and [`Self::create_link_tag()`], which are
/// atomic: a call that fails leaves the store unchanged. Deleting an extent tag also deletes every link
/// tag that has an argument bound to it.
///
/// Example:
///
/// ```
/// # use tagstore::*;
/// # use std::sync::Arc;
/// # fn main() -> Result<(), TagStoreError> {
/// let registry = TagTypeRegistry::new(Config::default())
///     .with_tagtype(TagTypeBuilder::extent("PERSON", "P"))?
///     .with_tagtype(TagTypeBuilder::link("KNOWS", "L").with_argument("from").with_argument("to"))?;
/// let mut store = AnnotationStore::new(Arc::new(registry), Config::default())
///     .with_text("Alice knows Bob")?;
/// store.create_extent_tag(ExtentTagBuilder::new("PERSON").with_span(Span::single(0, 5)?))?;
/// store.create_extent_tag(ExtentTagBuilder::new("PERSON").with_span(Span::single(12, 15)?))?;
/// store.create_link_tag(
///     LinkTagBuilder::new("KNOWS")
///         .with_argument("from", "P0")
///         .with_argument("to", "P1"),
/// )?;
/// assert_eq!(store.extent_tag("P1").map(|tag| tag.text()), Some("Bob"));
/// assert_eq!(store.links_referencing("P0")?.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct AnnotationStore {
    registry: Arc<TagTypeRegistry>,

    extent_tags: Store<ExtentTag>,
    link_tags: Store<LinkTag>,

    /// Links public IDs to internal handles
    extent_idmap: IdMap<ExtentTagHandle>,
    link_idmap: IdMap<LinkTagHandle>,

    allocator: IdAllocator,

    /// Maps character offsets to the extent tags covering them
    index: CharacterIndex,

    /// Extent tags with the non-consuming span, these have no entries in the character index
    nonconsuming: BTreeSet<ExtentTagHandle>,

    /// Reverse index for argument bindings
    extent_link_map: RelationMap<ExtentTagHandle, LinkTagHandle>,

    tagtype_extent_map: RelationMap<TagTypeHandle, ExtentTagHandle>,
    tagtype_link_map: RelationMap<TagTypeHandle, LinkTagHandle>,

    text: Option<DocumentText>,

    /// Tags created while a batch is open
    batch: Option<Batch>,

    /// Set while a batch is being committed, character index entries are then added in one pass
    deferred_indexing: bool,

    /// Has the store changed since it was last marked unchanged?
    changed: bool,

    config: Config,
}

/// Pending tags of an open batch. Handles are assigned on creation and correspond to the slots the
/// tags will occupy once committed.
#[derive(Debug)]
struct Batch {
    extent_tags: Vec<ExtentTag>,
    link_tags: Vec<LinkTag>,
    extent_ids: HashMap<String, ExtentTagHandle>,
    link_ids: HashSet<String>,

    /// State of the allocator when the batch began, restored on abort
    allocator: IdAllocator,
}

impl Batch {
    fn new(allocator: IdAllocator) -> Self {
        Self {
            extent_tags: Vec::new(),
            link_tags: Vec::new(),
            extent_ids: HashMap::new(),
            link_ids: HashSet::new(),
            allocator,
        }
    }

    fn contains_id(&self, id: &str) -> bool {
        self.extent_ids.contains_key(id) || self.link_ids.contains(id)
    }
}

#[sealed]
impl TypeInfo for AnnotationStore {
    fn typeinfo() -> Type {
        Type::AnnotationStore
    }
}

impl Configurable for AnnotationStore {
    fn config(&self) -> &Config {
        &self.config
    }

    fn set_config(&mut self, config: Config) -> &mut Self {
        self.config = config;
        self
    }
}

#[sealed]
impl StoreFor<ExtentTag> for AnnotationStore {
    fn store(&self) -> &Store<ExtentTag> {
        &self.extent_tags
    }
    fn store_mut(&mut self) -> &mut Store<ExtentTag> {
        &mut self.extent_tags
    }
    fn idmap(&self) -> Option<&IdMap<ExtentTagHandle>> {
        Some(&self.extent_idmap)
    }
    fn idmap_mut(&mut self) -> Option<&mut IdMap<ExtentTagHandle>> {
        Some(&mut self.extent_idmap)
    }
    fn store_typeinfo() -> &'static str {
        "ExtentTag in AnnotationStore"
    }

    fn preinsert(&self, item: &mut ExtentTag) -> Result<(), TagStoreError> {
        // identifiers are unique across both kinds of tags
        if let Some(id) = item.id() {
            if self.link_idmap.contains(id) {
                return Err(TagStoreError::DuplicateId(
                    id.to_string(),
                    "identifier is already used by a link tag",
                ));
            }
        }
        Ok(())
    }

    fn inserted(&mut self, handle: ExtentTagHandle) -> Result<(), TagStoreError> {
        let tag = match self.extent_tags.get(handle.as_usize()) {
            Some(Some(tag)) => tag,
            _ => return Err(TagStoreError::HandleError("ExtentTag in AnnotationStore")),
        };
        if tag.is_nonconsuming() {
            self.nonconsuming.insert(handle);
        } else if !self.deferred_indexing {
            self.index.insert(handle, tag.span());
        }
        self.tagtype_extent_map.insert(tag.tagtype_handle(), handle);
        self.changed = true;
        Ok(())
    }

    fn preremove(&mut self, handle: ExtentTagHandle) -> Result<(), TagStoreError> {
        if self.extent_link_map.count(handle) > 0 {
            return Err(TagStoreError::HandleError(
                "extent tag is still referenced by link tags",
            ));
        }
        let tag = match self.extent_tags.get(handle.as_usize()) {
            Some(Some(tag)) => tag,
            _ => return Err(TagStoreError::HandleError("ExtentTag in AnnotationStore")),
        };
        debug(&self.config, || {
            format!("AnnotationStore.preremove: extent tag {}", tag.as_str())
        });
        if tag.is_nonconsuming() {
            self.nonconsuming.remove(&handle);
        } else {
            self.index.remove(handle, tag.span());
        }
        self.tagtype_extent_map.remove(tag.tagtype_handle(), handle);
        self.changed = true;
        Ok(())
    }
}

#[sealed]
impl StoreFor<LinkTag> for AnnotationStore {
    fn store(&self) -> &Store<LinkTag> {
        &self.link_tags
    }
    fn store_mut(&mut self) -> &mut Store<LinkTag> {
        &mut self.link_tags
    }
    fn idmap(&self) -> Option<&IdMap<LinkTagHandle>> {
        Some(&self.link_idmap)
    }
    fn idmap_mut(&mut self) -> Option<&mut IdMap<LinkTagHandle>> {
        Some(&mut self.link_idmap)
    }
    fn store_typeinfo() -> &'static str {
        "LinkTag in AnnotationStore"
    }

    fn preinsert(&self, item: &mut LinkTag) -> Result<(), TagStoreError> {
        if let Some(id) = item.id() {
            if self.extent_idmap.contains(id) {
                return Err(TagStoreError::DuplicateId(
                    id.to_string(),
                    "identifier is already used by an extent tag",
                ));
            }
        }
        for extent in item.bound_handles() {
            if !matches!(self.extent_tags.get(extent.as_usize()), Some(Some(_))) {
                return Err(TagStoreError::HandleError(
                    "link tag argument refers to a removed extent tag",
                ));
            }
        }
        Ok(())
    }

    fn inserted(&mut self, handle: LinkTagHandle) -> Result<(), TagStoreError> {
        let tag = match self.link_tags.get(handle.as_usize()) {
            Some(Some(tag)) => tag,
            _ => return Err(TagStoreError::HandleError("LinkTag in AnnotationStore")),
        };
        for extent in tag.bound_handles() {
            self.extent_link_map.insert(extent, handle);
        }
        self.tagtype_link_map.insert(tag.tagtype_handle(), handle);
        self.changed = true;
        Ok(())
    }

    fn preremove(&mut self, handle: LinkTagHandle) -> Result<(), TagStoreError> {
        let tag = match self.link_tags.get(handle.as_usize()) {
            Some(Some(tag)) => tag,
            _ => return Err(TagStoreError::HandleError("LinkTag in AnnotationStore")),
        };
        debug(&self.config, || {
            format!("AnnotationStore.preremove: link tag {}", tag.as_str())
        });
        for extent in tag.bound_handles() {
            self.extent_link_map.remove(extent, handle);
        }
        self.tagtype_link_map.remove(tag.tagtype_handle(), handle);
        self.changed = true;
        Ok(())
    }
}

/// Looks up a tag type by name and checks it is of the expected kind
fn lookup_tagtype<'a>(
    registry: &'a TagTypeRegistry,
    name: &str,
    kind: TagKind,
) -> Result<&'a TagType, TagStoreError> {
    let tagtype = registry
        .tagtype(name)
        .ok_or_else(|| {
            TagStoreError::UnknownTagType(name.to_string(), "tag type is not declared")
        })?
        .as_ref();
    if tagtype.kind() != kind {
        return Err(TagStoreError::WrongTagKind(
            tagtype.name().to_string(),
            match kind {
                TagKind::Extent => "expected an extent tag type",
                TagKind::Link => "expected a link tag type",
            },
        ));
    }
    Ok(tagtype)
}

fn role_index(tagtype: &TagType, role: &str) -> Result<usize, TagStoreError> {
    tagtype.role_index(role).ok_or_else(|| {
        TagStoreError::UnknownRole(
            role.to_string(),
            tagtype.name().to_string(),
            "role is not declared for this link type",
        )
    })
}

/// Clears all IdRef attributes of the tag that refer to one of the given identifiers.
/// Returns true if anything was cleared.
fn clear_idrefs<T: Tag>(registry: &TagTypeRegistry, tag: &mut T, ids: &[String]) -> bool {
    let Some(tagtype) = registry.tagtype_by_handle(tag.tagtype_handle()) else {
        return false;
    };
    let mut cleared = false;
    for spec in tagtype.as_ref().attributes() {
        if *spec.kind() != AttributeKind::IdRef {
            continue;
        }
        if let Some(value) = tag.attributes_mut().get_mut(spec.name()) {
            if ids.iter().any(|id| id == value) {
                value.clear();
                cleared = true;
            }
        }
    }
    cleared
}

impl AnnotationStore {
    /// Creates a new empty store for tags of the types declared in the registry
    pub fn new(registry: Arc<TagTypeRegistry>, config: Config) -> Self {
        Self {
            registry,
            extent_tags: Store::new(),
            link_tags: Store::new(),
            extent_idmap: IdMap::new(),
            link_idmap: IdMap::new(),
            allocator: IdAllocator::new(),
            index: CharacterIndex::default(),
            nonconsuming: BTreeSet::new(),
            extent_link_map: RelationMap::new(),
            tagtype_extent_map: RelationMap::new(),
            tagtype_link_map: RelationMap::new(),
            text: None,
            batch: None,
            deferred_indexing: false,
            changed: false,
            config,
        }
    }

    /// Builder pattern to associate the document text. Tags added earlier are validated against it
    /// and get their text derived, as with [`Self::set_text()`].
    pub fn with_text(mut self, text: impl Into<String>) -> Result<Self, TagStoreError> {
        self.set_text(text)?;
        Ok(self)
    }

    /// Sets the document text and derives the text of all extent tags anew.
    /// Fails with [`TagStoreError::OffsetOutOfBounds`] (leaving the store unchanged) if any tag reaches beyond the new text.
    pub fn set_text(&mut self, text: impl Into<String>) -> Result<(), TagStoreError> {
        self.forbid_batch("set_text")?;
        let document = DocumentText::new(text.into());
        let mut texts: Vec<(ExtentTagHandle, String)> = Vec::with_capacity(self.extent_tags_len());
        for tag in StoreFor::<ExtentTag>::iter(self) {
            document.validate(tag.span())?;
            if !tag.is_nonconsuming() {
                texts.push((
                    tag.handle_or_err()?,
                    document.text_of(tag.span(), self.config.text_separator())?,
                ));
            }
        }
        for (handle, text) in texts {
            let tag: &mut ExtentTag = self.get_mut(handle)?;
            tag.set_text(text);
        }
        self.text = Some(document);
        self.changed = true;
        Ok(())
    }

    /// Returns the document text, if known
    pub fn text(&self) -> Option<&str> {
        self.text.as_ref().map(|document| document.as_str())
    }

    /// Returns the length of the document text in unicode points, if known
    pub fn textlen(&self) -> Option<usize> {
        self.text.as_ref().map(|document| document.textlen())
    }

    /// Returns the registry holding the tag types
    pub fn registry(&self) -> &TagTypeRegistry {
        &self.registry
    }

    /// Returns a shared reference to the registry, for other components that need schema introspection
    pub fn shared_registry(&self) -> Arc<TagTypeRegistry> {
        Arc::clone(&self.registry)
    }

    fn forbid_batch(&self, operation: &'static str) -> Result<(), TagStoreError> {
        if self.batch.is_some() {
            Err(TagStoreError::BatchError(operation))
        } else {
            Ok(())
        }
    }

    /// Is the identifier in use by a committed or pending tag?
    fn id_taken(&self, id: &str) -> bool {
        self.id_exists(id)
            || self
                .batch
                .as_ref()
                .map(|batch| batch.contains_id(id))
                .unwrap_or(false)
    }

    /// Obtains the identifier for a new tag: reserves the supplied one or allocates a fresh one
    fn acquire_id(&mut self, tagtype: &TagType, id: Option<String>) -> Result<String, TagStoreError> {
        match id {
            Some(id) => {
                if id.is_empty() {
                    return Err(TagStoreError::UnknownId(id, "identifiers may not be empty"));
                }
                if self.id_taken(&id) {
                    return Err(TagStoreError::DuplicateId(
                        id,
                        "identifier already exists in the store",
                    ));
                }
                self.allocator.reserve(tagtype, &id)?;
                Ok(id)
            }
            None if self.config.generate_ids() => {
                // skip over numbers claimed by tags of other types, without keeping them reserved for this type
                let mut collisions: Vec<String> = Vec::new();
                let result = loop {
                    match self.allocator.allocate(tagtype) {
                        Ok(id) if self.id_taken(&id) => collisions.push(id),
                        other => break other,
                    }
                };
                for id in collisions {
                    self.allocator.release(tagtype, &id);
                }
                result
            }
            None => Err(TagStoreError::UnknownId(
                String::new(),
                "no identifier supplied and identifier generation is disabled",
            )),
        }
    }

    fn release_id(&mut self, tagtype: TagTypeHandle, id: &str) {
        if self.config.reuse_ids() {
            if let Some(tagtype) = self.registry.tagtype_by_handle(tagtype) {
                self.allocator.release(&tagtype, id);
            }
        }
    }

    fn check_span(&self, tagtype: &TagType, span: &Span) -> Result<(), TagStoreError> {
        if tagtype.is_nonconsuming() != span.is_nonconsuming() {
            return Err(TagStoreError::InvalidSpanForType(
                span.to_string(),
                tagtype.name().to_string(),
                if tagtype.is_nonconsuming() {
                    "non-consuming tag types take the non-consuming span only"
                } else {
                    "the non-consuming span is not allowed for this tag type"
                },
            ));
        }
        if let Some(max) = self.config.max_span_length() {
            if span.len() > max {
                return Err(TagStoreError::OffsetOutOfBounds(
                    span.end().unwrap_or(0),
                    "span covers more offsets than the configured maximum span length",
                ));
            }
        }
        if let Some(document) = &self.text {
            document.validate(span)?;
        }
        Ok(())
    }

    /// Derives the text of a span from the document text, None if there is no document text
    fn derive_text(&self, span: &Span) -> Result<Option<String>, TagStoreError> {
        match &self.text {
            Some(_) if span.is_nonconsuming() => Ok(Some(String::new())),
            Some(document) => document
                .text_of(span, self.config.text_separator())
                .map(Some),
            None => Ok(None),
        }
    }

    /// Is the identifier one an IdRef attribute may refer to? Pending tags count while a batch is open.
    fn idref_target_exists(&self, id: &str) -> bool {
        self.id_taken(id)
    }

    fn validate_attribute(
        &self,
        tagtype: &TagType,
        name: &str,
        value: &str,
    ) -> Result<(), TagStoreError> {
        let spec = tagtype.attribute(name).ok_or_else(|| {
            TagStoreError::InvalidAttribute(
                name.to_string(),
                tagtype.name().to_string(),
                "attribute is not declared for this tag type",
            )
        })?;
        if !spec.admits(value) {
            return Err(TagStoreError::InvalidAttribute(
                name.to_string(),
                tagtype.name().to_string(),
                "value is not one of the declared values",
            ));
        }
        // in batches, references to tags that are loaded later are checked on commit
        if *spec.kind() == AttributeKind::IdRef
            && !value.is_empty()
            && self.batch.is_none()
            && !self.idref_target_exists(value)
        {
            return Err(TagStoreError::InvalidAttribute(
                name.to_string(),
                tagtype.name().to_string(),
                "attribute refers to a tag that does not exist",
            ));
        }
        Ok(())
    }

    /// Validates all attributes and fills in the declared defaults of absent ones
    fn validate_attributes(
        &self,
        tagtype: &TagType,
        mut attributes: BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, String>, TagStoreError> {
        for (name, value) in attributes.iter() {
            self.validate_attribute(tagtype, name, value)?;
        }
        for spec in tagtype.attributes() {
            if let Some(default) = spec.default_value() {
                if !attributes.contains_key(spec.name()) {
                    attributes.insert(spec.name().to_string(), default.to_string());
                }
            }
        }
        Ok(attributes)
    }

    /// Resolves the target of an argument binding, pending extent tags count while a batch is open
    fn resolve_argument(&self, role: &str, extent_id: &str) -> Result<ExtentTagHandle, TagStoreError> {
        if let Some(handle) = self.extent_idmap.get(extent_id) {
            return Ok(handle);
        }
        if let Some(batch) = &self.batch {
            if let Some(handle) = batch.extent_ids.get(extent_id) {
                return Ok(*handle);
            }
        }
        Err(TagStoreError::DanglingArgumentReference(
            role.to_string(),
            extent_id.to_string(),
            "no extent tag with this identifier",
        ))
    }

    /// Creates a new extent tag and returns its handle.
    ///
    /// Fails with [`TagStoreError::UnknownTagType`] or [`TagStoreError::WrongTagKind`] if the type is not a declared
    /// extent type, with [`TagStoreError::InvalidSpanForType`] if the span does not suit the type, with
    /// [`TagStoreError::InvalidAttribute`] on invalid attributes, and with [`TagStoreError::DuplicateId`] if a supplied
    /// identifier is already in use. On failure, nothing is changed and no identifier is consumed.
    ///
    /// While a batch is open the tag remains pending until [`Self::commit_batch()`].
    pub fn create_extent_tag(
        &mut self,
        builder: ExtentTagBuilder,
    ) -> Result<ExtentTagHandle, TagStoreError> {
        debug(&self.config, || {
            format!(
                "AnnotationStore.create_extent_tag: type={} id={:?}",
                builder.tagtype, builder.id
            )
        });
        let registry = Arc::clone(&self.registry);
        let tagtype = lookup_tagtype(&registry, &builder.tagtype, TagKind::Extent)?;
        let tagtype_handle = tagtype.handle_or_err()?;
        let span = match builder.span {
            Some(span) => span,
            None if tagtype.is_nonconsuming() => Span::nonconsuming(),
            None => {
                return Err(TagStoreError::InvalidSpanForType(
                    String::new(),
                    tagtype.name().to_string(),
                    "a span is required for this tag type",
                ))
            }
        };
        self.check_span(tagtype, &span)?;
        let attributes = self.validate_attributes(tagtype, builder.attributes)?;
        let text = match builder.text {
            Some(text) => text,
            None => self.derive_text(&span)?.unwrap_or_default(),
        };
        let id = self.acquire_id(tagtype, builder.id)?;

        let mut tag = ExtentTag::new(id.clone(), tagtype_handle, span, text, attributes);
        if let Some(batch) = self.batch.as_mut() {
            let handle = ExtentTagHandle::new(self.extent_tags.len() + batch.extent_tags.len());
            tag.set_handle(handle);
            batch.extent_tags.push(tag);
            batch.extent_ids.insert(id, handle);
            Ok(handle)
        } else {
            self.insert(tag).map_err(|err| {
                self.allocator.release(tagtype, &id);
                err
            })
        }
    }

    /// Builder pattern variant of [`Self::create_extent_tag()`]
    pub fn with_extent_tag(mut self, builder: ExtentTagBuilder) -> Result<Self, TagStoreError> {
        self.create_extent_tag(builder)?;
        Ok(self)
    }

    /// Builder pattern variant of [`Self::create_link_tag()`]
    pub fn with_link_tag(mut self, builder: LinkTagBuilder) -> Result<Self, TagStoreError> {
        self.create_link_tag(builder)?;
        Ok(self)
    }

    /// Creates a new link tag and returns its handle.
    ///
    /// Arguments are bound by role; roles left out remain unbound and can be bound later with [`Self::bind_argument()`].
    /// Fails with [`TagStoreError::TooManyArguments`] if more bindings than roles are given, with
    /// [`TagStoreError::UnknownRole`] for undeclared (or repeated) roles, and with [`TagStoreError::DanglingArgumentReference`]
    /// if a bound extent tag does not exist. On failure, nothing is changed.
    pub fn create_link_tag(&mut self, builder: LinkTagBuilder) -> Result<LinkTagHandle, TagStoreError> {
        debug(&self.config, || {
            format!(
                "AnnotationStore.create_link_tag: type={} id={:?}",
                builder.tagtype, builder.id
            )
        });
        let registry = Arc::clone(&self.registry);
        let tagtype = lookup_tagtype(&registry, &builder.tagtype, TagKind::Link)?;
        let tagtype_handle = tagtype.handle_or_err()?;
        let roles = tagtype.arguments().len();
        if builder.arguments.len() > roles {
            return Err(TagStoreError::TooManyArguments(
                builder.arguments.len(),
                roles,
                tagtype.name().to_string(),
            ));
        }
        let mut arguments: SmallVec<[Option<ExtentTagHandle>; 2]> = SmallVec::from_elem(None, roles);
        for (role, extent_id) in builder.arguments.iter() {
            let index = role_index(tagtype, role)?;
            if arguments[index].is_some() {
                return Err(TagStoreError::UnknownRole(
                    role.clone(),
                    tagtype.name().to_string(),
                    "role is bound more than once",
                ));
            }
            arguments[index] = Some(self.resolve_argument(role, extent_id)?);
        }
        let attributes = self.validate_attributes(tagtype, builder.attributes)?;
        let id = self.acquire_id(tagtype, builder.id)?;

        let mut tag = LinkTag::new(id.clone(), tagtype_handle, arguments, attributes);
        if let Some(batch) = self.batch.as_mut() {
            let handle = LinkTagHandle::new(self.link_tags.len() + batch.link_tags.len());
            tag.set_handle(handle);
            batch.link_tags.push(tag);
            batch.link_ids.insert(id);
            Ok(handle)
        } else {
            self.insert(tag).map_err(|err| {
                self.allocator.release(tagtype, &id);
                err
            })
        }
    }

    /// Binds (or rebinds) an argument role of an existing link tag to an extent tag
    pub fn bind_argument(
        &mut self,
        link_id: &str,
        role: &str,
        extent_id: &str,
    ) -> Result<(), TagStoreError> {
        self.forbid_batch("bind_argument")?;
        let (handle, index) = self.resolve_role(link_id, role)?;
        let extent = self.resolve_argument(role, extent_id)?;
        self.set_argument(handle, index, Some(extent))
    }

    /// Unbinds an argument role of an existing link tag, leaving the link underspecified
    pub fn unbind_argument(&mut self, link_id: &str, role: &str) -> Result<(), TagStoreError> {
        self.forbid_batch("unbind_argument")?;
        let (handle, index) = self.resolve_role(link_id, role)?;
        self.set_argument(handle, index, None)
    }

    fn resolve_role(&self, link_id: &str, role: &str) -> Result<(LinkTagHandle, usize), TagStoreError> {
        let handle = self.link_idmap.get(link_id).ok_or_else(|| {
            TagStoreError::UnknownId(link_id.to_string(), "no link tag with this identifier")
        })?;
        let link: &LinkTag = self.get(handle)?;
        let tagtype = self
            .registry
            .tagtype_by_handle(link.tagtype_handle())
            .ok_or(TagStoreError::HandleError("tag type of link tag"))?;
        Ok((handle, role_index(&tagtype, role)?))
    }

    fn set_argument(
        &mut self,
        handle: LinkTagHandle,
        index: usize,
        extent: Option<ExtentTagHandle>,
    ) -> Result<(), TagStoreError> {
        let link: &mut LinkTag = self.get_mut(handle)?;
        let previous = link.set_argument(index, extent);
        let stale = previous.filter(|previous| !link.refers_to(*previous));
        if let Some(previous) = stale {
            self.extent_link_map.remove(previous, handle);
        }
        if let Some(extent) = extent {
            self.extent_link_map.insert(extent, handle);
        }
        self.changed = true;
        Ok(())
    }

    /// Deletes an extent tag along with every link tag that has an argument bound to it.
    /// Returns the identifiers of the deleted link tags. IdRef attributes referring to any deleted tag are cleared.
    ///
    /// The deletion is atomic: if it fails, the store is unchanged.
    pub fn delete_extent_tag(&mut self, id: &str) -> Result<Vec<String>, TagStoreError> {
        self.forbid_batch("delete_extent_tag")?;
        let handle = self.extent_idmap.get(id).ok_or_else(|| {
            TagStoreError::UnknownId(id.to_string(), "no extent tag with this identifier")
        })?;
        debug(&self.config, || {
            format!("AnnotationStore.delete_extent_tag: {}", id)
        });
        let links: Vec<LinkTagHandle> = self
            .extent_link_map
            .get(handle)
            .cloned()
            .unwrap_or_default();

        // verify the entire cascade before removing anything
        let mut removed: Vec<(LinkTagHandle, TagTypeHandle, String)> = Vec::with_capacity(links.len());
        for link in links {
            let tag: &LinkTag = self.get(link)?;
            removed.push((link, tag.tagtype_handle(), tag.as_str().to_string()));
        }
        let tagtype = {
            let tag: &ExtentTag = self.get(handle)?;
            tag.tagtype_handle()
        };

        for (link, link_tagtype, link_id) in removed.iter() {
            StoreFor::<LinkTag>::remove(self, *link)?;
            self.release_id(*link_tagtype, link_id);
        }
        StoreFor::<ExtentTag>::remove(self, handle)?;
        self.release_id(tagtype, id);

        let deleted: Vec<String> = removed.into_iter().map(|(_, _, id)| id).collect();
        let mut cleared = deleted.clone();
        cleared.push(id.to_string());
        self.clear_idrefs_to(&cleared);
        Ok(deleted)
    }

    /// Deletes a link tag, nothing depends on it so there is no cascade
    pub fn delete_link_tag(&mut self, id: &str) -> Result<(), TagStoreError> {
        self.forbid_batch("delete_link_tag")?;
        let handle = self.link_idmap.get(id).ok_or_else(|| {
            TagStoreError::UnknownId(id.to_string(), "no link tag with this identifier")
        })?;
        debug(&self.config, || format!("AnnotationStore.delete_link_tag: {}", id));
        let tagtype = {
            let tag: &LinkTag = self.get(handle)?;
            tag.tagtype_handle()
        };
        StoreFor::<LinkTag>::remove(self, handle)?;
        self.release_id(tagtype, id);
        self.clear_idrefs_to(&[id.to_string()]);
        Ok(())
    }

    /// Clears IdRef attributes, on any tag, that refer to one of the (deleted) identifiers
    fn clear_idrefs_to(&mut self, ids: &[String]) {
        let registry = Arc::clone(&self.registry);
        let mut cleared = false;
        for tag in self.extent_tags.iter_mut().flatten() {
            cleared |= clear_idrefs(&registry, tag, ids);
        }
        for tag in self.link_tags.iter_mut().flatten() {
            cleared |= clear_idrefs(&registry, tag, ids);
        }
        if cleared {
            debug(&self.config, || {
                format!("AnnotationStore: cleared references to {:?}", ids)
            });
        }
    }

    /// Moves an extent tag to a new span, its index entries and text are updated accordingly
    pub fn set_span(&mut self, id: &str, span: Span) -> Result<(), TagStoreError> {
        self.forbid_batch("set_span")?;
        let handle = self.extent_idmap.get(id).ok_or_else(|| {
            TagStoreError::UnknownId(id.to_string(), "no extent tag with this identifier")
        })?;
        let registry = Arc::clone(&self.registry);
        let tagtype = {
            let tag: &ExtentTag = self.get(handle)?;
            registry
                .tagtype_by_handle(tag.tagtype_handle())
                .ok_or(TagStoreError::HandleError("tag type of extent tag"))?
        };
        self.check_span(&tagtype, &span)?;
        let text = self.derive_text(&span)?;

        let tag: &mut ExtentTag = self.get_mut(handle)?;
        let old = tag.set_span(span.clone());
        if let Some(text) = text {
            tag.set_text(text);
        }
        if !old.is_nonconsuming() {
            self.index.remove(handle, &old);
            self.index.insert(handle, &span);
        }
        self.changed = true;
        Ok(())
    }

    /// Sets an attribute on an extent tag or a link tag, the value is validated against the tag type.
    /// The empty value unsets the attribute.
    pub fn set_attribute(
        &mut self,
        id: &str,
        name: &str,
        value: impl Into<String>,
    ) -> Result<(), TagStoreError> {
        self.forbid_batch("set_attribute")?;
        let value = value.into();
        if let Some(handle) = self.extent_idmap.get(id) {
            self.update_attribute::<ExtentTag>(handle, name, value)
        } else if let Some(handle) = self.link_idmap.get(id) {
            self.update_attribute::<LinkTag>(handle, name, value)
        } else {
            Err(TagStoreError::UnknownId(
                id.to_string(),
                "no tag with this identifier",
            ))
        }
    }

    fn update_attribute<T>(
        &mut self,
        handle: T::HandleType,
        name: &str,
        value: String,
    ) -> Result<(), TagStoreError>
    where
        T: Tag,
        Self: StoreFor<T>,
    {
        let registry = Arc::clone(&self.registry);
        let tagtype = registry
            .tagtype_by_handle(StoreFor::<T>::get(self, handle)?.tagtype_handle())
            .ok_or(TagStoreError::HandleError("tag type of tag"))?;
        self.validate_attribute(&tagtype, name, &value)?;
        let tag = StoreFor::<T>::get_mut(self, handle)?;
        tag.attributes_mut().insert(name.to_string(), value);
        self.changed = true;
        Ok(())
    }

    /// Opens a batch. Tags created while the batch is open stay invisible to all queries until
    /// [`Self::commit_batch()`]; deleting and editing tags is not possible until then.
    /// Used when loading documents.
    pub fn begin_batch(&mut self) -> Result<(), TagStoreError> {
        if self.batch.is_some() {
            return Err(TagStoreError::BatchError(
                "begin_batch: a batch is already open",
            ));
        }
        debug(&self.config, || "AnnotationStore.begin_batch".to_string());
        self.batch = Some(Batch::new(self.allocator.clone()));
        Ok(())
    }

    /// Makes all tags created in the open batch visible at once.
    /// The character index is updated in one pass. IdRef attributes that refer to tags that
    /// still do not exist are cleared.
    pub fn commit_batch(&mut self) -> Result<(), TagStoreError> {
        let batch = self.batch.take().ok_or(TagStoreError::BatchError(
            "commit_batch: no batch is open",
        ))?;
        debug(&self.config, || {
            format!(
                "AnnotationStore.commit_batch: {} extent tags, {} link tags",
                batch.extent_tags.len(),
                batch.link_tags.len()
            )
        });
        let first_extent = self.extent_tags.len();
        let first_link = self.link_tags.len();

        self.deferred_indexing = true;
        let result = batch
            .extent_tags
            .into_iter()
            .try_for_each(|tag| self.insert(tag).map(|_| ()));
        self.deferred_indexing = false;
        result?;
        self.index.extend(
            self.extent_tags[first_extent..]
                .iter()
                .flatten()
                .filter(|tag| !tag.is_nonconsuming())
                .filter_map(|tag| Some((tag.handle()?, tag.span()))),
        );
        for tag in batch.link_tags {
            self.insert(tag)?;
        }

        self.clear_dangling_idrefs(first_extent, first_link);
        Ok(())
    }

    /// Discards all tags created in the open batch, identifiers allocated for them are available again
    pub fn abort_batch(&mut self) -> Result<(), TagStoreError> {
        let batch = self.batch.take().ok_or(TagStoreError::BatchError(
            "abort_batch: no batch is open",
        ))?;
        debug(&self.config, || {
            format!(
                "AnnotationStore.abort_batch: discarding {} extent tags, {} link tags",
                batch.extent_tags.len(),
                batch.link_tags.len()
            )
        });
        self.allocator = batch.allocator;
        Ok(())
    }

    /// Is a batch open?
    pub fn in_batch(&self) -> bool {
        self.batch.is_some()
    }

    /// Clears IdRef attributes of newly committed tags that refer to nonexistent tags
    fn clear_dangling_idrefs(&mut self, first_extent: usize, first_link: usize) {
        let registry = Arc::clone(&self.registry);
        let mut dangling: Vec<String> = Vec::new();
        for tag in self.extent_tags[first_extent..].iter().flatten() {
            self.collect_dangling_idrefs(&registry, tag, &mut dangling);
        }
        for tag in self.link_tags[first_link..].iter().flatten() {
            self.collect_dangling_idrefs(&registry, tag, &mut dangling);
        }
        if !dangling.is_empty() {
            tracing::warn!(
                target: "tagstore",
                "clearing attributes that refer to nonexistent tags: {:?}",
                dangling
            );
            self.clear_idrefs_to(&dangling);
        }
    }

    fn collect_dangling_idrefs<T: Tag>(
        &self,
        registry: &TagTypeRegistry,
        tag: &T,
        dangling: &mut Vec<String>,
    ) {
        if let Some(tagtype) = registry.tagtype_by_handle(tag.tagtype_handle()) {
            for spec in tagtype.as_ref().attributes() {
                if *spec.kind() != AttributeKind::IdRef {
                    continue;
                }
                if let Some(value) = tag.attribute(spec.name()) {
                    if !value.is_empty() && !self.id_exists(value) {
                        dangling.push(value.to_string());
                    }
                }
            }
        }
    }

    /// Returns the extent tags covering the offset, in creation order
    pub fn tags_at(&self, offset: usize) -> Vec<ResultItem<'_, ExtentTag>> {
        self.index
            .at(offset)
            .iter()
            .filter_map(|handle| self.extent_tag_by_handle(*handle))
            .collect()
    }

    /// Returns the extent tags covering any offset in `[begin, end)`, grouped by type.
    /// If `begin == end`, this returns the tags covering `begin`.
    pub fn tags_in_range(&self, begin: usize, end: usize) -> GroupedTags<'_, ExtentTag> {
        let mut handles = BTreeSet::new();
        self.collect_range(begin, end, &mut handles);
        self.group_extent_tags(handles)
    }

    /// Returns the extent tags covering any of the ranges, plus all non-consuming extent tags, grouped by type
    pub fn tags_in_ranges_plus_nonconsuming<I>(&self, ranges: I) -> GroupedTags<'_, ExtentTag>
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        let mut handles = BTreeSet::new();
        for (begin, end) in ranges {
            self.collect_range(begin, end, &mut handles);
        }
        handles.extend(self.nonconsuming.iter().copied());
        self.group_extent_tags(handles)
    }

    fn collect_range(&self, begin: usize, end: usize, handles: &mut BTreeSet<ExtentTagHandle>) {
        if end <= begin {
            handles.extend(self.index.at(begin).iter().copied());
        } else {
            handles.extend(self.index.range(begin, end));
        }
    }

    fn group_extent_tags(&self, handles: BTreeSet<ExtentTagHandle>) -> GroupedTags<'_, ExtentTag> {
        let mut groups = GroupedTags::new(&self.registry);
        for handle in handles {
            if let Some(tag) = self.extent_tag_by_handle(handle) {
                groups.push(tag);
            }
        }
        groups
    }

    /// Returns the link tags with an argument bound to the extent tag, grouped by type
    pub fn links_referencing(&self, extent_id: &str) -> Result<GroupedTags<'_, LinkTag>, TagStoreError> {
        let handle = self.extent_idmap.get(extent_id).ok_or_else(|| {
            TagStoreError::UnknownId(extent_id.to_string(), "no extent tag with this identifier")
        })?;
        Ok(self.links_referencing_handle(handle))
    }

    pub(crate) fn links_referencing_handle(&self, handle: ExtentTagHandle) -> GroupedTags<'_, LinkTag> {
        let mut handles: Vec<LinkTagHandle> = self
            .extent_link_map
            .get(handle)
            .cloned()
            .unwrap_or_default();
        handles.sort_unstable();
        let mut groups = GroupedTags::new(&self.registry);
        for handle in handles {
            if let Some(tag) = self.link_tag_by_handle(handle) {
                groups.push(tag);
            }
        }
        groups
    }

    /// Is the identifier used by any (committed) extent tag or link tag?
    pub fn id_exists(&self, id: &str) -> bool {
        self.extent_idmap.contains(id) || self.link_idmap.contains(id)
    }

    /// Returns an extent tag by its public identifier
    pub fn extent_tag(&self, id: &str) -> Option<ResultItem<'_, ExtentTag>> {
        self.extent_idmap
            .get(id)
            .and_then(|handle| self.extent_tag_by_handle(handle))
    }

    /// Returns a link tag by its public identifier
    pub fn link_tag(&self, id: &str) -> Option<ResultItem<'_, LinkTag>> {
        self.link_idmap
            .get(id)
            .and_then(|handle| self.link_tag_by_handle(handle))
    }

    pub fn extent_tag_by_handle(&self, handle: ExtentTagHandle) -> Option<ResultItem<'_, ExtentTag>> {
        let tag: &ExtentTag = self.get(handle).ok()?;
        Some(ResultItem::new(tag, self))
    }

    pub fn link_tag_by_handle(&self, handle: LinkTagHandle) -> Option<ResultItem<'_, LinkTag>> {
        let tag: &LinkTag = self.get(handle).ok()?;
        Some(ResultItem::new(tag, self))
    }

    /// Iterates over all extent tags, in creation order
    pub fn extent_tags(&self) -> impl Iterator<Item = ResultItem<'_, ExtentTag>> {
        StoreFor::<ExtentTag>::iter(self).map(move |tag| ResultItem::new(tag, self))
    }

    /// Iterates over all link tags, in creation order
    pub fn link_tags(&self) -> impl Iterator<Item = ResultItem<'_, LinkTag>> {
        StoreFor::<LinkTag>::iter(self).map(move |tag| ResultItem::new(tag, self))
    }

    /// Returns all extent tags of the given type
    pub fn extent_tags_by_type(&self, tagtype: &str) -> Result<Vec<ResultItem<'_, ExtentTag>>, TagStoreError> {
        let handle = lookup_tagtype(&self.registry, tagtype, TagKind::Extent)?.handle_or_err()?;
        Ok(self
            .tagtype_extent_map
            .get(handle)
            .map(|handles| {
                handles
                    .iter()
                    .filter_map(|handle| self.extent_tag_by_handle(*handle))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Returns all link tags of the given type
    pub fn link_tags_by_type(&self, tagtype: &str) -> Result<Vec<ResultItem<'_, LinkTag>>, TagStoreError> {
        let handle = lookup_tagtype(&self.registry, tagtype, TagKind::Link)?.handle_or_err()?;
        Ok(self
            .tagtype_link_map
            .get(handle)
            .map(|handles| {
                handles
                    .iter()
                    .filter_map(|handle| self.link_tag_by_handle(*handle))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Returns the number of extent tags (pending tags not included)
    pub fn extent_tags_len(&self) -> usize {
        self.extent_idmap.len()
    }

    /// Returns the number of link tags (pending tags not included)
    pub fn link_tags_len(&self) -> usize {
        self.link_idmap.len()
    }

    /// Returns the identifiers of all underspecified tags: link tags with unbound roles and tags
    /// that lack a value for a required attribute. Extent tags are listed before link tags.
    pub fn incomplete_tags(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = StoreFor::<ExtentTag>::iter(self)
            .filter(|tag| self.lacks_required(*tag))
            .map(|tag| tag.as_str())
            .collect();
        ids.extend(
            StoreFor::<LinkTag>::iter(self)
                .filter(|tag| !tag.is_fully_bound() || self.lacks_required(*tag))
                .map(|tag| tag.as_str()),
        );
        ids
    }

    fn lacks_required<T: Tag>(&self, tag: &T) -> bool {
        self.registry
            .tagtype_by_handle(tag.tagtype_handle())
            .map(|tagtype| {
                tagtype.as_ref().attributes().iter().any(|spec| {
                    spec.required()
                        && tag
                            .attribute(spec.name())
                            .map(|value| value.is_empty())
                            .unwrap_or(true)
                })
            })
            .unwrap_or(false)
    }

    /// Has the store been modified since it was created or last marked unchanged?
    pub fn changed(&self) -> bool {
        self.changed
    }

    /// Marks the store as unchanged, e.g. after it was saved
    pub fn mark_unchanged(&mut self) {
        self.changed = false;
    }
}

impl Serialize for AnnotationStore {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_records().serialize(serializer)
    }
}

impl ToJson for AnnotationStore {}
