/*
    TagStore Library (extent and link annotation store)
        by Maarten van Gompel <proycon@anaproy.nl>

        Licensed under the GNU General Public License v3
*/

//! This module contains the [`LinkTag`] type, which relates extent tags to one another through the
//! named argument roles of its [`TagType`], and the [`LinkTagBuilder`] recipe to create one.

use sealed::sealed;
use smallvec::SmallVec;
use std::collections::BTreeMap;

use crate::annotationstore::AnnotationStore;
use crate::extenttag::*;
use crate::store::*;
use crate::tagtype::{TagType, TagTypeHandle};
use crate::types::*;

/// A `LinkTag` is an instance of a link [`TagType`]. It has no span of its own; instead each argument
/// role of its type is either bound to an [`ExtentTag`] or unbound (underspecified).
#[derive(Debug, Clone)]
pub struct LinkTag {
    intid: Option<LinkTagHandle>,

    id: String,

    tagtype: TagTypeHandle,

    /// Argument bindings, aligned with the argument roles of the tag type
    arguments: SmallVec<[Option<ExtentTagHandle>; 2]>,

    attributes: BTreeMap<String, String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkTagHandle(u32);

#[sealed]
impl Handle for LinkTagHandle {
    fn new(intid: usize) -> Self {
        Self(intid as u32)
    }
    fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

#[sealed]
impl TypeInfo for LinkTag {
    fn typeinfo() -> Type {
        Type::LinkTag
    }
}

#[sealed]
impl Storable for LinkTag {
    type HandleType = LinkTagHandle;
    type StoreType = AnnotationStore;

    fn id(&self) -> Option<&str> {
        Some(self.id.as_str())
    }
    fn handle(&self) -> Option<LinkTagHandle> {
        self.intid
    }
    fn set_handle(&mut self, handle: LinkTagHandle) {
        self.intid = Some(handle);
    }
}

#[sealed]
impl Tag for LinkTag {
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

impl PartialEq<LinkTag> for LinkTag {
    fn eq(&self, other: &LinkTag) -> bool {
        self.id == other.id
            && self.tagtype == other.tagtype
            && self.arguments == other.arguments
            && self.attributes == other.attributes
    }
}

impl LinkTag {
    pub(crate) fn new(
        id: String,
        tagtype: TagTypeHandle,
        arguments: SmallVec<[Option<ExtentTagHandle>; 2]>,
        attributes: BTreeMap<String, String>,
    ) -> Self {
        Self {
            intid: None,
            id,
            tagtype,
            arguments,
            attributes,
        }
    }

    /// Returns the public identifier
    pub fn as_str(&self) -> &str {
        self.id.as_str()
    }

    /// Iterates over all extent tags bound to any argument
    pub fn bound_handles(&self) -> impl Iterator<Item = ExtentTagHandle> + '_ {
        self.arguments.iter().filter_map(|a| *a)
    }

    /// Does any argument of this link refer to the given extent tag?
    pub fn refers_to(&self, extent: ExtentTagHandle) -> bool {
        self.arguments.iter().any(|a| *a == Some(extent))
    }

    /// Returns true if all argument roles are bound
    pub fn is_fully_bound(&self) -> bool {
        self.arguments.iter().all(|a| a.is_some())
    }

    pub(crate) fn set_argument(
        &mut self,
        index: usize,
        extent: Option<ExtentTagHandle>,
    ) -> Option<ExtentTagHandle> {
        std::mem::replace(&mut self.arguments[index], extent)
    }
}

impl<'store> ResultItem<'store, LinkTag> {
    pub fn as_str(&self) -> &'store str {
        self.as_ref().as_str()
    }

    /// Returns the tag type of this tag
    pub fn tagtype(&self) -> ResultItem<'store, TagType> {
        self.store()
            .registry()
            .tagtype_by_handle(self.as_ref().tagtype_handle())
            .expect("tag type of a stored tag must exist")
    }

    /// Iterates over all argument roles along with the extent tag bound to each (if any)
    pub fn arguments(
        &self,
    ) -> impl Iterator<Item = (&'store str, Option<ResultItem<'store, ExtentTag>>)> + 'store {
        let store = self.store();
        let tagtype = self.tagtype().as_ref();
        tagtype
            .arguments()
            .iter()
            .zip(self.as_ref().arguments.iter())
            .map(move |(role, handle)| {
                (
                    role.as_str(),
                    handle.and_then(|handle| store.extent_tag_by_handle(handle)),
                )
            })
    }

    /// Returns the extent tag bound to the given role, None if the role is unbound or does not exist
    pub fn argument(&self, role: &str) -> Option<ResultItem<'store, ExtentTag>> {
        let index = self.tagtype().role_index(role)?;
        let handle = self.as_ref().arguments.get(index).copied().flatten()?;
        self.store().extent_tag_by_handle(handle)
    }
}

/// Recipe for a [`LinkTag`]: pass it to [`AnnotationStore::create_link_tag()`].
/// Arguments are bound by role name to the public ID of an extent tag; roles may be left unbound.
#[derive(Debug, Clone, Default)]
pub struct LinkTagBuilder {
    pub(crate) tagtype: String,
    pub(crate) id: Option<String>,
    pub(crate) arguments: Vec<(String, String)>,
    pub(crate) attributes: BTreeMap<String, String>,
}

impl LinkTagBuilder {
    pub fn new(tagtype: impl Into<String>) -> Self {
        Self {
            tagtype: tagtype.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Binds an argument role to the extent tag with the given public ID
    pub fn with_argument(mut self, role: impl Into<String>, extent_id: impl Into<String>) -> Self {
        self.arguments.push((role.into(), extent_id.into()));
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}
