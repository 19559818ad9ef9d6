/*
    TagStore Library (extent and link annotation store)
        by Maarten van Gompel <proycon@anaproy.nl>

        Licensed under the GNU General Public License v3
*/

//! Query results grouped by tag type

use std::collections::BTreeMap;

use crate::annotationstore::AnnotationStore;
use crate::extenttag::Tag;
use crate::store::*;
use crate::tagtype::{TagType, TagTypeHandle, TagTypeRegistry};

/// Tags returned by a query, grouped by tag type.
/// Within a group, tags are in creation order.
pub struct GroupedTags<'store, T>
where
    T: Tag<StoreType = AnnotationStore>,
{
    groups: BTreeMap<TagTypeHandle, Vec<ResultItem<'store, T>>>,
    registry: &'store TagTypeRegistry,
}

impl<'store, T> GroupedTags<'store, T>
where
    T: Tag<StoreType = AnnotationStore>,
{
    pub(crate) fn new(registry: &'store TagTypeRegistry) -> Self {
        Self {
            groups: BTreeMap::new(),
            registry,
        }
    }

    /// Adds a tag, callers must add tags in ascending handle order
    pub(crate) fn push(&mut self, item: ResultItem<'store, T>) {
        self.groups
            .entry(item.as_ref().tagtype_handle())
            .or_default()
            .push(item);
    }

    /// Returns the total number of tags
    pub fn len(&self) -> usize {
        self.groups.values().map(|group| group.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Iterates over all groups, each consisting of the tag type and its tags
    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (ResultItem<'store, TagType>, &[ResultItem<'store, T>])> + '_ {
        let registry = self.registry;
        self.groups.iter().filter_map(move |(handle, group)| {
            registry
                .tagtype_by_handle(*handle)
                .map(|tagtype| (tagtype, group.as_slice()))
        })
    }

    /// Returns the tags of the given tag type (case-insensitive)
    pub fn get(&self, tagtype: &str) -> Option<&[ResultItem<'store, T>]> {
        let handle = self.registry.resolve(tagtype).ok()?;
        self.groups.get(&handle).map(|group| group.as_slice())
    }

    /// Iterates over all tags, without grouping
    pub fn tags(&self) -> impl Iterator<Item = ResultItem<'store, T>> + '_ {
        self.groups.values().flat_map(|group| group.iter().copied())
    }

    /// Returns the public IDs of all tags
    pub fn ids(&self) -> Vec<&'store str> {
        self.groups
            .values()
            .flat_map(|group| group.iter().filter_map(|item| item.as_ref().id()))
            .collect()
    }

    /// Does the result contain the tag with this public ID?
    pub fn contains_id(&self, id: &str) -> bool {
        self.tags().any(|item| item.id() == Some(id))
    }
}
