/*
    TagStore Library (extent and link annotation store)
        by Maarten van Gompel <proycon@anaproy.nl>

        Licensed under the GNU General Public License v3
*/

//! This module contains the low-level storage abstractions shared by the [`crate::TagTypeRegistry`] and the
//! [`crate::AnnotationStore`]: slot vectors addressed by handles, public id maps, relation maps
//! (reverse indices), and the [`StoreFor`] trait that implements insertion and removal once for all of them.

use sealed::sealed;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::slice::{Iter, IterMut};

use crate::config::Configurable;
use crate::error::TagStoreError;
use crate::types::*;

/// Type for Store elements. The struct that owns a field of this type should implement the trait [`StoreFor<T>`]
pub type Store<T> = Vec<Option<T>>;
//                       ^------- may be None when an element gets deleted

/// A map mapping public IDs to internal ids, implemented as a HashMap.
/// Used to resolve public IDs to internal ones.
#[derive(Debug, Clone)]
pub struct IdMap<HandleType> {
    /// The actual map
    data: HashMap<String, HandleType>,
}

impl<HandleType> Default for IdMap<HandleType>
where
    HandleType: Handle,
{
    fn default() -> Self {
        Self {
            data: HashMap::new(),
        }
    }
}

impl<HandleType> IdMap<HandleType>
where
    HandleType: Handle,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<HandleType> {
        self.data.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.data.contains_key(id)
    }

    pub(crate) fn insert(&mut self, id: String, handle: HandleType) -> Option<HandleType> {
        self.data.insert(id, handle)
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<HandleType> {
        self.data.remove(id)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// This models relations or 'edges' in graph terminology, between handles. It acts as a reverse index is used for various purposes.
#[derive(Debug, Clone)]
pub struct RelationMap<A, B> {
    /// The actual map
    pub(crate) data: Vec<Vec<B>>,
    _marker: PhantomData<A>, //zero-size, only needed to bind generic A
}

impl<A, B> Default for RelationMap<A, B>
where
    A: Handle,
    B: Handle,
{
    fn default() -> Self {
        Self {
            data: Vec::new(),
            _marker: PhantomData,
        }
    }
}

impl<A, B> RelationMap<A, B>
where
    A: Handle,
    B: Handle,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a relation into the map, duplicates are not added twice
    pub fn insert(&mut self, x: A, y: B) {
        if x.as_usize() >= self.data.len() {
            //expand the map
            self.data.resize_with(x.as_usize() + 1, Default::default);
        }
        let values = &mut self.data[x.as_usize()];
        if !values.contains(&y) {
            values.push(y);
        }
    }

    /// Remove a relation from the map
    pub fn remove(&mut self, x: A, y: B) {
        if let Some(values) = self.data.get_mut(x.as_usize()) {
            if let Some(pos) = values.iter().position(|z| *z == y) {
                values.remove(pos); //note: this shifts the array and may take O(n)
            }
        }
    }

    pub fn get(&self, x: A) -> Option<&Vec<B>> {
        self.data.get(x.as_usize())
    }

    pub fn count(&self, x: A) -> usize {
        self.data.get(x.as_usize()).map(|v| v.len()).unwrap_or(0)
    }
}

#[sealed(pub(crate))] //<-- this ensures nobody outside this crate can implement the trait
pub trait Storable: PartialEq + TypeInfo
where
    Self: Sized,
{
    type HandleType: Handle;
    type StoreType: StoreFor<Self>;

    /// Retrieve the internal (numeric) id. For any type T uses in `StoreFor<T>`, this may be None only in the initial
    /// stage when it is still unbounded to a store.
    fn handle(&self) -> Option<Self::HandleType>;

    /// Like [`Self::handle()`] but returns a [`TagStoreError::HandleError`] error if there is no internal id.
    fn handle_or_err(&self) -> Result<Self::HandleType, TagStoreError> {
        self.handle()
            .ok_or(TagStoreError::HandleError("item is not bound to a store"))
    }

    /// Get the public ID
    fn id(&self) -> Option<&str>;

    /// Set the internal ID. May only be called once (though currently not enforced).
    fn set_handle(&mut self, handle: Self::HandleType);
}

/// This trait is implemented on types that provide storage for a certain other generic type (T)
/// It is a sealed trait, not implementable outside this crate.
#[sealed(pub(crate))] //<-- this ensures nobody outside this crate can implement the trait
pub trait StoreFor<T: Storable>: Configurable {
    /// Get a reference to the entire store for the associated type
    fn store(&self) -> &Store<T>;
    /// Get a mutable reference to the entire store for the associated type
    fn store_mut(&mut self) -> &mut Store<T>;
    /// Get a reference to the id map for the associated type, mapping global ids to internal ids
    fn idmap(&self) -> Option<&IdMap<T::HandleType>> {
        None
    }
    /// Get a mutable reference to the id map for the associated type, mapping global ids to internal ids
    fn idmap_mut(&mut self) -> Option<&mut IdMap<T::HandleType>> {
        None
    }

    fn store_typeinfo() -> &'static str;

    /// Adds an item to the store. Returns a handle to it upon success.
    /// The item may already be bound (i.e. have been assigned the handle it will get), in which case
    /// that handle must correspond with the next free slot.
    fn insert(&mut self, mut item: T) -> Result<T::HandleType, TagStoreError> {
        debug(self.config(), || {
            format!("StoreFor<{}>.insert: new item", Self::store_typeinfo())
        });
        let handle = if let Some(intid) = item.handle() {
            intid
        } else {
            // item has no internal id yet, i.e. it is unbound
            // we generate an id and bind it now
            let intid = self.next_handle();
            item = self.bind(item)?;
            intid
        };

        if let Some(id) = item.id() {
            if self.has_id(id) {
                return Err(TagStoreError::DuplicateId(
                    id.to_string(),
                    Self::store_typeinfo(),
                ));
            }
            let id = id.to_string();
            if let Some(idmap) = self.idmap_mut() {
                idmap.insert(id, handle);
            }
        }

        if let Err(err) = self.preinsert(&mut item) {
            //undo the id mapping we just made
            if let Some(id) = item.id() {
                if let Some(idmap) = self.idmap_mut() {
                    idmap.remove(id);
                }
            }
            return Err(err);
        }

        self.store_mut().push(Some(item));

        self.inserted(handle)?;

        debug(self.config(), || {
            format!(
                "StoreFor<{}>.insert: ^--- {:?} (insertion complete now)",
                Self::store_typeinfo(),
                handle
            )
        });

        assert_eq!(handle, T::HandleType::new(self.store().len() - 1), "sanity check to ensure no item can determine its own internal id that does not correspond with what's allocated");

        Ok(handle)
    }

    /// Called prior to inserting an item into to the store
    /// If it returns an error, the insert will be cancelled.
    #[allow(unused_variables)]
    fn preinsert(&self, item: &mut T) -> Result<(), TagStoreError> {
        //default implementation does nothing
        Ok(())
    }

    /// Called after an item was inserted to the store
    /// Allows the store to do further bookkeeping
    /// like updating relation maps
    #[allow(unused_variables)]
    fn inserted(&mut self, handle: T::HandleType) -> Result<(), TagStoreError> {
        //default implementation does nothing
        Ok(())
    }

    /// Returns true if the store has an item with this public ID
    fn has_id(&self, id: &str) -> bool {
        self.idmap().map(|idmap| idmap.contains(id)).unwrap_or(false)
    }

    /// Get a reference to an item from the store by handle
    fn get(&self, handle: T::HandleType) -> Result<&T, TagStoreError> {
        if let Some(Some(item)) = self.store().get(handle.as_usize()) {
            Ok(item)
        } else {
            Err(TagStoreError::HandleError(Self::store_typeinfo()))
        }
    }

    /// Get a mutable reference to an item from the store by handle
    fn get_mut(&mut self, handle: T::HandleType) -> Result<&mut T, TagStoreError> {
        if let Some(Some(item)) = self.store_mut().get_mut(handle.as_usize()) {
            Ok(item)
        } else {
            Err(TagStoreError::HandleError(Self::store_typeinfo()))
        }
    }

    /// Removes an item by handle, returns an error if the item has dependencies and can't be removed
    fn remove(&mut self, handle: T::HandleType) -> Result<(), TagStoreError> {
        //callback to remove the item from relation maps, may return an error and refuse to remove an item
        self.preremove(handle)?;

        let id: Option<String> = self.get(handle)?.id().map(|x| x.to_string());
        if let Some(id) = id {
            if let Some(idmap) = self.idmap_mut() {
                idmap.remove(id.as_str());
            }
        }

        //removing means just setting its previously occupied index to None
        if let Some(slot) = self.store_mut().get_mut(handle.as_usize()) {
            *slot = None;
        }
        debug(self.config(), || {
            format!(
                "StoreFor<{}>.remove: {:?}",
                Self::store_typeinfo(),
                handle
            )
        });
        Ok(())
    }

    /// Called before an item is removed from the store
    /// Allows the store to do further bookkeeping
    /// like updating relation maps
    #[allow(unused_variables)]
    fn preremove(&mut self, handle: T::HandleType) -> Result<(), TagStoreError> {
        //default implementation does nothing
        Ok(())
    }

    /// Iterate over all (non-deleted) items in the store
    fn iter<'a>(&'a self) -> StoreIter<'a, T> {
        StoreIter {
            iter: self.store().iter(),
            count: 0,
            len: self.store().len(),
        }
    }

    /// Iterate over the store, mutably
    fn iter_mut<'a>(&'a mut self) -> StoreIterMut<'a, T> {
        let len = self.store().len();
        StoreIterMut {
            iter: self.store_mut().iter_mut(),
            count: 0,
            len,
        }
    }

    /// Return the internal id that will be assigned for the next item to the store
    fn next_handle(&self) -> T::HandleType {
        T::HandleType::new(self.store().len()) //this is one of the very few places in the code where we create a handle from scratch
    }

    /// This binds an item to the store *PRIOR* to it being actually added
    /// You should never need to call this directly (it can only be called once per item anyway).
    fn bind(&mut self, mut item: T) -> Result<T, TagStoreError> {
        if item.handle().is_some() {
            Err(TagStoreError::AlreadyBound("bind()"))
        } else {
            item.set_handle(self.next_handle());
            Ok(item)
        }
    }
}

//  generic iterator implementations, these take care of skipping over deleted items (None)

/// This is the iterator to iterate over a Store,  it is created by the iter() method from the [`StoreFor<T>`] trait
pub struct StoreIter<'a, T> {
    iter: Iter<'a, Option<T>>,
    count: usize,
    len: usize,
}

impl<'a, T> Iterator for StoreIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.count += 1;
            match self.iter.next() {
                Some(Some(item)) => return Some(item),
                Some(None) => continue,
                None => return None,
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        //the lower-bound may be an overestimate (if there are deleted items)
        (0, Some(self.len.saturating_sub(self.count)))
    }
}

/// Mutable variant of [`StoreIter<T>`]
pub struct StoreIterMut<'a, T> {
    iter: IterMut<'a, Option<T>>,
    count: usize,
    len: usize,
}

impl<'a, T> Iterator for StoreIterMut<'a, T> {
    type Item = &'a mut T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.count += 1;
            match self.iter.next() {
                Some(Some(item)) => return Some(item),
                Some(None) => continue,
                None => return None,
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.len.saturating_sub(self.count)))
    }
}

/// This is a smart pointer that encapsulates both the item and the store that owns it.
/// It allows the item to have some more introspection as it knows who its immediate parent is,
/// and is what the high-level query methods return.
pub struct ResultItem<'store, T>
where
    T: Storable,
{
    item: &'store T,
    store: &'store T::StoreType,
}

impl<'store, T> Clone for ResultItem<'store, T>
where
    T: Storable,
{
    fn clone(&self) -> Self {
        *self
    }
}

impl<'store, T> Copy for ResultItem<'store, T> where T: Storable {}

impl<'store, T> fmt::Debug for ResultItem<'store, T>
where
    T: Storable + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResultItem").field(self.item).finish()
    }
}

impl<'store, T> Deref for ResultItem<'store, T>
where
    T: Storable,
{
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.item
    }
}

impl<'store, T> PartialEq for ResultItem<'store, T>
where
    T: Storable,
{
    fn eq(&self, other: &Self) -> bool {
        self.item.handle() == other.item.handle() && self.item == other.item
    }
}

impl<'store, T> ResultItem<'store, T>
where
    T: Storable,
{
    /// Create a new result item. Not public, called by the stores instead.
    /// Only bound items may be wrapped.
    pub(crate) fn new(item: &'store T, store: &'store T::StoreType) -> Self {
        debug_assert!(item.handle().is_some(), "can't wrap unbound items");
        Self { item, store }
    }

    /// Returns the contained reference with the original lifetime, unlike [`Self::deref()`]!
    pub fn as_ref(&self) -> &'store T {
        self.item
    }

    /// Returns the store that holds this item
    pub fn store(&self) -> &'store T::StoreType {
        self.store
    }

    /// Returns the handle of this item, items in results are always bound
    pub fn handle(&self) -> T::HandleType {
        self.item
            .handle()
            .expect("items in a ResultItem are always bound")
    }
}
