/*
    TagStore Library (extent and link annotation store)
        by Maarten van Gompel <proycon@anaproy.nl>

        Licensed under the GNU General Public License v3
*/

//! This module contains the [`IdAllocator`], which issues public identifiers for tags.
//! Identifiers consist of the prefix of the tag type followed by a number, e.g. `P0`, `P1`.

use regex::Regex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::OnceLock;

use crate::error::TagStoreError;
use crate::store::*;
use crate::tagtype::{TagType, TagTypeHandle};

/// Matches a canonical decimal number (no leading zeroes)
fn numeric_suffix() -> &'static Regex {
    static NUMERIC_SUFFIX: OnceLock<Regex> = OnceLock::new();
    NUMERIC_SUFFIX.get_or_init(|| Regex::new(r"^(?:0|[1-9][0-9]*)$").expect("valid regex"))
}

/// Bookkeeping for a single tag type
#[derive(Debug, Clone, Default)]
struct IdCounter {
    /// Numeric suffixes in use
    used: BTreeSet<u64>,

    /// Every number below this one is in use, so it is the smallest free number
    floor: u64,

    /// Identifiers in use that do not consist of the prefix and a canonical number
    foreign: HashSet<String>,
}

enum IdKey {
    Numeric(u64),
    Foreign(String),
}

impl IdCounter {
    fn advance(&mut self) {
        while self.used.contains(&self.floor) {
            self.floor += 1;
        }
    }

    fn claim(&mut self, key: IdKey) -> bool {
        match key {
            IdKey::Numeric(n) => {
                let fresh = self.used.insert(n);
                if n == self.floor {
                    self.advance();
                }
                fresh
            }
            IdKey::Foreign(id) => self.foreign.insert(id),
        }
    }

    fn release(&mut self, key: IdKey) {
        match key {
            IdKey::Numeric(n) => {
                if self.used.remove(&n) && n < self.floor {
                    self.floor = n;
                }
            }
            IdKey::Foreign(id) => {
                self.foreign.remove(&id);
            }
        }
    }

    fn contains(&self, key: &IdKey) -> bool {
        match key {
            IdKey::Numeric(n) => self.used.contains(n),
            IdKey::Foreign(id) => self.foreign.contains(id),
        }
    }
}

/// Issues unique identifiers per [`TagType`], based on the prefix of the type.
///
/// [`Self::allocate()`] always returns the prefix followed by the smallest number not yet in use
/// for that type. Identifiers obtained elsewhere (e.g. from a loaded document) are registered with
/// [`Self::reserve()`] so they are never issued again.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    counters: HashMap<TagTypeHandle, IdCounter>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(tagtype: &TagType, id: &str) -> IdKey {
        if let Some(suffix) = id.strip_prefix(tagtype.prefix()) {
            if numeric_suffix().is_match(suffix) {
                if let Ok(n) = suffix.parse::<u64>() {
                    return IdKey::Numeric(n);
                }
            }
        }
        IdKey::Foreign(id.to_string())
    }

    fn handle(tagtype: &TagType) -> Result<TagTypeHandle, TagStoreError> {
        tagtype.handle().ok_or_else(|| {
            TagStoreError::UnknownTagType(
                tagtype.name().to_string(),
                "tag type is not part of a registry",
            )
        })
    }

    /// Returns a fresh identifier for the tag type and marks it as used
    pub fn allocate(&mut self, tagtype: &TagType) -> Result<String, TagStoreError> {
        let counter = self.counters.entry(Self::handle(tagtype)?).or_default();
        let n = counter.floor;
        if n == u64::MAX {
            return Err(TagStoreError::DuplicateId(
                tagtype.prefix().to_string(),
                "identifier space of this tag type is exhausted",
            ));
        }
        counter.claim(IdKey::Numeric(n));
        Ok(format!("{}{}", tagtype.prefix(), n))
    }

    /// Registers an externally supplied identifier so it will never be allocated.
    /// Fails with [`TagStoreError::DuplicateId`] if the identifier is already in use.
    pub fn reserve(&mut self, tagtype: &TagType, id: &str) -> Result<(), TagStoreError> {
        let key = Self::key(tagtype, id);
        let counter = self.counters.entry(Self::handle(tagtype)?).or_default();
        if counter.claim(key) {
            Ok(())
        } else {
            Err(TagStoreError::DuplicateId(
                id.to_string(),
                "identifier already reserved",
            ))
        }
    }

    /// Frees an identifier so it may be allocated again
    pub fn release(&mut self, tagtype: &TagType, id: &str) {
        let key = Self::key(tagtype, id);
        if let Some(handle) = tagtype.handle() {
            if let Some(counter) = self.counters.get_mut(&handle) {
                counter.release(key);
            }
        }
    }

    /// Is this identifier in use for the tag type?
    pub fn is_reserved(&self, tagtype: &TagType, id: &str) -> bool {
        let key = Self::key(tagtype, id);
        tagtype
            .handle()
            .and_then(|handle| self.counters.get(&handle))
            .map(|counter| counter.contains(&key))
            .unwrap_or(false)
    }
}
