//! Entity registries
//!
//! Request-scoped maps from identifier to load record. Handlers stage ids with
//! load options; the pipeline driver resolves every staged entry. Entries are
//! never removed, and staging the same id twice merges the requested options.

use crate::entity::{Mastery, Page, User};
use crate::options::{LoadOptionSet, MasteryOptions, PageOptions, UserOptions};
use crate::types::{MasteryId, PageId, UserId};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;

/// Resolution state of a registry entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum EntityState<V> {
    /// Staged but not yet queried
    Pending,
    Loaded(V),
    /// Absent, or not visible to the viewer
    Tombstone,
}

/// Load record for one identifier.
///
/// `resolved` is always a subset of `requested`; the entry is satisfied exactly
/// when the two are equal. `None` means the entry was never queried.
#[derive(Debug, Clone)]
pub struct RegistryEntry<K, O, V> {
    id: K,
    requested: O,
    resolved: Option<O>,
    state: EntityState<V>,
}

impl<K, O: LoadOptionSet, V> RegistryEntry<K, O, V> {
    pub fn id(&self) -> &K {
        &self.id
    }

    pub fn requested(&self) -> &O {
        &self.requested
    }

    pub fn resolved(&self) -> Option<&O> {
        self.resolved.as_ref()
    }

    pub fn state(&self) -> &EntityState<V> {
        &self.state
    }

    pub fn value(&self) -> Option<&V> {
        match &self.state {
            EntityState::Loaded(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_satisfied(&self) -> bool {
        self.resolved.as_ref() == Some(&self.requested)
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self.state, EntityState::Tombstone)
    }
}

/// Result of a staging call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// New identifier
    Inserted,
    /// Existing identifier whose requested options grew
    Grown,
    /// Already covered by the requested options
    Unchanged,
}

impl StageOutcome {
    pub fn is_new_work(self) -> bool {
        !matches!(self, StageOutcome::Unchanged)
    }
}

/// Mapping from identifier to load record for one entity kind
#[derive(Debug, Clone)]
pub struct Registry<K, O, V> {
    entries: HashMap<K, RegistryEntry<K, O, V>>,
}

impl<K, O, V> Default for Registry<K, O, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K, O, V> Registry<K, O, V>
where
    K: Clone + Eq + Hash + Ord,
    O: LoadOptionSet,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `id` must be resolved with at least `options`.
    ///
    /// Growth of an already-resolved entry marks it unresolved; the executor
    /// then re-fetches the whole merged option set.
    pub fn stage(&mut self, id: K, options: O) -> StageOutcome {
        match self.entries.entry(id) {
            Entry::Vacant(vacant) => {
                let id = vacant.key().clone();
                vacant.insert(RegistryEntry {
                    id,
                    requested: options,
                    resolved: None,
                    state: EntityState::Pending,
                });
                StageOutcome::Inserted
            }
            Entry::Occupied(mut occupied) => {
                if occupied.get_mut().requested.absorb(&options) {
                    StageOutcome::Grown
                } else {
                    StageOutcome::Unchanged
                }
            }
        }
    }

    /// Record the outcome of a query made with `used` options.
    ///
    /// `value == None` stores a tombstone. Returns false if `id` was never staged.
    pub fn complete(&mut self, id: &K, used: O, value: Option<V>) -> bool {
        let Some(entry) = self.entries.get_mut(id) else {
            return false;
        };
        // Requested options only grow, so `used` stays a subset of them.
        entry.resolved = Some(used);
        entry.state = match value {
            Some(value) => EntityState::Loaded(value),
            None => EntityState::Tombstone,
        };
        true
    }

    /// Loaded value for `id`; `None` for absent, pending and tombstoned entries.
    pub fn get(&self, id: &K) -> Option<&V> {
        self.entries.get(id).and_then(RegistryEntry::value)
    }

    pub fn entry(&self, id: &K) -> Option<&RegistryEntry<K, O, V>> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &K) -> bool {
        self.entries.contains_key(id)
    }

    pub fn is_tombstone(&self, id: &K) -> bool {
        self.entries
            .get(id)
            .map(RegistryEntry::is_tombstone)
            .unwrap_or(false)
    }

    pub fn is_resolved(&self, id: &K) -> bool {
        self.entries
            .get(id)
            .map(RegistryEntry::is_satisfied)
            .unwrap_or(false)
    }

    /// Unsatisfied entries with their merged requested options, sorted by id.
    pub fn all_unresolved(&self) -> Vec<(K, O)> {
        let mut pending: Vec<(K, O)> = self
            .entries
            .values()
            .filter(|entry| !entry.is_satisfied())
            .map(|entry| (entry.id.clone(), entry.requested))
            .collect();
        pending.sort_by(|(a, _), (b, _)| a.cmp(b));
        pending
    }

    pub fn unresolved_count(&self) -> usize {
        self.entries.values().filter(|e| !e.is_satisfied()).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterator over entries in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = &RegistryEntry<K, O, V>> {
        self.entries.values()
    }

    /// Loaded values in arbitrary order
    pub fn loaded(&self) -> impl Iterator<Item = &V> {
        self.entries.values().filter_map(RegistryEntry::value)
    }
}

impl<K, O, V> Serialize for Registry<K, O, V>
where
    K: Serialize + Ord,
    V: Serialize,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut entries: Vec<&RegistryEntry<K, O, V>> = self.entries.values().collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for entry in entries {
            map.serialize_entry(&entry.id, &entry.state)?;
        }
        map.end()
    }
}

pub type PageRegistry = Registry<PageId, PageOptions, Page>;
pub type UserRegistry = Registry<UserId, UserOptions, User>;
pub type MasteryRegistry = Registry<MasteryId, MasteryOptions, Mastery>;

/// The three per-request registries
#[derive(Debug, Clone, Default, Serialize)]
pub struct EntityMaps {
    pub pages: PageRegistry,
    pub users: UserRegistry,
    pub masteries: MasteryRegistry,
}

impl EntityMaps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage_page(&mut self, id: impl Into<PageId>, options: PageOptions) -> StageOutcome {
        self.pages.stage(id.into(), options)
    }

    pub fn stage_user(&mut self, id: impl Into<UserId>, options: UserOptions) -> StageOutcome {
        self.users.stage(id.into(), options)
    }

    pub fn stage_mastery(
        &mut self,
        id: impl Into<MasteryId>,
        options: MasteryOptions,
    ) -> StageOutcome {
        self.masteries.stage(id.into(), options)
    }

    pub fn unresolved_count(&self) -> usize {
        self.pages.unresolved_count()
            + self.users.unresolved_count()
            + self.masteries.unresolved_count()
    }

    /// True when no registry has unresolved entries
    pub fn is_saturated(&self) -> bool {
        self.unresolved_count() == 0
    }
}
