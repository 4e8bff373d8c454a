//! In-memory authoritative store.
//!
//! Each table holds versioned records behind a concurrent map. Reads for
//! validation clone a snapshot; balance mutations go through
//! [`Table::compare_and_swap`] so two writers can never act on the same
//! stale version.

use std::hash::Hash;

use dashmap::{mapref::entry::Entry, DashMap};
use uuid::Uuid;

use crate::models::{Channel, Checkout, GiftCard, Voucher};

/// A record plus its optimistic-concurrency version counter.
#[derive(Debug, Clone)]
struct Versioned<T> {
    record: T,
    version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CasError {
    #[error("record no longer exists")]
    Missing,
    #[error("version conflict")]
    Conflict,
}

/// A concurrent table keyed by `K`, with per-record versioning.
pub struct Table<K: Eq + Hash + Clone, V: Clone> {
    rows: DashMap<K, Versioned<V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> Default for Table<K, V> {
    fn default() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Table<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new record. Returns false if the key is already taken.
    pub fn insert(&self, key: K, value: V) -> bool {
        match self.rows.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(Versioned {
                    record: value,
                    version: 1,
                });
                true
            }
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.rows.get(key).map(|row| row.record.clone())
    }

    /// Snapshot of the record together with the version to CAS against.
    pub fn get_versioned(&self, key: &K) -> Option<(V, u64)> {
        self.rows.get(key).map(|row| (row.record.clone(), row.version))
    }

    pub fn contains(&self, key: &K) -> bool {
        self.rows.contains_key(key)
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.rows.remove(key).map(|(_, row)| row.record)
    }

    pub fn list(&self) -> Vec<V> {
        self.rows.iter().map(|row| row.record.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Replaces the record only if the version still matches the one the
    /// caller read. The version is bumped on success.
    pub fn compare_and_swap(&self, key: &K, expected_version: u64, value: V) -> Result<u64, CasError> {
        match self.rows.get_mut(key) {
            None => Err(CasError::Missing),
            Some(mut row) => {
                if row.version != expected_version {
                    return Err(CasError::Conflict);
                }
                row.record = value;
                row.version += 1;
                Ok(row.version)
            }
        }
    }

    /// In-place mutation for non-contended fields (tags, flags). Bumps the
    /// version so concurrent CAS writers see the change.
    pub fn update<F>(&self, key: &K, f: F) -> Option<V>
    where
        F: FnOnce(&mut V),
    {
        self.rows.get_mut(key).map(|mut row| {
            f(&mut row.record);
            row.version += 1;
            row.record.clone()
        })
    }
}

/// All authoritative tables plus the unique secondary indexes.
#[derive(Default)]
pub struct Store {
    pub channels: Table<Uuid, Channel>,
    /// slug -> channel id; claimed before the channel row is inserted.
    pub channel_slugs: DashMap<String, Uuid>,
    /// Keyed by normalized voucher code.
    pub vouchers: Table<String, Voucher>,
    pub gift_cards: Table<Uuid, GiftCard>,
    /// redemption code -> gift card id; claimed before the row is inserted.
    pub gift_card_codes: DashMap<String, Uuid>,
    pub checkouts: Table<Uuid, Checkout>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }
}
