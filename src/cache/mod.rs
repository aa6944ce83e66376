//! In-memory record cache with time-ordered eviction
//!
//! Regular records carry the timestamp of their last insert or lookup.
//! Timestamps must never go backwards over the life of a cache, so access
//! order and timestamp order are the same and the least recently touched
//! entry is always the oldest one.
//!
//! ```text
//! regular:  LRU list   oldest ─→ newest    (evictable)
//! groups:   hash map   timestamp 0         (never evicted by threshold)
//! ```
//!
//! Eviction hands each record to a caller callback first so it can be
//! written to its table.

mod keys;
mod tmrange;

pub use tmrange::TmRange;

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::record::{Record, RecordKind, KEY_SIZE};
use lru::LruCache;
use std::collections::HashMap;
use std::hash::Hash;
use tracing::debug;

/// Records that can live in a [`RecordCache`]
pub trait CacheRecord: Record {
    /// Identity in the cache; may combine several fields
    type Key: Eq + Hash + Clone;

    fn cache_key(&self) -> Self::Key;

    /// Bytes this record accounts for against a swap budget
    fn size_estimate(&self) -> usize {
        KEY_SIZE + self.data_size()
    }
}

struct Slot<R> {
    record: R,
    ts: u64,
}

pub struct RecordCache<R: CacheRecord> {
    regular: LruCache<R::Key, Slot<R>>,
    groups: HashMap<R::Key, R>,
    /// Latest timestamp observed by an insert or lookup
    last_ts: u64,
    /// Byte budget applied by [`trim`](Self::trim)
    budget: Option<usize>,
}

impl<R: CacheRecord> Default for RecordCache<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CacheRecord> RecordCache<R> {
    pub fn new() -> Self {
        Self {
            regular: LruCache::unbounded(),
            groups: HashMap::new(),
            last_ts: 0,
            budget: None,
        }
    }

    /// Cache whose [`trim`](Self::trim) also keeps the resident size
    /// within `budget` bytes
    pub fn with_budget(budget: Option<u64>) -> Self {
        Self {
            budget: budget.map(|b| usize::try_from(b).unwrap_or(usize::MAX)),
            ..Self::new()
        }
    }

    /// Cache bounded by the configured swap budget
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::with_budget(config.swap_budget())
    }

    pub fn budget(&self) -> Option<usize> {
        self.budget
    }

    pub fn len(&self) -> usize {
        self.regular.len() + self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Estimated bytes of every resident record
    pub fn bytes(&self) -> usize {
        self.regular.iter().map(|(_, slot)| slot.record.size_estimate()).sum::<usize>()
            + self.groups.values().map(|r| r.size_estimate()).sum::<usize>()
    }

    fn check_ts(&self, ts: u64) -> Result<()> {
        if ts < self.last_ts {
            return Err(Error::logic(format!(
                "timestamp {} is earlier than {} already seen",
                ts, self.last_ts
            )));
        }
        Ok(())
    }

    /// Insert a record that is not cached yet. Groups ignore `ts`.
    pub fn put(&mut self, record: R, ts: u64) -> Result<()> {
        let key = record.cache_key();
        if record.kind().is_group() {
            if self.groups.contains_key(&key) {
                return Err(Error::logic(format!("{} group is already cached", R::NAME)));
            }
            self.groups.insert(key, record);
            return Ok(());
        }

        self.check_ts(ts)?;
        if self.regular.contains(&key) {
            return Err(Error::logic(format!("{} is already cached", R::NAME)));
        }
        self.regular.push(key, Slot { record, ts });
        self.last_ts = ts;
        Ok(())
    }

    /// Look a record up and mark it touched at `ts`
    pub fn find(&mut self, kind: RecordKind, ts: u64, key: &R::Key) -> Result<Option<&mut R>> {
        if kind.is_group() {
            return Ok(self.groups.get_mut(key));
        }
        if !self.regular.contains(key) {
            return Ok(None);
        }

        self.check_ts(ts)?;
        self.last_ts = ts;
        Ok(self.regular.get_mut(key).map(|slot| {
            slot.ts = ts;
            &mut slot.record
        }))
    }

    /// Look a record up without touching it
    pub fn peek(&self, kind: RecordKind, key: &R::Key) -> Option<&R> {
        if kind.is_group() {
            self.groups.get(key)
        } else {
            self.regular.peek(key).map(|slot| &slot.record)
        }
    }

    pub fn remove(&mut self, kind: RecordKind, key: &R::Key) -> Option<R> {
        if kind.is_group() {
            self.groups.remove(key)
        } else {
            self.regular.pop(key).map(|slot| slot.record)
        }
    }

    pub fn clear(&mut self) {
        self.regular.clear();
        self.groups.clear();
    }

    /// Timestamps of the oldest and newest resident regular records
    pub fn time_range(&self) -> TmRange {
        // iter runs newest to oldest
        match (self.regular.peek_lru(), self.regular.iter().next()) {
            (Some((_, oldest)), Some((_, newest))) => TmRange::new(oldest.ts, newest.ts),
            _ => TmRange::default(),
        }
    }

    /// Newest minus oldest resident timestamp; zero when empty
    pub fn tm_range(&self) -> u64 {
        self.time_range().range()
    }

    fn evict_oldest(&mut self, evict: &mut impl FnMut(&R) -> Result<()>) -> Result<bool> {
        match self.regular.peek_lru() {
            Some((_, slot)) => evict(&slot.record)?,
            None => return Ok(false),
        }
        self.regular.pop_lru();
        Ok(true)
    }

    /// Evict every regular record touched at or before `threshold`.
    /// `evict` sees each record first; an error stops eviction and leaves
    /// that record resident.
    pub fn swap_out(&mut self, threshold: u64, mut evict: impl FnMut(&R) -> Result<()>) -> Result<usize> {
        let mut count = 0;
        while self.regular.peek_lru().is_some_and(|(_, slot)| slot.ts <= threshold) {
            self.evict_oldest(&mut evict)?;
            count += 1;
        }

        metrics::counter!("statstore_cache_evictions_total").increment(count as u64);
        debug!(record = R::NAME, threshold, evicted = count, "Swapped out");
        Ok(count)
    }

    /// Like [`swap_out`](Self::swap_out), then keep evicting oldest first
    /// until the estimated size fits `budget`. Groups go last; a budget
    /// below the smallest record empties the cache.
    pub fn swap_out_with_budget(
        &mut self,
        threshold: u64,
        budget: usize,
        mut evict: impl FnMut(&R) -> Result<()>,
    ) -> Result<usize> {
        let aged = self.swap_out(threshold, &mut evict)?;
        let mut bytes = self.bytes();
        let mut count = 0;

        while bytes > budget {
            if let Some((_, slot)) = self.regular.peek_lru() {
                let size = slot.record.size_estimate();
                self.evict_oldest(&mut evict)?;
                bytes = bytes.saturating_sub(size);
            } else if let Some(key) = self.groups.keys().next().cloned() {
                if let Some(group) = self.groups.get(&key) {
                    evict(group)?;
                    bytes = bytes.saturating_sub(group.size_estimate());
                }
                self.groups.remove(&key);
            } else {
                break;
            }
            count += 1;
        }

        metrics::counter!("statstore_cache_evictions_total").increment(count as u64);
        debug!(record = R::NAME, budget, bytes, evicted = aged + count, "Swapped out to budget");
        Ok(aged + count)
    }

    /// Swap out by age, then down to the cache budget when one is set
    pub fn trim(&mut self, threshold: u64, evict: impl FnMut(&R) -> Result<()>) -> Result<usize> {
        match self.budget {
            Some(budget) => self.swap_out_with_budget(threshold, budget, evict),
            None => self.swap_out(threshold, evict),
        }
    }

    /// Every resident record, regular ones oldest first, then groups
    pub fn iter(&self) -> impl Iterator<Item = &R> + '_ {
        self.regular
            .iter()
            .rev()
            .map(|(_, slot)| &slot.record)
            .chain(self.groups.values())
    }

    /// Positioned cursor over every resident record
    pub fn cursor(&self) -> Cursor<'_, R> {
        Cursor {
            inner: Box::new(self.iter()),
            current: None,
            done: false,
        }
    }
}

/// Cursor that has no item before the first `next` and after the last
pub struct Cursor<'a, R> {
    inner: Box<dyn Iterator<Item = &'a R> + 'a>,
    current: Option<&'a R>,
    done: bool,
}

impl<'a, R> Cursor<'a, R> {
    pub fn next(&mut self) -> Option<&'a R> {
        if self.done {
            return None;
        }
        self.current = self.inner.next();
        self.done = self.current.is_none();
        self.current
    }

    /// Current record; unchanged until the next `next`
    pub fn item(&self) -> Option<&'a R> {
        self.current
    }
}
