//! Ordered table with runtime comparators and associated secondaries

use super::code;
use super::cursor::Cursor;
use super::log::{LogFile, LogOp};
use super::{Comparator, Extractor};
use crate::error::{Error, Result};
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::{BTreeMap, VecDeque};
use std::ops::Bound;
use std::path::Path;
use std::sync::{Arc, Weak};
use tracing::{debug, info, instrument};

/// Static description of one table
#[derive(Clone)]
pub struct DbConfig {
    pub name: String,
    /// Key order
    pub compare: Comparator,
    /// Sorted duplicates are allowed when set; orders the data items
    pub dup_compare: Option<Comparator>,
}

impl DbConfig {
    pub fn new(name: impl Into<String>, compare: Comparator) -> Self {
        Self {
            name: name.into(),
            compare,
            dup_compare: None,
        }
    }

    pub fn with_duplicates(mut self, dup_compare: Comparator) -> Self {
        self.dup_compare = Some(dup_compare);
        self
    }
}

/// Map key; duplicates carry their data item in `dup`
#[derive(Clone)]
pub(crate) struct DbKey {
    pub(crate) key: Vec<u8>,
    pub(crate) dup: Option<Vec<u8>>,
    compare: Comparator,
    dup_compare: Option<Comparator>,
}

impl DbKey {
    fn order(&self, other: &Self) -> Ordering {
        (self.compare)(&self.key, &other.key).then_with(|| match (&self.dup, &other.dup) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => match self.dup_compare {
                Some(dup_compare) => dup_compare(a, b),
                None => a.cmp(b),
            },
        })
    }
}

impl PartialEq for DbKey {
    fn eq(&self, other: &Self) -> bool {
        self.order(other) == Ordering::Equal
    }
}

impl Eq for DbKey {}

impl PartialOrd for DbKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DbKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order(other)
    }
}

struct Association {
    secondary: Arc<Db>,
    extractor: Option<Extractor>,
}

struct DbState {
    map: BTreeMap<DbKey, Vec<u8>>,
    dirty: VecDeque<Vec<u8>>,
    log: LogFile,
    open: bool,
}

/// One ordered table
pub struct Db {
    config: DbConfig,
    readonly: bool,
    state: Mutex<DbState>,
    associations: RwLock<Vec<Association>>,
    primary: RwLock<Weak<Db>>,
}

impl Db {
    /// Open a table and replay its log from `dir`
    pub(crate) fn open(dir: &Path, config: DbConfig, readonly: bool) -> Result<Arc<Self>> {
        let log = LogFile::new(dir.join(format!("{}.db", config.name)));
        let ops = log.replay(readonly)?;

        let mut db = Self {
            config,
            readonly,
            state: Mutex::new(DbState {
                map: BTreeMap::new(),
                dirty: VecDeque::new(),
                log,
                open: true,
            }),
            associations: RwLock::new(Vec::new()),
            primary: RwLock::new(Weak::new()),
        };

        let replayed = ops.len();
        {
            let state = db.state.get_mut();
            for op in ops {
                Self::apply(&db.config, &mut state.map, op);
            }
            debug!(
                table = %db.config.name,
                frames = replayed,
                records = state.map.len(),
                "Table opened"
            );
        }
        Ok(Arc::new(db))
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn compare(&self) -> Comparator {
        self.config.compare
    }

    pub fn has_duplicates(&self) -> bool {
        self.config.dup_compare.is_some()
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    pub(crate) fn make_key(&self, key: &[u8], dup: Option<&[u8]>) -> DbKey {
        DbKey {
            key: key.to_vec(),
            dup: if self.has_duplicates() { dup.map(<[u8]>::to_vec) } else { None },
            compare: self.config.compare,
            dup_compare: self.config.dup_compare,
        }
    }

    fn apply(config: &DbConfig, map: &mut BTreeMap<DbKey, Vec<u8>>, op: LogOp) {
        let dups = config.dup_compare.is_some();
        let make = |key: Vec<u8>, dup: Option<Vec<u8>>| DbKey {
            key,
            dup,
            compare: config.compare,
            dup_compare: config.dup_compare,
        };

        match op {
            LogOp::Put { key, data } if dups => {
                map.insert(make(key, Some(data)), Vec::new());
            }
            LogOp::Put { key, data } => {
                map.insert(make(key, None), data);
            }
            LogOp::Delete { key, data: Some(data) } if dups => {
                map.remove(&make(key, Some(data)));
            }
            LogOp::Delete { key, .. } if dups => {
                let seek = make(key, None);
                let doomed: Vec<DbKey> = map
                    .range(seek.clone()..)
                    .take_while(|(k, _)| (config.compare)(&k.key, &seek.key) == Ordering::Equal)
                    .map(|(k, _)| k.clone())
                    .collect();
                for k in doomed {
                    map.remove(&k);
                }
            }
            LogOp::Delete { key, .. } => {
                map.remove(&make(key, None));
            }
            LogOp::Truncate => map.clear(),
        }
    }

    fn check_writable(&self, state: &DbState) -> Result<()> {
        if !state.open {
            return Err(Error::engine(code::NOT_OPEN, format!("table {} is closed", self.name())));
        }
        if self.readonly {
            return Err(Error::engine(code::READONLY, format!("table {} is read-only", self.name())));
        }
        Ok(())
    }

    fn check_open(&self, state: &DbState) -> Result<()> {
        if state.open {
            Ok(())
        } else {
            Err(Error::engine(code::NOT_OPEN, format!("table {} is closed", self.name())))
        }
    }

    /// Apply and queue one change; caller holds the state lock
    fn log_op(&self, state: &mut DbState, op: LogOp) -> Result<()> {
        let frame = op.to_frame()?;
        self.commit(state, op, frame);
        Ok(())
    }

    fn commit(&self, state: &mut DbState, op: LogOp, frame: Vec<u8>) {
        Self::apply(&self.config, &mut state.map, op);
        state.dirty.push_back(frame);
    }

    fn ensure_writable(&self) -> Result<()> {
        self.check_writable(&self.state.lock())
    }

    fn entry_data(key: &DbKey, value: &[u8]) -> Vec<u8> {
        match &key.dup {
            Some(dup) => dup.clone(),
            None => value.to_vec(),
        }
    }

    /// Data for `key`; the first duplicate when duplicates are allowed
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let state = self.state.lock();
        self.check_open(&state)?;

        let seek = self.make_key(key, None);
        Ok(state
            .map
            .range(&seek..)
            .next()
            .filter(|(k, _)| (self.config.compare)(&k.key, key) == Ordering::Equal)
            .map(|(k, v)| Self::entry_data(k, v)))
    }

    /// Write one entry, maintaining every attached secondary
    pub fn put(&self, key: &[u8], data: &[u8]) -> Result<()> {
        let associations = self.associations.read();
        let mut state = self.state.lock();
        self.check_writable(&state)?;

        let old = if self.has_duplicates() {
            None
        } else {
            state.map.get(&self.make_key(key, None)).cloned()
        };

        // extract everything first so a failing extractor writes nothing
        let mut updates = Vec::new();
        for assoc in associations.iter() {
            if let Some(extract) = &assoc.extractor {
                let old_skey = match &old {
                    Some(old) => extract(key, old)?,
                    None => None,
                };
                let new_skey = extract(key, data)?;
                updates.push((&assoc.secondary, old_skey, new_skey));
            }
        }

        // every secondary that changes must accept the write before any does
        for (secondary, old_skey, new_skey) in &updates {
            if old_skey.is_some() || new_skey.is_some() {
                secondary.ensure_writable()?;
            }
        }
        let op = LogOp::Put {
            key: key.to_vec(),
            data: data.to_vec(),
        };
        let frame = op.to_frame()?;

        for (secondary, old_skey, new_skey) in updates {
            secondary.reindex(key, old_skey, new_skey)?;
        }
        self.commit(&mut state, op, frame);
        Ok(())
    }

    /// Secondary side of a primary write
    fn reindex(&self, pkey: &[u8], old: Option<Vec<u8>>, new: Option<Vec<u8>>) -> Result<()> {
        if old.is_none() && new.is_none() {
            return Ok(());
        }
        let mut state = self.state.lock();
        self.check_writable(&state)?;

        if let Some(old) = old {
            let data = self.has_duplicates().then(|| pkey.to_vec());
            self.log_op(&mut state, LogOp::Delete { key: old, data })?;
        }
        if let Some(new) = new {
            self.log_op(
                &mut state,
                LogOp::Put {
                    key: new,
                    data: pkey.to_vec(),
                },
            )?;
        }
        Ok(())
    }

    /// Remove `key` (every duplicate of it); returns whether anything existed
    pub fn delete(&self, key: &[u8]) -> Result<bool> {
        let associations = self.associations.read();
        let mut state = self.state.lock();
        self.check_writable(&state)?;

        let seek = self.make_key(key, None);
        let existing = state
            .map
            .range(&seek..)
            .next()
            .filter(|(k, _)| (self.config.compare)(&k.key, key) == Ordering::Equal)
            .map(|(k, v)| Self::entry_data(k, v));
        let old = match existing {
            Some(old) => old,
            None => return Ok(false),
        };

        if !self.has_duplicates() {
            let mut updates = Vec::new();
            for assoc in associations.iter() {
                if let Some(extract) = &assoc.extractor {
                    updates.push((&assoc.secondary, extract(key, &old)?));
                }
            }
            for (secondary, old_skey) in &updates {
                if old_skey.is_some() {
                    secondary.ensure_writable()?;
                }
            }
            for (secondary, old_skey) in updates {
                secondary.reindex(key, old_skey, None)?;
            }
        }

        self.log_op(
            &mut state,
            LogOp::Delete {
                key: key.to_vec(),
                data: None,
            },
        )?;
        Ok(true)
    }

    /// Remove every entry; returns how many there were
    pub fn truncate(&self) -> Result<u64> {
        let mut state = self.state.lock();
        self.check_writable(&state)?;
        let count = state.map.len() as u64;
        self.log_op(&mut state, LogOp::Truncate)?;
        Ok(count)
    }

    pub fn count(&self) -> u64 {
        self.state.lock().map.len() as u64
    }

    pub fn dirty_pages(&self) -> usize {
        self.state.lock().dirty.len()
    }

    /// Write out `percent` of the dirty frames; returns how many were written
    pub fn trickle(&self, percent: u32) -> Result<usize> {
        let mut state = self.state.lock();
        if !state.open || state.dirty.is_empty() || percent == 0 {
            return Ok(0);
        }

        let pending = state.dirty.len();
        let share = (pending * percent.min(100) as usize).div_ceil(100);
        let frames: Vec<Vec<u8>> = state.dirty.drain(..share).collect();
        state.log.append(&frames)?;
        Ok(frames.len())
    }

    /// Write every dirty frame and fsync
    pub fn sync(&self) -> Result<()> {
        let mut state = self.state.lock();
        if !state.open {
            return Ok(());
        }
        let frames: Vec<Vec<u8>> = state.dirty.drain(..).collect();
        state.log.append(&frames)?;
        state.log.fsync()
    }

    /// fsync what has been written so far
    pub fn fsync(&self) -> Result<()> {
        let mut state = self.state.lock();
        if !state.open {
            return Ok(());
        }
        state.log.fsync()
    }

    /// Rewrite the log with live entries only; returns reclaimed bytes
    #[instrument(skip(self), fields(table = %self.config.name))]
    pub fn compact(&self) -> Result<u64> {
        let mut state = self.state.lock();
        self.check_writable(&state)?;

        let frames: Vec<Vec<u8>> = state.dirty.drain(..).collect();
        state.log.append(&frames)?;
        let before = state.log.size();

        let live: Vec<LogOp> = state
            .map
            .iter()
            .map(|(k, v)| LogOp::Put {
                key: k.key.clone(),
                data: Self::entry_data(k, v),
            })
            .collect();
        state.log.rewrite(live.iter().map(LogOp::to_frame))?;

        let after = state.log.size();
        let reclaimed = before.saturating_sub(after);
        debug!(before, after, reclaimed, "Table compacted");
        Ok(reclaimed)
    }

    pub fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        if !state.open {
            return Ok(());
        }
        let frames: Vec<Vec<u8>> = state.dirty.drain(..).collect();
        let result = match state.log.append(&frames) {
            Ok(()) => state.log.close(),
            Err(e) => Err(e),
        };
        state.open = false;
        state.map.clear();
        result
    }

    /// Register a secondary; `extractor` may be attached later
    pub fn associate(self: &Arc<Self>, secondary: Arc<Db>, extractor: Option<Extractor>) -> Result<()> {
        if self.has_duplicates() {
            return Err(Error::engine(
                code::INVALID,
                format!("table {} has duplicates and cannot be a primary", self.name()),
            ));
        }
        let mut associations = self.associations.write();
        if associations.iter().any(|a| a.secondary.name() == secondary.name()) {
            return Err(Error::engine(
                code::KEY_EXISTS,
                format!("{} is already associated with {}", secondary.name(), self.name()),
            ));
        }
        *secondary.primary.write() = Arc::downgrade(self);
        associations.push(Association {
            secondary,
            extractor,
        });
        Ok(())
    }

    /// Attach the extractor of an associated secondary. With `rebuild` the
    /// secondary is truncated and repopulated from a full primary scan.
    #[instrument(skip(self, extractor), fields(primary = %self.config.name))]
    pub fn attach(&self, name: &str, extractor: Extractor, rebuild: bool) -> Result<()> {
        let mut associations = self.associations.write();
        let assoc = associations
            .iter_mut()
            .find(|a| a.secondary.name() == name)
            .ok_or_else(|| {
                Error::engine(
                    code::NOT_FOUND,
                    format!("{} is not associated with {}", name, self.name()),
                )
            })?;

        if rebuild {
            let snapshot: Vec<(Vec<u8>, Vec<u8>)> = {
                let state = self.state.lock();
                self.check_open(&state)?;
                state.map.iter().map(|(k, v)| (k.key.clone(), v.clone())).collect()
            };

            let entries = snapshot
                .par_iter()
                .map(|(key, data)| Ok(extractor(key, data)?.map(|skey| (skey, key.clone()))))
                .collect::<Result<Vec<_>>>()?;

            let secondary = &assoc.secondary;
            let removed = secondary.truncate()?;
            let mut indexed = 0u64;
            for (skey, pkey) in entries.into_iter().flatten() {
                secondary.reindex(&pkey, None, Some(skey))?;
                indexed += 1;
            }
            info!(
                secondary = %name,
                removed,
                indexed,
                scanned = snapshot.len(),
                "Secondary rebuilt"
            );
        }

        assoc.extractor = Some(extractor);
        Ok(())
    }

    /// Whether `name` is associated and has a live extractor
    pub fn is_attached(&self, name: &str) -> bool {
        self.associations
            .read()
            .iter()
            .any(|a| a.secondary.name() == name && a.extractor.is_some())
    }

    pub fn primary(&self) -> Option<Arc<Db>> {
        self.primary.read().upgrade()
    }

    pub fn cursor(self: &Arc<Self>) -> Result<Cursor> {
        self.check_open(&self.state.lock())?;
        Ok(Cursor::new(Arc::clone(self)))
    }

    // cursor positioning; each call takes the lock briefly

    pub(crate) fn first_entry(&self) -> Option<(DbKey, Vec<u8>)> {
        let state = self.state.lock();
        state.map.iter().next().map(|(k, v)| (k.clone(), Self::entry_data(k, v)))
    }

    pub(crate) fn last_entry(&self) -> Option<(DbKey, Vec<u8>)> {
        let state = self.state.lock();
        state.map.iter().next_back().map(|(k, v)| (k.clone(), Self::entry_data(k, v)))
    }

    pub(crate) fn entry_after(&self, pos: &DbKey) -> Option<(DbKey, Vec<u8>)> {
        let state = self.state.lock();
        state
            .map
            .range((Bound::Excluded(pos), Bound::Unbounded))
            .next()
            .map(|(k, v)| (k.clone(), Self::entry_data(k, v)))
    }

    pub(crate) fn entry_before(&self, pos: &DbKey) -> Option<(DbKey, Vec<u8>)> {
        let state = self.state.lock();
        state
            .map
            .range(..pos)
            .next_back()
            .map(|(k, v)| (k.clone(), Self::entry_data(k, v)))
    }

    /// First entry whose key equals `key`
    pub(crate) fn entry_at(&self, key: &[u8]) -> Option<(DbKey, Vec<u8>)> {
        let seek = self.make_key(key, None);
        let state = self.state.lock();
        state
            .map
            .range(&seek..)
            .next()
            .filter(|(k, _)| (self.config.compare)(&k.key, key) == Ordering::Equal)
            .map(|(k, v)| (k.clone(), Self::entry_data(k, v)))
    }

    /// Number of entries sharing `key`
    pub(crate) fn dup_count(&self, key: &[u8]) -> usize {
        let seek = self.make_key(key, None);
        let state = self.state.lock();
        state
            .map
            .range(&seek..)
            .take_while(|(k, _)| (self.config.compare)(&k.key, key) == Ordering::Equal)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::compare;

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("statstore_db_{}_{}", name, std::process::id()));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn k(n: u64) -> [u8; 8] {
        n.to_le_bytes()
    }

    #[test]
    fn test_put_get_delete() -> Result<()> {
        let dir = temp_dir("basic");
        let db = Db::open(&dir, DbConfig::new("t", compare::u64_le), false)?;

        db.put(&k(2), b"two")?;
        db.put(&k(1), b"one")?;
        db.put(&k(2), b"deux")?;
        assert_eq!(db.get(&k(2))?, Some(b"deux".to_vec()));
        assert_eq!(db.count(), 2);

        assert!(db.delete(&k(1))?);
        assert!(!db.delete(&k(1))?);
        assert_eq!(db.get(&k(1))?, None);

        db.close()?;
        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[test]
    fn test_reopen_replays_log() -> Result<()> {
        let dir = temp_dir("reopen");
        {
            let db = Db::open(&dir, DbConfig::new("t", compare::u64_le), false)?;
            for i in 0..10 {
                db.put(&k(i), &k(i * 10))?;
            }
            db.delete(&k(3))?;
            db.close()?;
        }

        let db = Db::open(&dir, DbConfig::new("t", compare::u64_le), false)?;
        assert_eq!(db.count(), 9);
        assert_eq!(db.get(&k(7))?, Some(k(70).to_vec()));
        assert_eq!(db.get(&k(3))?, None);
        db.close()?;
        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[test]
    fn test_custom_order() -> Result<()> {
        let dir = temp_dir("order");
        let db = Db::open(&dir, DbConfig::new("t", compare::u64_le), false)?;
        // little-endian bytes sort wrongly as raw bytes; the comparator fixes that
        for n in [256u64, 1, 65536, 2] {
            db.put(&k(n), b"")?;
        }
        let mut cursor = db.cursor()?;
        let mut keys = Vec::new();
        while let Some(entry) = cursor.next()? {
            keys.push(u64::from_le_bytes(entry.key[..8].try_into().unwrap()));
        }
        assert_eq!(keys, vec![1, 2, 256, 65536]);
        db.close()?;
        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[test]
    fn test_secondary_follows_primary() -> Result<()> {
        let dir = temp_dir("secondary");
        let primary = Db::open(&dir, DbConfig::new("p", compare::u64_le), false)?;
        let secondary = Db::open(
            &dir,
            DbConfig::new("p.first", compare::bytes).with_duplicates(compare::u64_le),
            false,
        )?;
        let extractor: Extractor =
            Arc::new(|_key: &[u8], data: &[u8]| -> Result<Option<Vec<u8>>> { Ok(data.first().map(|b| vec![*b])) });
        primary.associate(Arc::clone(&secondary), Some(extractor))?;

        primary.put(&k(1), b"apple")?;
        primary.put(&k(2), b"avocado")?;
        primary.put(&k(3), b"banana")?;
        assert_eq!(secondary.count(), 3);
        assert_eq!(secondary.dup_count(b"a"), 2);

        primary.put(&k(2), b"blueberry")?;
        assert_eq!(secondary.dup_count(b"a"), 1);
        assert_eq!(secondary.dup_count(b"b"), 2);

        primary.delete(&k(3))?;
        assert_eq!(secondary.dup_count(b"b"), 1);
        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[test]
    fn test_closed_secondary_leaves_everything_untouched() -> Result<()> {
        let dir = temp_dir("closed_secondary");
        let primary = Db::open(&dir, DbConfig::new("p", compare::u64_le), false)?;
        let first = Db::open(
            &dir,
            DbConfig::new("p.first", compare::bytes).with_duplicates(compare::u64_le),
            false,
        )?;
        let last = Db::open(
            &dir,
            DbConfig::new("p.last", compare::bytes).with_duplicates(compare::u64_le),
            false,
        )?;
        let by_first: Extractor =
            Arc::new(|_key: &[u8], data: &[u8]| -> Result<Option<Vec<u8>>> { Ok(data.first().map(|b| vec![*b])) });
        let by_last: Extractor =
            Arc::new(|_key: &[u8], data: &[u8]| -> Result<Option<Vec<u8>>> { Ok(data.last().map(|b| vec![*b])) });
        primary.associate(Arc::clone(&first), Some(by_first))?;
        primary.associate(Arc::clone(&last), Some(by_last))?;

        primary.put(&k(1), b"apple")?;
        last.close()?;

        let err = primary.put(&k(1), b"banana").err().and_then(|e| e.code());
        assert_eq!(err, Some(code::NOT_OPEN));
        assert_eq!(primary.get(&k(1))?, Some(b"apple".to_vec()));
        assert_eq!(first.dup_count(b"a"), 1);
        assert_eq!(first.dup_count(b"b"), 0);

        let err = primary.delete(&k(1)).err().and_then(|e| e.code());
        assert_eq!(err, Some(code::NOT_OPEN));
        assert_eq!(primary.count(), 1);
        assert_eq!(first.count(), 1);
        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[test]
    fn test_extractor_can_skip_records() -> Result<()> {
        let dir = temp_dir("skip");
        let primary = Db::open(&dir, DbConfig::new("p", compare::u64_le), false)?;
        let secondary = Db::open(
            &dir,
            DbConfig::new("p.even", compare::u64_le).with_duplicates(compare::u64_le),
            false,
        )?;
        let extractor: Extractor = Arc::new(|key: &[u8], _data: &[u8]| -> Result<Option<Vec<u8>>> {
            Ok((key[0] % 2 == 0).then(|| key.to_vec()))
        });
        primary.associate(Arc::clone(&secondary), Some(extractor))?;
        for i in 0..10 {
            primary.put(&k(i), b"x")?;
        }
        assert_eq!(secondary.count(), 5);
        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[test]
    fn test_readonly_rejects_writes() -> Result<()> {
        let dir = temp_dir("readonly");
        let db = Db::open(&dir, DbConfig::new("t", compare::u64_le), true)?;
        let err = db.put(&k(1), b"x").unwrap_err();
        assert_eq!(err.code(), Some(code::READONLY));
        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[test]
    fn test_trickle_writes_share_of_dirty_frames() -> Result<()> {
        let dir = temp_dir("trickle");
        let db = Db::open(&dir, DbConfig::new("t", compare::u64_le), false)?;
        for i in 0..20 {
            db.put(&k(i), b"x")?;
        }
        assert_eq!(db.dirty_pages(), 20);
        assert_eq!(db.trickle(10)?, 2);
        assert_eq!(db.dirty_pages(), 18);
        db.sync()?;
        assert_eq!(db.dirty_pages(), 0);
        assert_eq!(db.trickle(10)?, 0);
        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[test]
    fn test_compact_reclaims_overwrites() -> Result<()> {
        let dir = temp_dir("compact");
        let db = Db::open(&dir, DbConfig::new("t", compare::u64_le), false)?;
        for round in 0..10u64 {
            db.put(&k(1), &k(round))?;
        }
        let reclaimed = db.compact()?;
        assert!(reclaimed > 0);
        assert_eq!(db.get(&k(1))?, Some(k(9).to_vec()));
        db.close()?;

        let db = Db::open(&dir, DbConfig::new("t", compare::u64_le), false)?;
        assert_eq!(db.get(&k(1))?, Some(k(9).to_vec()));
        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }
}
