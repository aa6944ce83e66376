//! Table Engine
//!
//! One logical record collection: a primary table keyed by record key, any
//! number of secondary indexes and an optional id sequence.
//!
//! Secondaries are registered with [`Table::add_index`] before [`Table::open`].
//! An index registered without an extractor stays empty until
//! [`Table::associate`] attaches one, optionally rebuilding it from the
//! primary in one pass.

use super::kv::{code, Comparator, Cursor, Db, DbConfig, Entry, Environment, Extractor, Sequence};
use crate::error::{Error, Result};
use crate::record::{compare, Record, Stored, UnpackHook, ValueRecord, KEY_SIZE};
use std::cmp::Ordering;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Name of the sequence key inside a `<table>.seq` store
const SEQUENCE_KEY: &str = "seq";

/// Secondary index description
#[derive(Clone)]
pub struct IndexDef {
    pub name: String,
    pub compare: Comparator,
    /// Order of primary keys sharing one index key
    pub dup_compare: Comparator,
    pub extractor: Option<Extractor>,
}

impl IndexDef {
    pub fn new(name: impl Into<String>, compare: Comparator) -> Self {
        Self {
            name: name.into(),
            compare,
            dup_compare: compare::u64_le,
            extractor: None,
        }
    }

    pub fn with_dup_compare(mut self, dup_compare: Comparator) -> Self {
        self.dup_compare = dup_compare;
        self
    }

    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = Some(extractor);
        self
    }
}

struct IndexSlot {
    def: IndexDef,
    db: Arc<Db>,
}

pub struct Table {
    name: String,
    env: Arc<Environment>,
    primary: Option<Arc<Db>>,
    indexes: Vec<IndexSlot>,
    values: Option<String>,
    sequence: Option<Sequence>,
}

impl Table {
    pub fn new(env: Arc<Environment>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            env,
            primary: None,
            indexes: Vec::new(),
            values: None,
            sequence: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_open(&self) -> bool {
        self.primary.is_some()
    }

    pub fn index_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.indexes.iter().map(|slot| slot.def.name.as_str())
    }

    fn primary(&self) -> Result<&Arc<Db>> {
        self.primary
            .as_ref()
            .ok_or_else(|| Error::engine(code::NOT_OPEN, format!("table {} is not open", self.name)))
    }

    fn index(&self, name: &str) -> Result<&IndexSlot> {
        self.indexes.iter().find(|slot| slot.def.name == name).ok_or_else(|| {
            Error::engine(
                code::NOT_FOUND,
                format!("table {} has no index {}", self.name, name),
            )
        })
    }

    /// Register a secondary index; must precede [`Table::open`]
    pub fn add_index(&mut self, def: IndexDef) -> Result<()> {
        if self.is_open() {
            return Err(Error::logic(format!(
                "index {} registered after table {} was opened",
                def.name, self.name
            )));
        }
        let db = self
            .env
            .open_db(DbConfig::new(def.name.clone(), def.compare).with_duplicates(def.dup_compare))?;
        self.indexes.push(IndexSlot { def, db });
        Ok(())
    }

    /// Register the value-hash index used by [`Table::get_by_value`]
    pub fn set_values_db(&mut self, name: impl Into<String>, extractor: Extractor) -> Result<()> {
        let name = name.into();
        self.add_index(IndexDef::new(name.clone(), compare::u64_le).with_extractor(extractor))?;
        self.values = Some(name);
        Ok(())
    }

    /// Open the primary and associate every registered index
    #[instrument(skip(self, compare), fields(table = %self.name))]
    pub fn open(&mut self, compare: Comparator) -> Result<()> {
        if self.is_open() {
            return Err(Error::logic(format!("table {} is already open", self.name)));
        }

        let primary = self.env.open_db(DbConfig::new(self.name.clone(), compare))?;
        self.primary = Some(Arc::clone(&primary));
        for slot in &self.indexes {
            primary.associate(Arc::clone(&slot.db), slot.def.extractor.clone())?;
        }
        debug!(records = primary.count(), indexes = self.indexes.len(), "Table opened");
        Ok(())
    }

    /// Attach an extractor to an index registered without one. With
    /// `rebuild` the index is truncated and filled from the primary.
    pub fn associate(&mut self, name: &str, extractor: Extractor, rebuild: bool) -> Result<()> {
        let primary = Arc::clone(self.primary()?);
        primary.attach(name, Arc::clone(&extractor), rebuild)?;
        if let Some(slot) = self.indexes.iter_mut().find(|slot| slot.def.name == name) {
            slot.def.extractor = Some(extractor);
        }
        Ok(())
    }

    pub fn is_associated(&self, name: &str) -> bool {
        self.primary.as_ref().is_some_and(|p| p.is_attached(name))
    }

    pub fn open_sequence(&mut self, cache: u32) -> Result<()> {
        if self.sequence.is_some() {
            return Err(Error::logic(format!("sequence of {} is already open", self.name)));
        }
        let name = format!("{}.seq", self.name);
        let db = match self.env.db(&name) {
            Some(db) => db,
            None => self.env.open_db(DbConfig::new(name, compare::bytes))?,
        };
        self.sequence = Some(Sequence::open(db, SEQUENCE_KEY, cache)?);
        Ok(())
    }

    fn sequence(&self) -> Result<&Sequence> {
        self.sequence
            .as_ref()
            .ok_or_else(|| Error::logic(format!("table {} has no open sequence", self.name)))
    }

    /// Next record id
    pub fn get_seq_id(&self) -> Result<u64> {
        self.sequence()?.get(1)
    }

    /// Id the next [`Table::get_seq_id`] call returns
    pub fn query_seq_id(&self) -> Result<u64> {
        Ok(self.sequence()?.query())
    }

    /// Write one record
    pub fn put<R: Record>(&self, record: &R) -> Result<()> {
        let data = record.to_data()?;
        self.primary()?.put(&record.pack_key(), &data)?;
        metrics::counter!("statstore_records_written_total").increment(1);
        Ok(())
    }

    /// Write one record and mark it as stored. A record pending deletion
    /// is rejected before anything is written.
    pub fn put_node<R: Record>(&self, record: &mut Stored<R>) -> Result<()> {
        record.check_storable()?;
        self.put(&**record)?;
        record.mark_stored()
    }

    /// Read the record whose key is already set in `record`. Returns
    /// `Ok(false)` when the key is absent.
    pub fn get_by_id<R: Record>(&self, record: &mut R, hook: Option<UnpackHook<'_, R>>) -> Result<bool> {
        match self.primary()?.get(&record.pack_key())? {
            Some(data) => {
                Self::decode(record, &data, hook)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Load a record by key
    pub fn load<R: Record + Default>(&self, key: u64) -> Result<Option<Stored<R>>> {
        let mut record = R::default();
        record.set_key(key);
        Ok(self
            .get_by_id(&mut record, None)?
            .then(|| Stored::from_storage(record)))
    }

    fn decode<R: Record>(record: &mut R, data: &[u8], hook: Option<UnpackHook<'_, R>>) -> Result<()> {
        let used = record.unpack_data(data, None)?;
        if used != data.len() {
            return Err(Error::Format {
                record: R::NAME,
                decoded: used,
                expected: data.len(),
            });
        }
        match hook {
            Some(hook) => hook(record),
            None => Ok(()),
        }
    }

    /// Find a record by its text identity. Fills in key and fields of
    /// `record` on a match.
    pub fn get_by_value<R: ValueRecord>(&self, record: &mut R, hook: Option<UnpackHook<'_, R>>) -> Result<bool> {
        let values = self
            .values
            .as_deref()
            .ok_or_else(|| Error::logic(format!("table {} has no value index", self.name)))?;
        let mut cursor = self.index(values)?.db.cursor()?;

        let hash = record.hash_value().to_le_bytes();
        let mut entry = cursor.set(&hash)?;
        while let Some(Entry { data: pkey, primary, .. }) = entry {
            // a dangling value entry has no primary data
            if let Some(data) = primary {
                if record.compare_value(&data)? == Ordering::Equal {
                    record.unpack_key(&pkey)?;
                    Self::decode(record, &data, hook)?;
                    return Ok(true);
                }
            }
            entry = cursor.next_dup()?;
        }
        Ok(false)
    }

    pub fn delete_node(&self, key: u64) -> Result<bool> {
        self.primary()?.delete(&key.to_le_bytes())
    }

    /// Delete a stored record; it is marked deleted once the engine
    /// delete succeeds
    pub fn delete<R: Record>(&self, record: &mut Stored<R>) -> Result<bool> {
        record.check_deletable()?;
        let removed = self.delete_node(record.key())?;
        record.mark_deleted()?;
        Ok(removed)
    }

    /// Records in primary key order
    pub fn iter<R: Record + Default>(&self) -> Result<RecordIter<R>> {
        Ok(RecordIter::new(self.primary()?.cursor()?, false, false))
    }

    pub fn iter_rev<R: Record + Default>(&self) -> Result<RecordIter<R>> {
        Ok(RecordIter::new(self.primary()?.cursor()?, false, true))
    }

    /// Records in the order of secondary index `name`
    pub fn index_iter<R: Record + Default>(&self, name: &str) -> Result<RecordIter<R>> {
        self.primary()?;
        Ok(RecordIter::new(self.index(name)?.db.cursor()?, true, false))
    }

    pub fn index_iter_rev<R: Record + Default>(&self, name: &str) -> Result<RecordIter<R>> {
        self.primary()?;
        Ok(RecordIter::new(self.index(name)?.db.cursor()?, true, true))
    }

    pub fn count(&self) -> Result<u64> {
        Ok(self.primary()?.count())
    }

    pub fn index_count(&self, name: &str) -> Result<u64> {
        Ok(self.index(name)?.db.count())
    }

    /// Empty the primary and every index; returns removed records
    pub fn truncate(&self) -> Result<u64> {
        let removed = self.primary()?.truncate()?;
        for slot in &self.indexes {
            slot.db.truncate()?;
        }
        info!(table = %self.name, removed, "Table truncated");
        Ok(removed)
    }

    /// Compact the primary and every index; returns reclaimed bytes
    pub fn compact(&self) -> Result<u64> {
        let mut reclaimed = self.primary()?.compact()?;
        for slot in &self.indexes {
            reclaimed += slot.db.compact()?;
        }
        Ok(reclaimed)
    }

    pub fn sync(&self) -> Result<()> {
        self.primary()?.sync()?;
        for slot in &self.indexes {
            slot.db.sync()?;
        }
        Ok(())
    }

    /// Close everything registered so far, opened or not. Keeps going past
    /// failures and reports the first.
    pub fn close(&mut self) -> Result<()> {
        let mut first_error = None;

        if let Some(sequence) = self.sequence.take() {
            if let Err(e) = sequence.close() {
                warn!(table = %self.name, "Failed to close sequence: {}", e);
                first_error.get_or_insert(e);
            }
            if let Err(e) = self.env.close_db(&format!("{}.seq", self.name)) {
                first_error.get_or_insert(e);
            }
        }

        if self.primary.take().is_some() {
            if let Err(e) = self.env.close_db(&self.name) {
                warn!(table = %self.name, "Failed to close table: {}", e);
                first_error.get_or_insert(e);
            }
        }

        for slot in self.indexes.drain(..) {
            if let Err(e) = self.env.close_db(&slot.def.name) {
                warn!(index = %slot.def.name, "Failed to close index: {}", e);
                first_error.get_or_insert(e);
            }
        }
        self.values = None;

        first_error.map_or(Ok(()), Err)
    }
}

/// Typed cursor over a table or one of its indexes
pub struct RecordIter<R> {
    cursor: Cursor,
    secondary: bool,
    reverse: bool,
    _record: PhantomData<R>,
}

impl<R: Record + Default> RecordIter<R> {
    fn new(cursor: Cursor, secondary: bool, reverse: bool) -> Self {
        Self {
            cursor,
            secondary,
            reverse,
            _record: PhantomData,
        }
    }

    fn build(&self, entry: Entry) -> Result<R> {
        let (key, data) = if self.secondary {
            let data = entry.primary.ok_or_else(|| {
                Error::engine(code::CORRUPT, format!("index entry of {} has no primary record", R::NAME))
            })?;
            (entry.data, data)
        } else {
            (entry.key, entry.data)
        };

        if key.len() != KEY_SIZE {
            return Err(Error::Format {
                record: R::NAME,
                decoded: key.len(),
                expected: KEY_SIZE,
            });
        }
        let mut record = R::default();
        record.unpack_key(&key)?;
        Table::decode(&mut record, &data, None)?;
        Ok(record)
    }
}

impl<R: Record + Default> Iterator for RecordIter<R> {
    type Item = Result<R>;

    fn next(&mut self) -> Option<Self::Item> {
        let step = if self.reverse { self.cursor.prev() } else { self.cursor.next() };
        match step {
            Ok(Some(entry)) => Some(self.build(entry)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
