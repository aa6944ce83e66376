//! Table-Set Orchestrator
//!
//! Opens every table of a [`Schema`] against one environment, owns the
//! background trickle thread and closes everything in order.
//!
//! # Open sequence
//!
//! ```text
//! 1. register   every secondary of every table (no extractors yet
//!               unless indexes are live)
//! 2. open       each primary, associating its registered secondaries
//! 3. attach     extractors now (live) or later through attach_indexes
//! ```
//!
//! Any failure closes every table registered so far before the error is
//! returned.

use super::kv::{code, Environment, TrickleThread};
use super::schema::{field_extractor, KindFilter, Schema, TableSpec};
use super::table::{IndexDef, Table};
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::record::{Record, Stored, UnpackHook, ValueRecord};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// When secondary indexes start following writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexMode {
    /// Extractors attached at open
    #[default]
    Live,
    /// Extractors attached by [`Database::attach_indexes`] after a bulk load
    Deferred,
}

/// Row count of one table and its indexes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableStats {
    pub name: String,
    pub records: u64,
    pub indexes: Vec<(String, u64)>,
}

pub struct Database {
    config: StoreConfig,
    schema: Schema,
    env: Option<Arc<Environment>>,
    /// Registered tables, opened or not, in schema order
    tables: Vec<Table>,
    by_name: HashMap<&'static str, usize>,
    trickle: Option<TrickleThread>,
}

/// Attach the failing table or index name to an error
fn with_context(name: &str, e: Error) -> Error {
    match e {
        Error::Engine { code, message } => Error::Engine {
            code,
            message: format!("{}: {}", name, message),
        },
        Error::Logic(message) => Error::Logic(format!("{}: {}", name, message)),
        other => other,
    }
}

impl Database {
    pub fn new(config: StoreConfig) -> Self {
        Self::with_schema(config, Schema::standard())
    }

    pub fn with_schema(config: StoreConfig, schema: Schema) -> Self {
        Self {
            config,
            schema,
            env: None,
            tables: Vec::new(),
            by_name: HashMap::new(),
            trickle: None,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn is_open(&self) -> bool {
        self.env.is_some()
    }

    pub fn is_readonly(&self) -> bool {
        self.config.readonly
    }

    /// Open every table of the schema
    #[instrument(skip(self), fields(path = ?self.config.db_path))]
    pub fn open(&mut self, mode: IndexMode) -> Result<()> {
        if self.is_open() {
            return Err(Error::logic(format!(
                "database {} is already open",
                self.config.db_path.display()
            )));
        }
        self.config.validate()?;

        let env = Environment::open(&self.config.db_path, self.config.readonly)?;
        self.env = Some(Arc::clone(&env));

        match self.open_tables(&env, mode) {
            Ok(()) => {
                info!(
                    tables = self.tables.len(),
                    readonly = self.config.readonly,
                    ?mode,
                    "Database opened"
                );
                Ok(())
            }
            Err(e) => {
                error!("Database open failed: {}", e);
                if let Err(cleanup) = self.shutdown() {
                    warn!("Cleanup after failed open: {}", cleanup);
                }
                Err(e)
            }
        }
    }

    fn open_tables(&mut self, env: &Arc<Environment>, mode: IndexMode) -> Result<()> {
        // readonly stores never write, so indexes may as well be live
        let live = mode == IndexMode::Live || self.config.readonly;
        let specs: Vec<TableSpec> = self.schema.tables().to_vec();

        for spec in &specs {
            let mut table = Table::new(Arc::clone(env), spec.name);
            let registered = Self::register(&mut table, spec, live);
            self.by_name.insert(spec.name, self.tables.len());
            self.tables.push(table);
            registered.map_err(|e| with_context(spec.name, e))?;
        }

        for (table, spec) in self.tables.iter_mut().zip(&specs) {
            table.open(spec.compare).map_err(|e| with_context(spec.name, e))?;
            if spec.sequence && !self.config.readonly {
                table
                    .open_sequence(self.config.seq_cache_size)
                    .map_err(|e| with_context(spec.name, e))?;
            }
        }

        if self.config.trickle && !self.config.readonly {
            self.trickle = Some(TrickleThread::start(Arc::clone(env), self.config.trickle_config())?);
        }
        Ok(())
    }

    fn register(table: &mut Table, spec: &TableSpec, live: bool) -> Result<()> {
        if let Some(value_hash) = spec.value_hash {
            // lookups by value are needed while loading, so this one is always live
            table
                .set_values_db(spec.values_name(), field_extractor(value_hash, KindFilter::All))
                .map_err(|e| with_context(&spec.values_name(), e))?;
        }
        for index in &spec.indexes {
            let mut def = IndexDef::new(index.name.clone(), index.compare).with_dup_compare(index.dup_compare);
            if live {
                def = def.with_extractor(index.extractor());
            }
            table.add_index(def).map_err(|e| with_context(&index.name, e))?;
        }
        Ok(())
    }

    /// Attach every deferred extractor. With `rebuild` each index is
    /// truncated and rebuilt from its primary.
    #[instrument(skip(self))]
    pub fn attach_indexes(&mut self, rebuild: bool) -> Result<()> {
        self.env()?;
        for spec in self.schema.tables() {
            let table = match self.by_name.get(spec.name) {
                Some(&i) => &mut self.tables[i],
                None => continue,
            };
            for index in &spec.indexes {
                if table.is_associated(&index.name) {
                    continue;
                }
                table
                    .associate(&index.name, index.extractor(), rebuild)
                    .map_err(|e| with_context(&index.name, e))?;
            }
        }
        info!(rebuild, "Indexes attached");
        Ok(())
    }

    fn env(&self) -> Result<&Arc<Environment>> {
        self.env
            .as_ref()
            .ok_or_else(|| Error::engine(code::NOT_OPEN, "database is not open"))
    }

    pub fn environment(&self) -> Option<&Arc<Environment>> {
        self.env.as_ref()
    }

    pub fn table_by_name(&self, name: &str) -> Result<&Table> {
        self.env()?;
        self.by_name
            .get(name)
            .map(|&i| &self.tables[i])
            .ok_or_else(|| Error::engine(code::NOT_FOUND, format!("no table named {}", name)))
    }

    /// Table holding record type `R`
    pub fn table<R: Record>(&self) -> Result<&Table> {
        self.table_by_name(R::TABLE)
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> + '_ {
        self.tables.iter()
    }

    /// Allocate the next id of `R`'s table
    pub fn next_id<R: Record>(&self) -> Result<u64> {
        self.table::<R>()?.get_seq_id()
    }

    pub fn put<R: Record>(&self, record: &R) -> Result<()> {
        self.table::<R>()?.put(record)
    }

    pub fn put_node<R: Record>(&self, record: &mut Stored<R>) -> Result<()> {
        self.table::<R>()?.put_node(record)
    }

    pub fn load<R: Record + Default>(&self, key: u64) -> Result<Option<Stored<R>>> {
        self.table::<R>()?.load(key)
    }

    pub fn get_by_id<R: Record>(&self, record: &mut R, hook: Option<UnpackHook<'_, R>>) -> Result<bool> {
        self.table::<R>()?.get_by_id(record, hook)
    }

    pub fn get_by_value<R: ValueRecord>(&self, record: &mut R, hook: Option<UnpackHook<'_, R>>) -> Result<bool> {
        self.table::<R>()?.get_by_value(record, hook)
    }

    pub fn delete<R: Record>(&self, key: u64) -> Result<bool> {
        self.table::<R>()?.delete_node(key)
    }

    pub fn stats(&self) -> Result<Vec<TableStats>> {
        self.env()?;
        self.tables
            .iter()
            .map(|table| {
                let indexes = table
                    .index_names()
                    .map(|name| Ok((name.to_string(), table.index_count(name)?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(TableStats {
                    name: table.name().to_string(),
                    records: table.count()?,
                    indexes,
                })
            })
            .collect()
    }

    /// Empty every table; returns removed records
    pub fn truncate(&self) -> Result<u64> {
        self.env()?;
        let mut removed = 0;
        for table in &self.tables {
            removed += table.truncate().map_err(|e| with_context(table.name(), e))?;
        }
        Ok(removed)
    }

    /// Write every dirty page and fsync
    pub fn flush(&self) -> Result<()> {
        self.env()?.flush()
    }

    /// Compact every table; returns reclaimed bytes
    #[instrument(skip(self))]
    pub fn compact(&self) -> Result<u64> {
        self.env()?;
        let mut reclaimed = 0;
        for table in &self.tables {
            reclaimed += table.compact().map_err(|e| with_context(table.name(), e))?;
        }
        info!(reclaimed, "Database compacted");
        Ok(reclaimed)
    }

    /// Stop the trickle thread, then close every table and the environment.
    /// Keeps going past failures and reports the first.
    pub fn close(&mut self) -> Result<()> {
        if !self.is_open() {
            return Ok(());
        }
        let result = self.shutdown();
        info!(path = ?self.config.db_path, "Database closed");
        result
    }

    fn shutdown(&mut self) -> Result<()> {
        let mut first_error = None;

        if let Some(mut trickle) = self.trickle.take() {
            if let Err(e) = trickle.stop() {
                warn!("Trickle thread: {}", e);
                first_error.get_or_insert(e);
            }
        }

        for table in self.tables.iter_mut().rev() {
            if let Err(e) = table.close() {
                warn!(table = %table.name(), "Failed to close table: {}", e);
                first_error.get_or_insert(with_context(table.name(), e));
            }
        }
        self.tables.clear();
        self.by_name.clear();

        if let Some(env) = self.env.take() {
            if let Err(e) = env.close() {
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!("Database close on drop failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{
        DailyHostRecord, DailyRecord, HostRecord, RecordKind, StatusCodeRecord, SystemRecord, TotalsRecord,
    };

    fn temp_config(name: &str) -> StoreConfig {
        let dir = std::env::temp_dir().join(format!("statstore_database_{}_{}", name, std::process::id()));
        std::fs::remove_dir_all(&dir).ok();
        StoreConfig {
            trickle: false,
            ..StoreConfig::new(dir)
        }
    }

    #[test]
    fn test_open_twice_is_logic_error() -> Result<()> {
        let config = temp_config("twice");
        let path = config.db_path.clone();
        let mut db = Database::new(config);
        db.open(IndexMode::Live)?;
        assert!(matches!(db.open(IndexMode::Live), Err(Error::Logic(_))));
        db.close()?;
        std::fs::remove_dir_all(path).ok();
        Ok(())
    }

    #[test]
    fn test_typed_access() -> Result<()> {
        let config = temp_config("typed");
        let path = config.db_path.clone();
        let mut db = Database::new(config);
        db.open(IndexMode::Live)?;

        let mut host = HostRecord::new("192.0.2.7", RecordKind::Regular);
        host.key = db.next_id::<HostRecord>()?;
        host.hits = 4;
        db.put(&host)?;

        let mut lookup = HostRecord::new("192.0.2.7", RecordKind::Regular);
        assert!(db.get_by_value(&mut lookup, None)?);
        assert_eq!(lookup.key, 1);
        assert_eq!(lookup.hits, 4);

        db.put(&SystemRecord::default())?;
        let system: Option<Stored<SystemRecord>> = db.load(SystemRecord::KEY)?;
        assert!(system.is_some());

        let stats = db.stats()?;
        let hosts = stats.iter().find(|s| s.name == "hosts").unwrap();
        assert_eq!(hosts.records, 1);
        assert!(hosts.indexes.contains(&("hosts.hits".to_string(), 1)));
        assert!(hosts.indexes.contains(&("hosts.groups.hits".to_string(), 0)));
        db.close()?;
        std::fs::remove_dir_all(path).ok();
        Ok(())
    }

    #[test]
    fn test_totals_and_daily_tables() -> Result<()> {
        let config = temp_config("totals");
        let path = config.db_path.clone();
        let mut db = Database::new(config);
        db.open(IndexMode::Live)?;

        let mut totals = TotalsRecord::new();
        totals.hits = 10;
        db.put(&totals)?;
        let mut day = DailyRecord::new(3);
        day.visits = 2;
        db.put(&day)?;
        db.put(&StatusCodeRecord { code: 404, count: 5 })?;

        let mut host = DailyHostRecord::new("192.0.2.9");
        host.key = db.next_id::<DailyHostRecord>()?;
        db.put(&host)?;
        let mut lookup = DailyHostRecord::new("192.0.2.9");
        assert!(db.get_by_value(&mut lookup, None)?);
        assert_eq!(lookup.key, host.key);

        let loaded: Option<Stored<TotalsRecord>> = db.load(TotalsRecord::KEY)?;
        assert_eq!(loaded.map(|t| t.hits), Some(10));
        let loaded: Option<Stored<StatusCodeRecord>> = db.load(404)?;
        assert_eq!(loaded.map(|c| c.count), Some(5));
        assert_eq!(db.table::<DailyRecord>()?.count()?, 1);
        db.close()?;
        std::fs::remove_dir_all(path).ok();
        Ok(())
    }

    #[test]
    fn test_closed_database_rejects_calls() {
        let db = Database::new(temp_config("closed"));
        assert!(db.table::<HostRecord>().is_err());
        assert!(db.flush().is_err());
    }
}
