//! Embedded ordered key/value engine
//!
//! An [`Environment`] is a directory of tables. Each [`Db`] is an ordered
//! map with a runtime key comparator, optionally allowing sorted duplicates.
//! A primary table can carry associated secondaries: on every write the
//! primary runs each secondary's [`Extractor`] and keeps the secondary in
//! step. Secondaries map their key to the primary key, and cursors over
//! them join back to the primary data.
//!
//! Tables live in memory and persist through an append-only frame log per
//! table. Writes queue frames as dirty pages; [`Environment::trickle`]
//! writes a share of them out, [`Db::sync`] writes the rest.

mod cursor;
mod db;
mod log;
mod sequence;
mod trickle;

pub use cursor::{Cursor, Entry};
pub use db::{Db, DbConfig};
pub use sequence::Sequence;
pub use trickle::{TrickleConfig, TrickleThread};

use crate::error::{Error, Result};
use dashmap::DashMap;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Engine status codes carried by [`Error::Engine`]
pub mod code {
    pub const NOT_FOUND: i32 = -30_988;
    pub const KEY_EXISTS: i32 = -30_995;
    pub const CORRUPT: i32 = -30_986;
    pub const READONLY: i32 = 30;
    pub const IO: i32 = 5;
    pub const INVALID: i32 = 22;
    pub const NOT_OPEN: i32 = -30_974;
}

/// Key or duplicate-data order
pub type Comparator = fn(&[u8], &[u8]) -> Ordering;

/// Derive a secondary key from a primary `(key, data)` pair; `None` leaves
/// the record out of the secondary
pub type Extractor = Arc<dyn Fn(&[u8], &[u8]) -> Result<Option<Vec<u8>>> + Send + Sync>;

/// Directory of tables sharing one lifecycle
pub struct Environment {
    dir: PathBuf,
    readonly: bool,
    dbs: DashMap<String, Arc<Db>>,
    closed: AtomicBool,
}

impl Environment {
    /// Open the environment at `dir`, creating it unless `readonly`
    pub fn open(dir: impl AsRef<Path>, readonly: bool) -> Result<Arc<Self>> {
        let dir = dir.as_ref().to_path_buf();
        if readonly {
            if !dir.is_dir() {
                return Err(Error::engine(
                    code::NOT_FOUND,
                    format!("environment {} does not exist", dir.display()),
                ));
            }
        } else {
            std::fs::create_dir_all(&dir)?;
        }

        info!(path = ?dir, readonly, "Environment opened");
        Ok(Arc::new(Self {
            dir,
            readonly,
            dbs: DashMap::new(),
            closed: AtomicBool::new(false),
        }))
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// Open a table; each name may be open once
    pub fn open_db(&self, config: DbConfig) -> Result<Arc<Db>> {
        if self.closed.load(AtomicOrdering::Acquire) {
            return Err(Error::engine(code::NOT_OPEN, "environment is closed"));
        }
        if self.dbs.contains_key(&config.name) {
            return Err(Error::engine(
                code::KEY_EXISTS,
                format!("table {} is already open", config.name),
            ));
        }

        let name = config.name.clone();
        let db = Db::open(&self.dir, config, self.readonly)?;
        self.dbs.insert(name, Arc::clone(&db));
        Ok(db)
    }

    pub fn db(&self, name: &str) -> Option<Arc<Db>> {
        self.dbs.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn db_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.dbs.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// Close one table and forget it
    pub fn close_db(&self, name: &str) -> Result<()> {
        match self.dbs.remove(name) {
            Some((_, db)) => db.close(),
            None => Ok(()),
        }
    }

    fn open_dbs(&self) -> Vec<Arc<Db>> {
        self.dbs.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    /// Write `percent` of every table's dirty pages; returns pages written
    pub fn trickle(&self, percent: u32) -> Result<usize> {
        let mut written = 0;
        for db in self.open_dbs() {
            written += db.trickle(percent)?;
        }
        Ok(written)
    }

    pub fn dirty_pages(&self) -> usize {
        self.open_dbs().iter().map(|db| db.dirty_pages()).sum()
    }

    /// Sync every open table
    pub fn flush(&self) -> Result<()> {
        for db in self.open_dbs() {
            db.sync()?;
        }
        Ok(())
    }

    /// fsync every table log without writing pending pages
    pub fn fsync(&self) -> Result<()> {
        for db in self.open_dbs() {
            db.fsync()?;
        }
        Ok(())
    }

    /// Close every table. Keeps going past failures and reports the first.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, AtomicOrdering::AcqRel) {
            return Ok(());
        }

        let mut first_error = None;
        for name in self.db_names() {
            if let Err(e) = self.close_db(&name) {
                error!(table = %name, "Failed to close table: {}", e);
                first_error.get_or_insert(e);
            }
        }
        debug!(path = ?self.dir, "Environment closed");
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for Environment {
    fn drop(&mut self) {
        if !self.closed.load(AtomicOrdering::Acquire) {
            if let Err(e) = self.close() {
                error!("Environment close on drop failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::compare;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("statstore_env_{}_{}", name, std::process::id()));
        std::fs::remove_dir_all(&dir).ok();
        dir
    }

    #[test]
    fn test_open_db_twice_fails() -> Result<()> {
        let dir = temp_dir("twice");
        let env = Environment::open(&dir, false)?;
        env.open_db(DbConfig::new("t", compare::u64_le))?;
        let err = env.open_db(DbConfig::new("t", compare::u64_le)).err().and_then(|e| e.code());
        assert_eq!(err, Some(code::KEY_EXISTS));
        env.close()?;
        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[test]
    fn test_readonly_requires_existing_dir() {
        let dir = temp_dir("missing");
        let err = Environment::open(&dir, true).err().map(|e| e.code());
        assert_eq!(err, Some(Some(code::NOT_FOUND)));
    }

    #[test]
    fn test_trickle_and_close() -> Result<()> {
        let dir = temp_dir("trickle");
        let env = Environment::open(&dir, false)?;
        let a = env.open_db(DbConfig::new("a", compare::u64_le))?;
        let b = env.open_db(DbConfig::new("b", compare::u64_le))?;
        for i in 0..10u64 {
            a.put(&i.to_le_bytes(), b"x")?;
            b.put(&i.to_le_bytes(), b"y")?;
        }
        assert_eq!(env.dirty_pages(), 20);
        assert_eq!(env.trickle(50)?, 10);
        env.close()?;
        env.close()?;
        assert!(!a.is_open());

        let env = Environment::open(&dir, true)?;
        let a = env.open_db(DbConfig::new("a", compare::u64_le))?;
        assert_eq!(a.count(), 10);
        env.close()?;
        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }
}
