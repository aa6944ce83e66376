//! Persistent id sequences

use super::code;
use super::db::Db;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// First value handed out by a new sequence
pub const INITIAL_VALUE: u64 = 1;

struct SeqState {
    next: u64,
    /// Values below this are reserved on disk
    limit: u64,
    open: bool,
}

/// Monotonic id generator stored under one key of a table
///
/// Values are reserved `cache` at a time: the stored value is the upper
/// bound of the reservation, so a crash skips ids but never reuses one.
/// A clean close stores the exact next value.
pub struct Sequence {
    db: Arc<Db>,
    key: Vec<u8>,
    cache: u64,
    state: Mutex<SeqState>,
}

impl Sequence {
    pub fn open(db: Arc<Db>, name: &str, cache: u32) -> Result<Self> {
        let key = name.as_bytes().to_vec();
        let next = match db.get(&key)? {
            Some(stored) => {
                let bytes: [u8; 8] = stored.as_slice().try_into().map_err(|_| {
                    Error::engine(
                        code::CORRUPT,
                        format!("sequence {} holds {} bytes", name, stored.len()),
                    )
                })?;
                u64::from_le_bytes(bytes)
            }
            None => INITIAL_VALUE,
        };

        debug!(sequence = %name, next, "Sequence opened");
        Ok(Self {
            db,
            key,
            cache: u64::from(cache.max(1)),
            state: Mutex::new(SeqState {
                next,
                limit: next,
                open: true,
            }),
        })
    }

    /// Take `delta` values; returns the first of them
    pub fn get(&self, delta: u32) -> Result<u64> {
        let delta = u64::from(delta);
        if delta == 0 {
            return Err(Error::engine(code::INVALID, "sequence delta must be positive"));
        }

        let mut state = self.state.lock();
        if !state.open {
            return Err(Error::engine(code::NOT_OPEN, "sequence is closed"));
        }
        if state.next + delta > state.limit {
            let limit = state.next + delta.max(self.cache);
            self.db.put(&self.key, &limit.to_le_bytes())?;
            state.limit = limit;
        }

        let value = state.next;
        state.next += delta;
        Ok(value)
    }

    /// Next value `get` would return
    pub fn query(&self) -> u64 {
        self.state.lock().next
    }

    /// Store the exact next value; later calls fail
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        if !state.open {
            return Ok(());
        }
        state.open = false;
        if state.next != state.limit && self.db.is_open() {
            self.db.put(&self.key, &state.next.to_le_bytes())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::compare;
    use crate::storage::kv::{DbConfig, Environment};

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("statstore_seq_{}_{}", name, std::process::id()));
        std::fs::remove_dir_all(&dir).ok();
        dir
    }

    #[test]
    fn test_starts_at_one_and_continues() -> Result<()> {
        let dir = temp_dir("continue");
        {
            let env = Environment::open(&dir, false)?;
            let db = env.open_db(DbConfig::new("t.seq", compare::bytes))?;
            let seq = Sequence::open(db, "seq", 100)?;
            assert_eq!(seq.get(1)?, 1);
            assert_eq!(seq.get(1)?, 2);
            assert_eq!(seq.get(5)?, 3);
            assert_eq!(seq.query(), 8);
            seq.close()?;
            env.close()?;
        }

        let env = Environment::open(&dir, false)?;
        let db = env.open_db(DbConfig::new("t.seq", compare::bytes))?;
        let seq = Sequence::open(db, "seq", 100)?;
        assert_eq!(seq.get(1)?, 8);
        seq.close()?;
        assert!(seq.get(1).is_err());
        env.close()?;
        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[test]
    fn test_unclean_close_skips_reserved_values() -> Result<()> {
        let dir = temp_dir("unclean");
        {
            let env = Environment::open(&dir, false)?;
            let db = env.open_db(DbConfig::new("t.seq", compare::bytes))?;
            let seq = Sequence::open(db, "seq", 10)?;
            assert_eq!(seq.get(1)?, 1);
            env.close()?;
        }

        let env = Environment::open(&dir, false)?;
        let db = env.open_db(DbConfig::new("t.seq", compare::bytes))?;
        let seq = Sequence::open(db, "seq", 10)?;
        assert_eq!(seq.get(1)?, 11);
        env.close()?;
        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }
}
