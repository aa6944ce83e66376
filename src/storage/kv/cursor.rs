//! Bidirectional cursor over one table

use super::db::{Db, DbKey};
use crate::error::Result;
use std::sync::Arc;

/// One cursor position
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: Vec<u8>,
    pub data: Vec<u8>,
    /// Primary data when the cursor walks a secondary
    pub primary: Option<Vec<u8>>,
}

/// Cursor that re-seeks from its last key on every move, so writes made
/// while it is open never invalidate it
pub struct Cursor {
    db: Arc<Db>,
    primary: Option<Arc<Db>>,
    pos: Option<DbKey>,
}

impl Cursor {
    pub(crate) fn new(db: Arc<Db>) -> Self {
        let primary = db.primary();
        Self {
            db,
            primary,
            pos: None,
        }
    }

    fn settle(&mut self, found: Option<(DbKey, Vec<u8>)>) -> Result<Option<Entry>> {
        let (key, data) = match found {
            Some(found) => found,
            None => return Ok(None),
        };

        let primary = match &self.primary {
            Some(primary) => primary.get(&data)?,
            None => None,
        };
        let entry = Entry {
            key: key.key.clone(),
            data,
            primary,
        };
        self.pos = Some(key);
        Ok(Some(entry))
    }

    pub fn first(&mut self) -> Result<Option<Entry>> {
        let found = self.db.first_entry();
        self.settle(found)
    }

    pub fn last(&mut self) -> Result<Option<Entry>> {
        let found = self.db.last_entry();
        self.settle(found)
    }

    /// Step forward; starts at the first entry on a fresh cursor
    pub fn next(&mut self) -> Result<Option<Entry>> {
        let found = match &self.pos {
            Some(pos) => self.db.entry_after(pos),
            None => self.db.first_entry(),
        };
        self.settle(found)
    }

    /// Step backward; starts at the last entry on a fresh cursor
    pub fn prev(&mut self) -> Result<Option<Entry>> {
        let found = match &self.pos {
            Some(pos) => self.db.entry_before(pos),
            None => self.db.last_entry(),
        };
        self.settle(found)
    }

    /// Position on the first entry for `key`
    pub fn set(&mut self, key: &[u8]) -> Result<Option<Entry>> {
        let found = self.db.entry_at(key);
        self.settle(found)
    }

    /// Next duplicate of the current key
    pub fn next_dup(&mut self) -> Result<Option<Entry>> {
        let pos = match &self.pos {
            Some(pos) => pos,
            None => return Ok(None),
        };
        let compare = self.db.compare();
        let found = self
            .db
            .entry_after(pos)
            .filter(|(k, _)| compare(&k.key, &pos.key).is_eq());
        self.settle(found)
    }

    /// Duplicates sharing the current key
    pub fn dup_count(&self) -> usize {
        self.pos.as_ref().map_or(0, |pos| self.db.dup_count(&pos.key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::record::compare;
    use crate::storage::kv::{DbConfig, Environment, Extractor};

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("statstore_cursor_{}_{}", name, std::process::id()));
        std::fs::remove_dir_all(&dir).ok();
        dir
    }

    #[test]
    fn test_walk_both_ways() -> Result<()> {
        let dir = temp_dir("walk");
        let env = Environment::open(&dir, false)?;
        let db = env.open_db(DbConfig::new("t", compare::u64_le))?;
        for i in 1..=5u64 {
            db.put(&i.to_le_bytes(), &(i * 100).to_le_bytes())?;
        }

        let mut cursor = db.cursor()?;
        let mut forward = 0;
        while cursor.next()?.is_some() {
            forward += 1;
        }
        assert_eq!(forward, 5);

        let mut cursor = db.cursor()?;
        let last = cursor.prev()?.map(|e| e.data);
        assert_eq!(last, Some(500u64.to_le_bytes().to_vec()));
        assert!(cursor.prev()?.is_some());
        env.close()?;
        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[test]
    fn test_secondary_joins_primary() -> Result<()> {
        let dir = temp_dir("join");
        let env = Environment::open(&dir, false)?;
        let primary = env.open_db(DbConfig::new("p", compare::u64_le))?;
        let secondary = env.open_db(
            DbConfig::new("p.len", compare::u64_le).with_duplicates(compare::u64_le),
        )?;
        let extractor: Extractor = Arc::new(|_key: &[u8], data: &[u8]| -> Result<Option<Vec<u8>>> {
            Ok(Some((data.len() as u64).to_le_bytes().to_vec()))
        });
        primary.associate(Arc::clone(&secondary), Some(extractor))?;

        primary.put(&1u64.to_le_bytes(), b"aa")?;
        primary.put(&2u64.to_le_bytes(), b"bb")?;
        primary.put(&3u64.to_le_bytes(), b"ccc")?;

        let mut cursor = secondary.cursor()?;
        let entry = cursor.set(&2u64.to_le_bytes())?.unwrap();
        assert_eq!(entry.data, 1u64.to_le_bytes().to_vec());
        assert_eq!(entry.primary, Some(b"aa".to_vec()));
        assert_eq!(cursor.dup_count(), 2);

        let dup = cursor.next_dup()?.unwrap();
        assert_eq!(dup.primary, Some(b"bb".to_vec()));
        assert!(cursor.next_dup()?.is_none());
        env.close()?;
        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }
}
