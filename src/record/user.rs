//! Authenticated user record

use super::{base, Record, RecordKind, ValueRecord};
use crate::codec::{self, Reader, Tstamp, Writer};
use crate::error::Result;

/// ```text
/// v1: [base][hits][files][xfer][hash]
/// v2: + [avg_time f64][max_time f64]
/// v3: + [last tstamp]
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserRecord {
    pub key: u64,
    pub kind: RecordKind,
    pub user: String,
    pub hits: u64,
    pub files: u64,
    pub xfer: u64,
    pub avg_time: f64,
    pub max_time: f64,
    pub last_seen: Option<Tstamp>,
}

impl UserRecord {
    pub fn new(user: impl Into<String>, kind: RecordKind) -> Self {
        Self {
            user: user.into(),
            kind,
            ..Default::default()
        }
    }

    pub fn field_hits(data: &[u8]) -> Result<&[u8]> {
        codec::field_slice::<u64>(data, base::fields_offset(data)?)
    }
}

impl Record for UserRecord {
    const NAME: &'static str = "UserRecord";
    const VERSION: u16 = 3;
    const TABLE: &'static str = "users";

    fn key(&self) -> u64 {
        self.key
    }

    fn set_key(&mut self, key: u64) {
        self.key = key;
    }

    fn kind(&self) -> RecordKind {
        self.kind
    }

    fn data_size(&self) -> usize {
        base::size(&self.user) + 8 * 4 + 8 * 2 + codec::size_of(&self.last_seen)
    }

    fn pack_fields(&self, w: &mut Writer<'_>) -> Result<()> {
        base::pack(w, self.kind, &self.user)?;
        w.put(&self.hits)?;
        w.put(&self.files)?;
        w.put(&self.xfer)?;
        w.put(&self.hash_value())?;
        w.put(&self.avg_time)?;
        w.put(&self.max_time)?;
        w.put(&self.last_seen)
    }

    fn unpack_fields(&mut self, r: &mut Reader<'_>, version: u16) -> Result<()> {
        (self.kind, self.user) = base::unpack(r)?;
        self.hits = r.get()?;
        self.files = r.get()?;
        self.xfer = r.get()?;
        r.skip::<u64>()?;

        if version >= 2 {
            self.avg_time = r.get()?;
            self.max_time = r.get()?;
        } else {
            self.avg_time = 0.0;
            self.max_time = 0.0;
        }
        self.last_seen = if version >= 3 { r.get()? } else { None };
        Ok(())
    }
}

impl ValueRecord for UserRecord {
    fn value(&self) -> &str {
        &self.user
    }

    fn value_hash_field(data: &[u8]) -> Result<&[u8]> {
        codec::field_slice::<u64>(data, base::fields_offset(data)? + 24)
    }
}
