//! Autonomous system record

use super::Record;
use crate::codec::{self, Reader, Writer};
use crate::error::Result;

/// ```text
/// key: AS number
/// v1:  [version][org text][hits][files][pages][xfer][visits]
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AsnRecord {
    pub number: u32,
    pub org: String,
    pub hits: u64,
    pub files: u64,
    pub pages: u64,
    pub xfer: u64,
    pub visits: u64,
}

impl AsnRecord {
    pub fn new(number: u32, org: impl Into<String>) -> Self {
        Self {
            number,
            org: org.into(),
            ..Default::default()
        }
    }
}

impl Record for AsnRecord {
    const NAME: &'static str = "AsnRecord";
    const VERSION: u16 = 1;
    const TABLE: &'static str = "asn";

    fn key(&self) -> u64 {
        u64::from(self.number)
    }

    fn set_key(&mut self, key: u64) {
        self.number = key as u32;
    }

    fn data_size(&self) -> usize {
        2 + codec::size_of(&self.org) + 8 * 5
    }

    fn pack_fields(&self, w: &mut Writer<'_>) -> Result<()> {
        w.put(&self.org)?;
        w.put(&self.hits)?;
        w.put(&self.files)?;
        w.put(&self.pages)?;
        w.put(&self.xfer)?;
        w.put(&self.visits)
    }

    fn unpack_fields(&mut self, r: &mut Reader<'_>, _version: u16) -> Result<()> {
        self.org = r.get()?;
        self.hits = r.get()?;
        self.files = r.get()?;
        self.pages = r.get()?;
        self.xfer = r.get()?;
        self.visits = r.get()?;
        Ok(())
    }
}
