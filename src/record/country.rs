//! Country record

use super::Record;
use crate::codec::{Reader, Writer};
use crate::error::Result;

/// Per-country totals, keyed by the packed two-letter country code
///
/// ```text
/// v1: [version][ccode 2][hits][files][pages][xfer][visits]
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountryRecord {
    pub ccode: [u8; 2],
    pub hits: u64,
    pub files: u64,
    pub pages: u64,
    pub xfer: u64,
    pub visits: u64,
}

impl CountryRecord {
    pub fn new(ccode: [u8; 2]) -> Self {
        Self {
            ccode,
            ..Default::default()
        }
    }

    /// Lowercased code packed into the low 16 bits
    pub fn pack_ccode(ccode: [u8; 2]) -> u64 {
        u64::from(ccode[0].to_ascii_lowercase()) | u64::from(ccode[1].to_ascii_lowercase()) << 8
    }

    pub fn unpack_ccode(key: u64) -> [u8; 2] {
        [(key & 0xff) as u8, ((key >> 8) & 0xff) as u8]
    }
}

impl Record for CountryRecord {
    const NAME: &'static str = "CountryRecord";
    const VERSION: u16 = 1;
    const TABLE: &'static str = "countries";

    fn key(&self) -> u64 {
        Self::pack_ccode(self.ccode)
    }

    fn set_key(&mut self, key: u64) {
        self.ccode = Self::unpack_ccode(key);
    }

    fn data_size(&self) -> usize {
        2 + 2 + 8 * 5
    }

    fn pack_fields(&self, w: &mut Writer<'_>) -> Result<()> {
        w.put(&self.ccode)?;
        w.put(&self.hits)?;
        w.put(&self.files)?;
        w.put(&self.pages)?;
        w.put(&self.xfer)?;
        w.put(&self.visits)
    }

    fn unpack_fields(&mut self, r: &mut Reader<'_>, _version: u16) -> Result<()> {
        self.ccode = r.get()?;
        self.hits = r.get()?;
        self.files = r.get()?;
        self.pages = r.get()?;
        self.xfer = r.get()?;
        self.visits = r.get()?;
        Ok(())
    }
}
