//! HTTP status code record

use super::Record;
use crate::codec::{Reader, Writer};
use crate::error::Result;

/// Hit count of one HTTP status code, keyed by the code
///
/// ```text
/// v1: [version][count]
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusCodeRecord {
    pub code: u16,
    pub count: u64,
}

impl StatusCodeRecord {
    pub fn new(code: u16) -> Self {
        Self { code, count: 0 }
    }

    /// Status class, 1 for informational through 5 for server errors
    pub fn class(&self) -> u16 {
        self.code / 100
    }
}

impl Record for StatusCodeRecord {
    const NAME: &'static str = "StatusCodeRecord";
    const VERSION: u16 = 1;
    const TABLE: &'static str = "statuscodes";

    fn key(&self) -> u64 {
        u64::from(self.code)
    }

    fn set_key(&mut self, key: u64) {
        self.code = u16::try_from(key).unwrap_or(0);
    }

    fn data_size(&self) -> usize {
        2 + 8
    }

    fn pack_fields(&self, w: &mut Writer<'_>) -> Result<()> {
        w.put(&self.count)
    }

    fn unpack_fields(&mut self, r: &mut Reader<'_>, _version: u16) -> Result<()> {
        self.count = r.get()?;
        Ok(())
    }
}
