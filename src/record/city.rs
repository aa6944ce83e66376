//! City record

use super::{CountryRecord, Record};
use crate::codec::{self, Reader, Writer};
use crate::error::Result;

/// Per-city totals, keyed by country code and city geoname id
///
/// ```text
/// key: [geoname_id u32 | ccode << 32]
/// v1:  [version][ccode 2][city text][hits][files][pages][xfer][visits]
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CityRecord {
    pub geoname_id: u32,
    pub ccode: [u8; 2],
    pub city: String,
    pub hits: u64,
    pub files: u64,
    pub pages: u64,
    pub xfer: u64,
    pub visits: u64,
}

impl CityRecord {
    pub fn new(geoname_id: u32, ccode: [u8; 2], city: impl Into<String>) -> Self {
        Self {
            geoname_id,
            ccode,
            city: city.into(),
            ..Default::default()
        }
    }

    pub fn make_key(geoname_id: u32, ccode: [u8; 2]) -> u64 {
        u64::from(geoname_id) | CountryRecord::pack_ccode(ccode) << 32
    }
}

impl Record for CityRecord {
    const NAME: &'static str = "CityRecord";
    const VERSION: u16 = 1;
    const TABLE: &'static str = "cities";

    fn key(&self) -> u64 {
        Self::make_key(self.geoname_id, self.ccode)
    }

    fn set_key(&mut self, key: u64) {
        self.geoname_id = (key & 0xffff_ffff) as u32;
        self.ccode = CountryRecord::unpack_ccode(key >> 32);
    }

    fn data_size(&self) -> usize {
        2 + 2 + codec::size_of(&self.city) + 8 * 5
    }

    fn pack_fields(&self, w: &mut Writer<'_>) -> Result<()> {
        w.put(&self.ccode)?;
        w.put(&self.city)?;
        w.put(&self.hits)?;
        w.put(&self.files)?;
        w.put(&self.pages)?;
        w.put(&self.xfer)?;
        w.put(&self.visits)
    }

    fn unpack_fields(&mut self, r: &mut Reader<'_>, _version: u16) -> Result<()> {
        self.ccode = r.get()?;
        self.city = r.get()?;
        self.hits = r.get()?;
        self.files = r.get()?;
        self.pages = r.get()?;
        self.xfer = r.get()?;
        self.visits = r.get()?;
        Ok(())
    }
}
