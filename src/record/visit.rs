//! Active visit record

use super::{Arena, Handle, Record, UrlRecord};
use crate::codec::{self, Reader, Tstamp, Writer};
use crate::error::Result;

/// An open visit, keyed by the key of the host making it
///
/// ```text
/// v1: [version][start tstamp][end tstamp][hits][files][pages][xfer]
///     [entry_url u64][last_url u64][robot u8][converted u8]
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisitRecord {
    pub host_key: u64,
    pub start: Option<Tstamp>,
    pub end: Option<Tstamp>,
    pub hits: u64,
    pub files: u64,
    pub pages: u64,
    pub xfer: u64,
    pub entry_url: u64,
    last_url: Option<Handle>,
    last_url_key: u64,
    pub robot: bool,
    pub converted: bool,
}

impl VisitRecord {
    pub fn new(host_key: u64, start: Tstamp) -> Self {
        Self {
            host_key,
            start: Some(start),
            end: Some(start),
            ..Default::default()
        }
    }

    pub fn last_url(&self) -> Option<Handle> {
        self.last_url
    }

    pub fn last_url_key(&self) -> u64 {
        self.last_url_key
    }

    /// Move the last-URL reference, keeping the URL arena counts right
    pub fn set_last_url(&mut self, urls: &mut Arena<UrlRecord>, url: Option<Handle>) -> Result<()> {
        urls.set_ref(&mut self.last_url, url)?;
        self.last_url_key = url.and_then(|h| urls.get(h)).map_or(0, |u| u.key);
        Ok(())
    }
}

impl Record for VisitRecord {
    const NAME: &'static str = "VisitRecord";
    const VERSION: u16 = 1;
    const TABLE: &'static str = "visits.active";

    fn key(&self) -> u64 {
        self.host_key
    }

    fn set_key(&mut self, key: u64) {
        self.host_key = key;
    }

    fn data_size(&self) -> usize {
        2 + codec::size_of(&self.start) + codec::size_of(&self.end) + 8 * 6 + 2
    }

    fn pack_fields(&self, w: &mut Writer<'_>) -> Result<()> {
        w.put(&self.start)?;
        w.put(&self.end)?;
        w.put(&self.hits)?;
        w.put(&self.files)?;
        w.put(&self.pages)?;
        w.put(&self.xfer)?;
        w.put(&self.entry_url)?;
        w.put(&self.last_url_key)?;
        w.put(&self.robot)?;
        w.put(&self.converted)
    }

    fn unpack_fields(&mut self, r: &mut Reader<'_>, _version: u16) -> Result<()> {
        self.start = r.get()?;
        self.end = r.get()?;
        self.hits = r.get()?;
        self.files = r.get()?;
        self.pages = r.get()?;
        self.xfer = r.get()?;
        self.entry_url = r.get()?;
        self.last_url = None;
        self.last_url_key = r.get()?;
        self.robot = r.get()?;
        self.converted = r.get()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::testing::{decode, reload, Golden};
    use crate::record::RecordKind;

    #[test]
    fn test_last_url_reference() -> Result<()> {
        let mut urls = Arena::new();
        let mut page = UrlRecord::new("/a", RecordKind::Regular);
        page.key = 7;
        let a = urls.insert(page);

        let mut visit = VisitRecord::new(1, Tstamp::utc(2021, 1, 1, 0, 0, 0));
        visit.set_last_url(&mut urls, Some(a))?;
        assert_eq!(visit.last_url_key(), 7);
        assert_eq!(urls.ref_count(a), 1);

        // referenced URL cannot leave the arena while the visit points at it
        assert!(urls.remove(a).is_err());
        visit.set_last_url(&mut urls, None)?;
        assert!(urls.remove(a).is_ok());
        Ok(())
    }

    #[test]
    fn test_round_trip() -> Result<()> {
        let mut visit = VisitRecord::new(9, Tstamp::utc(2021, 1, 1, 10, 0, 0));
        visit.end = Some(Tstamp::utc(2021, 1, 1, 10, 20, 0));
        visit.hits = 4;
        visit.entry_url = 3;
        visit.converted = true;
        assert_eq!(reload(&visit)?, visit);
        Ok(())
    }

    #[test]
    fn test_v1_golden_null_times() -> Result<()> {
        let data = Golden::default()
            .u16(1)
            .u8(1)
            .u8(1)
            .u64(1)
            .u64(1)
            .u64(1)
            .u64(100)
            .u64(5)
            .u64(6)
            .u8(0)
            .u8(0)
            .0;
        let visit: VisitRecord = decode(&data)?;
        assert_eq!((visit.start, visit.end), (None, None));
        assert_eq!((visit.entry_url, visit.last_url_key()), (5, 6));
        Ok(())
    }
}
