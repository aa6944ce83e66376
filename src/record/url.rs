//! URL record

use super::{base, Record, RecordKind, ValueRecord};
use crate::codec::{self, Reader, Writer};
use crate::error::Result;

/// Request URL (or URL group)
///
/// ```text
/// v1: [base][type u8][hits][files][entry][exit][xfer][avg_time f64][hash]
/// v2: + [target u8]
/// v3: + [max_time f64]
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UrlRecord {
    pub key: u64,
    pub kind: RecordKind,
    pub url: String,
    pub url_type: u8,
    pub hits: u64,
    pub files: u64,
    /// Visits that started on this URL
    pub entry: u64,
    /// Visits that ended on this URL
    pub exit: u64,
    pub xfer: u64,
    pub avg_time: f64,
    /// Conversion target
    pub target: bool,
    pub max_time: f64,
}

impl UrlRecord {
    pub const TYPE_OTHER: u8 = 0;
    pub const TYPE_HTTP: u8 = 1;
    pub const TYPE_HTTPS: u8 = 2;

    pub fn new(url: impl Into<String>, kind: RecordKind) -> Self {
        Self {
            url: url.into(),
            kind,
            ..Default::default()
        }
    }

    fn field_at(data: &[u8], offset: usize) -> Result<&[u8]> {
        codec::field_slice::<u64>(data, base::fields_offset(data)? + offset)
    }

    pub fn field_hits(data: &[u8]) -> Result<&[u8]> {
        Self::field_at(data, 1)
    }

    pub fn field_entry(data: &[u8]) -> Result<&[u8]> {
        Self::field_at(data, 17)
    }

    pub fn field_exit(data: &[u8]) -> Result<&[u8]> {
        Self::field_at(data, 25)
    }

    pub fn field_xfer(data: &[u8]) -> Result<&[u8]> {
        Self::field_at(data, 33)
    }
}

impl Record for UrlRecord {
    const NAME: &'static str = "UrlRecord";
    const VERSION: u16 = 3;
    const TABLE: &'static str = "urls";

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
        base::size(&self.url) + 1 + 8 * 7 + 1 + 8
    }

    fn pack_fields(&self, w: &mut Writer<'_>) -> Result<()> {
        base::pack(w, self.kind, &self.url)?;
        w.put(&self.url_type)?;
        w.put(&self.hits)?;
        w.put(&self.files)?;
        w.put(&self.entry)?;
        w.put(&self.exit)?;
        w.put(&self.xfer)?;
        w.put(&self.avg_time)?;
        w.put(&self.hash_value())?;
        w.put(&self.target)?;
        w.put(&self.max_time)
    }

    fn unpack_fields(&mut self, r: &mut Reader<'_>, version: u16) -> Result<()> {
        (self.kind, self.url) = base::unpack(r)?;
        self.url_type = r.get()?;
        self.hits = r.get()?;
        self.files = r.get()?;
        self.entry = r.get()?;
        self.exit = r.get()?;
        self.xfer = r.get()?;
        self.avg_time = r.get()?;
        r.skip::<u64>()?;

        self.target = if version >= 2 { r.get()? } else { false };
        // older layouts only tracked the average
        self.max_time = if version >= 3 { r.get()? } else { self.avg_time };
        Ok(())
    }
}

impl ValueRecord for UrlRecord {
    fn value(&self) -> &str {
        &self.url
    }

    fn value_hash_field(data: &[u8]) -> Result<&[u8]> {
        Self::field_at(data, 49)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::hash_str;
    use crate::record::testing::{decode, reload, Golden};

    fn v1(url: &str) -> Golden {
        Golden::default()
            .u16(1)
            .u8(0)
            .text(url)
            .u8(UrlRecord::TYPE_HTTP)
            .u64(20)
            .u64(18)
            .u64(4)
            .u64(5)
            .u64(4096)
            .f64(1.5)
            .u64(hash_str(0, url))
    }

    #[test]
    fn test_current_version_round_trip() -> Result<()> {
        let mut url = UrlRecord::new("/index.html", RecordKind::Regular);
        url.key = 8;
        url.url_type = UrlRecord::TYPE_HTTPS;
        url.hits = 9;
        url.entry = 2;
        url.exit = 1;
        url.target = true;
        url.avg_time = 0.25;
        url.max_time = 2.0;
        assert_eq!(reload(&url)?, url);
        Ok(())
    }

    #[test]
    fn test_v1_golden() -> Result<()> {
        let url: UrlRecord = decode(&v1("/a.html").0)?;
        assert_eq!(url.url, "/a.html");
        assert_eq!((url.hits, url.files, url.entry, url.exit), (20, 18, 4, 5));
        assert_eq!(url.xfer, 4096);
        assert!(!url.target);
        assert_eq!(url.max_time, 1.5);
        Ok(())
    }

    #[test]
    fn test_v2_golden() -> Result<()> {
        let mut golden = v1("/checkout").u8(1);
        golden.0[0] = 2;
        let url: UrlRecord = decode(&golden.0)?;
        assert!(url.target);
        assert_eq!(url.max_time, 1.5);
        Ok(())
    }

    #[test]
    fn test_field_accessors() -> Result<()> {
        let data = v1("/b.html").0;
        assert_eq!(UrlRecord::field_hits(&data)?, &20u64.to_le_bytes());
        assert_eq!(UrlRecord::field_entry(&data)?, &4u64.to_le_bytes());
        assert_eq!(UrlRecord::field_exit(&data)?, &5u64.to_le_bytes());
        assert_eq!(UrlRecord::field_xfer(&data)?, &4096u64.to_le_bytes());
        assert_eq!(
            UrlRecord::value_hash_field(&data)?,
            &hash_str(0, "/b.html").to_le_bytes()
        );
        Ok(())
    }
}
