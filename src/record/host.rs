//! Host record

use super::{base, Record, RecordKind, ValueRecord};
use crate::codec::{self, Reader, Tstamp, Writer};
use crate::error::Result;

/// One client address (or host group)
///
/// ```text
/// v1: [base][spammer u8][hits][files][pages][xfer][visits][hash]
///     [name text][ccode 2]
/// v2: + [robot u8]
/// v3: + [last tstamp]
/// v4: + [city text][latitude f64][longitude f64]
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostRecord {
    pub key: u64,
    pub kind: RecordKind,
    pub address: String,
    pub spammer: bool,
    pub hits: u64,
    pub files: u64,
    pub pages: u64,
    pub xfer: u64,
    pub visits: u64,
    /// Resolved host name, empty if unresolved
    pub name: String,
    pub ccode: [u8; 2],
    pub robot: bool,
    pub last_seen: Option<Tstamp>,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl HostRecord {
    pub fn new(address: impl Into<String>, kind: RecordKind) -> Self {
        Self {
            address: address.into(),
            kind,
            ..Default::default()
        }
    }

    pub fn field_hits(data: &[u8]) -> Result<&[u8]> {
        codec::field_slice::<u64>(data, base::fields_offset(data)? + 1)
    }

    pub fn field_xfer(data: &[u8]) -> Result<&[u8]> {
        codec::field_slice::<u64>(data, base::fields_offset(data)? + 25)
    }
}

impl Record for HostRecord {
    const NAME: &'static str = "HostRecord";
    const VERSION: u16 = 4;
    const TABLE: &'static str = "hosts";

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
        base::size(&self.address)
            + 1
            + 8 * 6
            + codec::size_of(&self.name)
            + 2
            + 1
            + codec::size_of(&self.last_seen)
            + codec::size_of(&self.city)
            + 8 * 2
    }

    fn pack_fields(&self, w: &mut Writer<'_>) -> Result<()> {
        base::pack(w, self.kind, &self.address)?;
        w.put(&self.spammer)?;
        w.put(&self.hits)?;
        w.put(&self.files)?;
        w.put(&self.pages)?;
        w.put(&self.xfer)?;
        w.put(&self.visits)?;
        w.put(&self.hash_value())?;
        w.put(&self.name)?;
        w.put(&self.ccode)?;
        w.put(&self.robot)?;
        w.put(&self.last_seen)?;
        w.put(&self.city)?;
        w.put(&self.latitude)?;
        w.put(&self.longitude)
    }

    fn unpack_fields(&mut self, r: &mut Reader<'_>, version: u16) -> Result<()> {
        (self.kind, self.address) = base::unpack(r)?;
        self.spammer = r.get()?;
        self.hits = r.get()?;
        self.files = r.get()?;
        self.pages = r.get()?;
        self.xfer = r.get()?;
        self.visits = r.get()?;
        r.skip::<u64>()?; // value hash
        self.name = r.get()?;
        self.ccode = r.get()?;

        self.robot = if version >= 2 { r.get()? } else { false };
        self.last_seen = if version >= 3 { r.get()? } else { None };

        if version >= 4 {
            self.city = r.get()?;
            self.latitude = r.get()?;
            self.longitude = r.get()?;
        } else {
            self.city.clear();
            self.latitude = 0.0;
            self.longitude = 0.0;
        }
        Ok(())
    }
}

impl ValueRecord for HostRecord {
    fn value(&self) -> &str {
        &self.address
    }

    fn value_hash_field(data: &[u8]) -> Result<&[u8]> {
        codec::field_slice::<u64>(data, base::fields_offset(data)? + 41)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::hash_str;
    use crate::record::testing::{decode, reload, Golden};

    fn v1_prefix(address: &str) -> Golden {
        Golden::default()
            .u16(1)
            .u8(0)
            .text(address)
            .u8(0)
            .u64(10)
            .u64(8)
            .u64(4)
            .u64(2048)
            .u64(3)
            .u64(hash_str(0, address))
            .text("gw.example.net")
            .bytes(b"ca")
    }

    #[test]
    fn test_current_version_round_trip() -> Result<()> {
        let mut host = HostRecord::new("192.0.2.7", RecordKind::Regular);
        host.key = 3;
        host.hits = 100;
        host.xfer = 1 << 40;
        host.name = "mail.example.org".into();
        host.ccode = *b"de";
        host.robot = true;
        host.last_seen = Some(Tstamp::local(2016, 1, 2, 3, 4, 5, 60));
        host.city = "Berlin".into();
        host.latitude = 52.52;
        host.longitude = 13.40;

        assert_eq!(reload(&host)?, host);
        Ok(())
    }

    #[test]
    fn test_v1_golden() -> Result<()> {
        let host: HostRecord = decode(&v1_prefix("192.0.2.1").0)?;
        assert_eq!(host.address, "192.0.2.1");
        assert_eq!((host.hits, host.files, host.pages), (10, 8, 4));
        assert_eq!((host.xfer, host.visits), (2048, 3));
        assert_eq!(host.name, "gw.example.net");
        assert_eq!(&host.ccode, b"ca");
        assert!(!host.robot);
        assert_eq!(host.last_seen, None);
        assert!(host.city.is_empty());
        Ok(())
    }

    #[test]
    fn test_v3_golden() -> Result<()> {
        let mut golden = v1_prefix("192.0.2.2").u8(1);
        golden.0[0] = 3;
        // UTC timestamp 2012-12-31 23:00:00
        let data = golden.bytes(&[0, 1, 0xdc, 0x07, 12, 31, 23, 0, 0]).0;

        let host: HostRecord = decode(&data)?;
        assert!(host.robot);
        assert_eq!(host.last_seen, Some(Tstamp::utc(2012, 12, 31, 23, 0, 0)));
        assert_eq!(host.latitude, 0.0);
        Ok(())
    }

    #[test]
    fn test_field_accessors() -> Result<()> {
        let mut host = HostRecord::new("198.51.100.1", RecordKind::Regular);
        host.hits = 5;
        host.xfer = 6;
        let data = host.to_data()?;

        assert_eq!(HostRecord::field_hits(&data)?, &5u64.to_le_bytes());
        assert_eq!(HostRecord::field_xfer(&data)?, &6u64.to_le_bytes());
        assert_eq!(
            HostRecord::value_hash_field(&data)?,
            &host.hash_value().to_le_bytes()
        );
        Ok(())
    }

    #[test]
    fn test_newer_version_rejected() {
        let mut data = v1_prefix("192.0.2.3").0;
        data[..2].copy_from_slice(&9u16.to_le_bytes());
        let mut host = HostRecord::default();
        assert!(matches!(
            host.unpack_data(&data, None),
            Err(crate::error::Error::UnsupportedVersion { found: 9, .. })
        ));
    }
}
