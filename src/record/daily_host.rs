//! Daily host record

use super::{base, Record, RecordKind, ValueRecord};
use crate::codec::{self, Reader, Writer};
use crate::error::Result;

/// A host seen on the current day; only its identity is stored
///
/// ```text
/// v1: [base][hash]
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyHostRecord {
    pub key: u64,
    pub kind: RecordKind,
    pub host: String,
}

impl DailyHostRecord {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }
}

impl Record for DailyHostRecord {
    const NAME: &'static str = "DailyHostRecord";
    const VERSION: u16 = 1;
    const TABLE: &'static str = "dhosts";

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
        base::size(&self.host) + 8
    }

    fn pack_fields(&self, w: &mut Writer<'_>) -> Result<()> {
        base::pack(w, self.kind, &self.host)?;
        w.put(&self.hash_value())
    }

    fn unpack_fields(&mut self, r: &mut Reader<'_>, _version: u16) -> Result<()> {
        (self.kind, self.host) = base::unpack(r)?;
        r.skip::<u64>()?;
        Ok(())
    }
}

impl ValueRecord for DailyHostRecord {
    fn value(&self) -> &str {
        &self.host
    }

    fn value_hash_field(data: &[u8]) -> Result<&[u8]> {
        codec::field_slice::<u64>(data, base::fields_offset(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::hash_str;
    use crate::record::testing::{decode, reload, Golden};

    #[test]
    fn test_round_trip() -> Result<()> {
        let mut host = DailyHostRecord::new("192.0.2.44");
        host.key = 8;
        assert_eq!(reload(&host)?, host);
        Ok(())
    }

    #[test]
    fn test_v1_golden() -> Result<()> {
        let hash = hash_str(0, "192.0.2.1");
        let data = Golden::default()
            .u16(1)
            .u8(0)
            .text("192.0.2.1")
            .u64(hash)
            .0;
        let host: DailyHostRecord = decode(&data)?;
        assert_eq!(host.host, "192.0.2.1");
        assert_eq!(host.kind, RecordKind::Regular);
        assert_eq!(DailyHostRecord::value_hash_field(&data)?, &hash.to_le_bytes());
        assert_eq!(host.to_data()?, data);
        Ok(())
    }
}
