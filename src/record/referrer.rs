//! Referrer record

use super::{base, Record, RecordKind, ValueRecord};
use crate::codec::{self, Reader, Writer};
use crate::error::Result;

/// ```text
/// v1: [base][hits][hash]
/// v2: + [visits]
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferrerRecord {
    pub key: u64,
    pub kind: RecordKind,
    pub referrer: String,
    pub hits: u64,
    pub visits: u64,
}

impl ReferrerRecord {
    pub fn new(referrer: impl Into<String>, kind: RecordKind) -> Self {
        Self {
            referrer: referrer.into(),
            kind,
            ..Default::default()
        }
    }

    pub fn field_hits(data: &[u8]) -> Result<&[u8]> {
        codec::field_slice::<u64>(data, base::fields_offset(data)?)
    }
}

impl Record for ReferrerRecord {
    const NAME: &'static str = "ReferrerRecord";
    const VERSION: u16 = 2;
    const TABLE: &'static str = "referrers";

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
        base::size(&self.referrer) + 8 * 3
    }

    fn pack_fields(&self, w: &mut Writer<'_>) -> Result<()> {
        base::pack(w, self.kind, &self.referrer)?;
        w.put(&self.hits)?;
        w.put(&self.hash_value())?;
        w.put(&self.visits)
    }

    fn unpack_fields(&mut self, r: &mut Reader<'_>, version: u16) -> Result<()> {
        (self.kind, self.referrer) = base::unpack(r)?;
        self.hits = r.get()?;
        r.skip::<u64>()?;
        self.visits = if version >= 2 { r.get()? } else { 0 };
        Ok(())
    }
}

impl ValueRecord for ReferrerRecord {
    fn value(&self) -> &str {
        &self.referrer
    }

    fn value_hash_field(data: &[u8]) -> Result<&[u8]> {
        codec::field_slice::<u64>(data, base::fields_offset(data)? + 8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::hash_str;
    use crate::record::testing::{decode, reload, Golden};

    #[test]
    fn test_round_trip() -> Result<()> {
        let mut referrer = ReferrerRecord::new("https://search.example/", RecordKind::Group);
        referrer.key = 1;
        referrer.hits = 4;
        referrer.visits = 2;
        assert_eq!(reload(&referrer)?, referrer);
        Ok(())
    }

    #[test]
    fn test_v1_golden() -> Result<()> {
        let data = Golden::default()
            .u16(1)
            .u8(0)
            .text("-")
            .u64(31)
            .u64(hash_str(0, "-"))
            .0;
        let referrer: ReferrerRecord = decode(&data)?;
        assert_eq!(referrer.hits, 31);
        assert_eq!(referrer.visits, 0);
        assert_eq!(ReferrerRecord::field_hits(&data)?, &31u64.to_le_bytes());
        Ok(())
    }
}
