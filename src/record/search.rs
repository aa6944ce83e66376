//! Search string record

use super::{base, Record, RecordKind, ValueRecord};
use crate::codec::{self, Reader, Writer};
use crate::error::Result;

/// ```text
/// v1: [base][term_count u16][hits][hash]
/// v2: + [visits]
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRecord {
    pub key: u64,
    pub kind: RecordKind,
    pub terms: String,
    pub term_count: u16,
    pub hits: u64,
    pub visits: u64,
}

impl SearchRecord {
    pub fn new(terms: impl Into<String>) -> Self {
        let terms = terms.into();
        let term_count = terms.split_whitespace().count().min(u16::MAX as usize) as u16;
        Self {
            terms,
            term_count,
            ..Default::default()
        }
    }

    pub fn field_hits(data: &[u8]) -> Result<&[u8]> {
        codec::field_slice::<u64>(data, base::fields_offset(data)? + 2)
    }
}

impl Record for SearchRecord {
    const NAME: &'static str = "SearchRecord";
    const VERSION: u16 = 2;
    const TABLE: &'static str = "search";

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
        base::size(&self.terms) + 2 + 8 * 3
    }

    fn pack_fields(&self, w: &mut Writer<'_>) -> Result<()> {
        base::pack(w, self.kind, &self.terms)?;
        w.put(&self.term_count)?;
        w.put(&self.hits)?;
        w.put(&self.hash_value())?;
        w.put(&self.visits)
    }

    fn unpack_fields(&mut self, r: &mut Reader<'_>, version: u16) -> Result<()> {
        (self.kind, self.terms) = base::unpack(r)?;
        self.term_count = r.get()?;
        self.hits = r.get()?;
        r.skip::<u64>()?;
        self.visits = if version >= 2 { r.get()? } else { 0 };
        Ok(())
    }
}

impl ValueRecord for SearchRecord {
    fn value(&self) -> &str {
        &self.terms
    }

    fn value_hash_field(data: &[u8]) -> Result<&[u8]> {
        codec::field_slice::<u64>(data, base::fields_offset(data)? + 10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::hash_str;
    use crate::record::testing::{decode, reload, Golden};

    #[test]
    fn test_term_count() {
        assert_eq!(SearchRecord::new("rust  storage engine").term_count, 3);
    }

    #[test]
    fn test_round_trip() -> Result<()> {
        let mut search = SearchRecord::new("web log");
        search.key = 77;
        search.hits = 3;
        search.visits = 1;
        assert_eq!(reload(&search)?, search);
        Ok(())
    }

    #[test]
    fn test_v1_golden() -> Result<()> {
        let data = Golden::default()
            .u16(1)
            .u8(0)
            .text("a b")
            .u16(2)
            .u64(6)
            .u64(hash_str(0, "a b"))
            .0;
        let search: SearchRecord = decode(&data)?;
        assert_eq!((search.term_count, search.hits, search.visits), (2, 6, 0));
        assert_eq!(SearchRecord::field_hits(&data)?, &6u64.to_le_bytes());
        assert_eq!(
            SearchRecord::value_hash_field(&data)?,
            &hash_str(0, "a b").to_le_bytes()
        );
        Ok(())
    }
}
