//! Failed request record (URL + method + status code)

use super::{base, hash_num, hash_str, Record, RecordKind, ValueRecord};
use crate::codec::{self, Reader, Writer};
use crate::error::Result;
use std::cmp::Ordering;

/// A URL that produced an error response. Identity is the URL, the method
/// and the status code together.
///
/// ```text
/// v1: [base][status u16][method text][hits][hash]
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorRecord {
    pub key: u64,
    pub kind: RecordKind,
    pub url: String,
    pub status: u16,
    pub method: String,
    pub hits: u64,
}

impl ErrorRecord {
    pub fn new(url: impl Into<String>, method: impl Into<String>, status: u16) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            status,
            ..Default::default()
        }
    }

    fn hits_offset(data: &[u8]) -> Result<usize> {
        let method = base::fields_offset(data)? + 2;
        codec::skip_field::<String>(data, method)
    }

    pub fn field_hits(data: &[u8]) -> Result<&[u8]> {
        codec::field_slice::<u64>(data, Self::hits_offset(data)?)
    }
}

impl Record for ErrorRecord {
    const NAME: &'static str = "ErrorRecord";
    const VERSION: u16 = 1;
    const TABLE: &'static str = "errors";

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
        base::size(&self.url) + 2 + codec::size_of(&self.method) + 8 * 2
    }

    fn pack_fields(&self, w: &mut Writer<'_>) -> Result<()> {
        base::pack(w, self.kind, &self.url)?;
        w.put(&self.status)?;
        w.put(&self.method)?;
        w.put(&self.hits)?;
        w.put(&self.hash_value())
    }

    fn unpack_fields(&mut self, r: &mut Reader<'_>, _version: u16) -> Result<()> {
        (self.kind, self.url) = base::unpack(r)?;
        self.status = r.get()?;
        self.method = r.get()?;
        self.hits = r.get()?;
        r.skip::<u64>()
    }
}

impl ValueRecord for ErrorRecord {
    fn value(&self) -> &str {
        &self.url
    }

    fn hash_value(&self) -> u64 {
        let h = hash_str(hash_str(0, &self.url), &self.method);
        hash_num(h, u64::from(self.status))
    }

    fn compare_value(&self, data: &[u8]) -> Result<Ordering> {
        let (kind, url) = base::unpack_ident(data)?;
        let mut r = Reader::at(data, base::fields_offset(data)?);
        let status = r.get::<u16>()?;
        let method = r.get::<String>()?;

        Ok(self
            .kind
            .cmp(&kind)
            .then_with(|| self.url.cmp(&url))
            .then_with(|| self.method.cmp(&method))
            .then_with(|| self.status.cmp(&status)))
    }

    fn value_hash_field(data: &[u8]) -> Result<&[u8]> {
        codec::field_slice::<u64>(data, Self::hits_offset(data)? + 8)
    }
}
