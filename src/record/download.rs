//! Download job record

use super::{base, hash_num, hash_str, Arena, Handle, HostRecord, Record, RecordKind, ValueRecord};
use crate::codec::{self, Reader, Tstamp, Writer};
use crate::error::{Error, Result};
use std::cmp::Ordering;

/// A file download performed by one host. Identity is the download name
/// plus the owning host.
///
/// ```text
/// v1: [base][host_key u64][hits][xfer][sum_time f64][avg_time f64]
///     [last tstamp][hash]
/// ```
///
/// In memory the owner is an arena handle; storage keeps the host key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadRecord {
    pub key: u64,
    pub kind: RecordKind,
    pub name: String,
    host: Option<Handle>,
    host_key: u64,
    pub hits: u64,
    pub xfer: u64,
    pub sum_time: f64,
    pub avg_time: f64,
    pub last_seen: Option<Tstamp>,
}

impl DownloadRecord {
    pub fn new(name: impl Into<String>, host_key: u64) -> Self {
        Self {
            name: name.into(),
            host_key,
            ..Default::default()
        }
    }

    pub fn host(&self) -> Option<Handle> {
        self.host
    }

    pub fn host_key(&self) -> u64 {
        self.host_key
    }

    /// Point this download at a host record, keeping reference counts
    pub fn set_host(&mut self, hosts: &mut Arena<HostRecord>, host: Option<Handle>) -> Result<()> {
        hosts.set_ref(&mut self.host, host)?;
        self.host_key = match host.and_then(|h| hosts.get(h)) {
            Some(record) => record.key,
            None => 0,
        };
        Ok(())
    }

    /// Resolve the stored host key to an arena handle after a read
    pub fn resolve_host(&mut self, hosts: &mut Arena<HostRecord>) -> Result<()> {
        let key = self.host_key;
        let found = hosts
            .iter()
            .find(|(_, host)| host.key == key)
            .map(|(handle, _)| handle)
            .ok_or_else(|| Error::logic(format!("download {} refers to unknown host {}", self.key, key)))?;
        self.set_host(hosts, Some(found))
    }

    pub fn field_xfer(data: &[u8]) -> Result<&[u8]> {
        codec::field_slice::<u64>(data, base::fields_offset(data)? + 16)
    }
}

impl Record for DownloadRecord {
    const NAME: &'static str = "DownloadRecord";
    const VERSION: u16 = 1;
    const TABLE: &'static str = "downloads";

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
        base::size(&self.name) + 8 * 5 + codec::size_of(&self.last_seen) + 8
    }

    fn pack_fields(&self, w: &mut Writer<'_>) -> Result<()> {
        base::pack(w, self.kind, &self.name)?;
        w.put(&self.host_key)?;
        w.put(&self.hits)?;
        w.put(&self.xfer)?;
        w.put(&self.sum_time)?;
        w.put(&self.avg_time)?;
        w.put(&self.last_seen)?;
        w.put(&self.hash_value())
    }

    fn unpack_fields(&mut self, r: &mut Reader<'_>, _version: u16) -> Result<()> {
        (self.kind, self.name) = base::unpack(r)?;
        self.host = None;
        self.host_key = r.get()?;
        self.hits = r.get()?;
        self.xfer = r.get()?;
        self.sum_time = r.get()?;
        self.avg_time = r.get()?;
        self.last_seen = r.get()?;
        r.skip::<u64>()
    }
}

impl ValueRecord for DownloadRecord {
    fn value(&self) -> &str {
        &self.name
    }

    fn hash_value(&self) -> u64 {
        hash_num(hash_str(0, &self.name), self.host_key)
    }

    fn compare_value(&self, data: &[u8]) -> Result<Ordering> {
        let (kind, name) = base::unpack_ident(data)?;
        let host_key = codec::read_at::<u64>(data, base::fields_offset(data)?)?;
        Ok(self
            .kind
            .cmp(&kind)
            .then_with(|| self.name.cmp(&name))
            .then_with(|| self.host_key.cmp(&host_key)))
    }

    fn value_hash_field(data: &[u8]) -> Result<&[u8]> {
        let tstamp = base::fields_offset(data)? + 40;
        let hash = codec::skip_field::<Option<Tstamp>>(data, tstamp)?;
        codec::field_slice::<u64>(data, hash)
    }
}
