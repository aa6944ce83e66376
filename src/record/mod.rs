//! Keyed record model
//!
//! A record is a 64-bit key plus a versioned data payload. The key is packed
//! separately from the data and never counts toward [`Record::data_size`].
//!
//! ```text
//! key:   [u64 LE]
//! data:  [version u16][type fields...]
//! text-keyed data:
//!        [version u16][kind u8][value text][hash u64 somewhere][type fields...]
//! ```
//!
//! Text-keyed records (hosts, URLs, agents, ...) implement [`ValueRecord`]
//! so they can be found by value through a hash index. Each type also
//! exposes field accessors that locate one field in a raw data buffer
//! without decoding the rest; secondary index extractors are built from
//! them.

pub mod arena;
pub mod state;

mod active_download;
mod agent;
mod asn;
mod city;
mod country;
mod daily;
mod daily_host;
mod download;
mod errors;
mod host;
mod referrer;
mod search;
mod status_code;
mod system;
mod totals;
mod url;
mod user;
mod visit;

pub use active_download::ActiveDownloadRecord;
pub use agent::AgentRecord;
pub use arena::{Arena, Handle};
pub use asn::AsnRecord;
pub use city::CityRecord;
pub use country::CountryRecord;
pub use daily::{DailyRecord, HourlyAverages, HourlyPeaks, HourlyRecord};
pub use daily_host::DailyHostRecord;
pub use download::DownloadRecord;
pub use errors::ErrorRecord;
pub use host::HostRecord;
pub use referrer::ReferrerRecord;
pub use search::SearchRecord;
pub use state::{StorageState, Stored};
pub use status_code::StatusCodeRecord;
pub use system::SystemRecord;
pub use totals::{
    GroupTotals, HourTotals, LengthStats, ProcTimes, RobotTotals, SpamTotals, TotalsRecord, VisitPeak,
};
pub use url::UrlRecord;
pub use user::UserRecord;
pub use visit::VisitRecord;

use crate::codec::{self, Reader, Writer};
use crate::error::{Error, Result};
use std::cmp::Ordering;

/// Size of a packed record key
pub const KEY_SIZE: usize = 8;

/// Size of the version prefix of every data payload
pub const VERSION_SIZE: usize = 2;

/// Regular entity or group/aggregate row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum RecordKind {
    #[default]
    Regular,
    Group,
}

impl RecordKind {
    pub fn to_u8(self) -> u8 {
        match self {
            RecordKind::Regular => 0,
            RecordKind::Group => 2,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        if value == 2 {
            RecordKind::Group
        } else {
            RecordKind::Regular
        }
    }

    pub fn is_group(self) -> bool {
        self == RecordKind::Group
    }
}

/// Post-decode hook run before a read returns the record
pub type UnpackHook<'a, R> = &'a mut dyn FnMut(&mut R) -> Result<()>;

/// Locates one field inside a raw data buffer
pub type FieldFn = fn(&[u8]) -> Result<&[u8]>;

/// Capability interface shared by every persisted record type
pub trait Record: Sized {
    /// Type name used in diagnostics
    const NAME: &'static str;

    /// Layout version written by this build
    const VERSION: u16;

    /// Name of the primary table holding this type
    const TABLE: &'static str;

    fn key(&self) -> u64;

    fn set_key(&mut self, key: u64);

    fn kind(&self) -> RecordKind {
        RecordKind::Regular
    }

    /// Packed size of the data payload, version included
    fn data_size(&self) -> usize;

    /// Write every field that follows the version prefix
    fn pack_fields(&self, w: &mut Writer<'_>) -> Result<()>;

    /// Read every field that follows the version prefix, as laid out by
    /// `version`. Fields absent from older versions get defaults.
    fn unpack_fields(&mut self, r: &mut Reader<'_>, version: u16) -> Result<()>;

    fn pack_key(&self) -> [u8; KEY_SIZE] {
        self.key().to_le_bytes()
    }

    fn unpack_key(&mut self, buf: &[u8]) -> Result<()> {
        let key = codec::read_at::<u64>(buf, 0)?;
        if buf.len() != KEY_SIZE {
            return Err(Error::Format {
                record: Self::NAME,
                decoded: KEY_SIZE,
                expected: buf.len(),
            });
        }
        self.set_key(key);
        Ok(())
    }

    /// Pack the data payload into `buf`; returns the packed size
    fn pack_data(&self, buf: &mut [u8]) -> Result<usize> {
        let mut w = Writer::new(buf);
        w.put(&Self::VERSION)?;
        self.pack_fields(&mut w)?;

        let size = self.data_size();
        if w.position() != size {
            return Err(Error::Format {
                record: Self::NAME,
                decoded: w.position(),
                expected: size,
            });
        }
        Ok(size)
    }

    /// Unpack a data payload and run `hook`; returns the bytes consumed
    fn unpack_data(&mut self, buf: &[u8], hook: Option<UnpackHook<'_, Self>>) -> Result<usize> {
        let mut r = Reader::new(buf);
        let version = r.get::<u16>()?;
        if version == 0 || version > Self::VERSION {
            return Err(Error::UnsupportedVersion {
                record: Self::NAME,
                found: version,
                supported: Self::VERSION,
            });
        }
        self.unpack_fields(&mut r, version)?;

        if let Some(hook) = hook {
            hook(self)?;
        }
        Ok(r.position())
    }

    /// Pack into a freshly allocated buffer
    fn to_data(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.data_size()];
        self.pack_data(&mut buf)?;
        Ok(buf)
    }
}

/// Records identified by a text value rather than business data
pub trait ValueRecord: Record {
    fn value(&self) -> &str;

    fn hash_value(&self) -> u64 {
        hash_str(0, self.value())
    }

    /// Compare this record's identity against a packed data buffer.
    /// Kind decides first so a group never matches a regular record with
    /// the same text.
    fn compare_value(&self, data: &[u8]) -> Result<Ordering> {
        let (kind, value) = base::unpack_ident(data)?;
        Ok(self
            .kind()
            .cmp(&kind)
            .then_with(|| self.value().cmp(value.as_str())))
    }

    /// Accessor for the stored value hash
    fn value_hash_field(data: &[u8]) -> Result<&[u8]>;
}

/// 64-bit sdbm hash, chainable through `seed`
pub fn hash_bytes(seed: u64, bytes: &[u8]) -> u64 {
    bytes.iter().fold(seed, |h, &b| {
        u64::from(b)
            .wrapping_add(h << 6)
            .wrapping_add(h << 16)
            .wrapping_sub(h)
    })
}

pub fn hash_str(seed: u64, value: &str) -> u64 {
    hash_bytes(seed, value.as_bytes())
}

pub fn hash_num(seed: u64, value: u64) -> u64 {
    hash_bytes(seed, &value.to_le_bytes())
}

/// Shared prefix of text-keyed records: `[version][kind][value]`
pub mod base {
    use super::*;

    pub const KIND_OFFSET: usize = VERSION_SIZE;

    pub fn size(value: &str) -> usize {
        VERSION_SIZE + 1 + codec::size_of_str(value)
    }

    pub fn pack(w: &mut Writer<'_>, kind: RecordKind, value: &str) -> Result<()> {
        w.put(&kind.to_u8())?;
        w.put_str(value)
    }

    pub fn unpack(r: &mut Reader<'_>) -> Result<(RecordKind, String)> {
        let kind = RecordKind::from_u8(r.get()?);
        let value = r.get::<String>()?;
        Ok((kind, value))
    }

    pub fn unpack_ident(data: &[u8]) -> Result<(RecordKind, String)> {
        unpack(&mut Reader::at(data, KIND_OFFSET))
    }

    pub fn kind(data: &[u8]) -> Result<RecordKind> {
        codec::read_at::<u8>(data, KIND_OFFSET).map(RecordKind::from_u8)
    }

    pub fn is_group(data: &[u8]) -> bool {
        matches!(kind(data), Ok(RecordKind::Group))
    }

    /// Offset of the first type-specific field
    pub fn fields_offset(data: &[u8]) -> Result<usize> {
        codec::skip_field::<String>(data, KIND_OFFSET + 1)
    }
}

/// Byte-order stable comparators over packed fields
pub mod compare {
    use std::cmp::Ordering;

    fn as_u64(buf: &[u8]) -> Option<u64> {
        buf.get(..8)?.try_into().ok().map(u64::from_le_bytes)
    }

    fn as_f64(buf: &[u8]) -> Option<f64> {
        buf.get(..8)?.try_into().ok().map(f64::from_le_bytes)
    }

    pub fn u64_le(a: &[u8], b: &[u8]) -> Ordering {
        match (as_u64(a), as_u64(b)) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => a.cmp(b),
        }
    }

    pub fn f64_le(a: &[u8], b: &[u8]) -> Ordering {
        match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => a.cmp(b),
        }
    }

    pub fn bytes(a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sdbm_hash() {
        assert_eq!(hash_str(0, ""), 0);
        assert_eq!(hash_str(0, "a"), 97);
        // h = 'b' + (97 << 6) + (97 << 16) - 97
        assert_eq!(hash_str(0, "ab"), 98 + (97 << 6) + (97 << 16) - 97);
        assert_ne!(hash_str(0, "abc"), hash_str(0, "acb"));
        assert_eq!(hash_str(hash_str(0, "ab"), "c"), hash_str(0, "abc"));
    }

    #[test]
    fn test_kind_bytes() {
        assert_eq!(RecordKind::Group.to_u8(), 2);
        assert_eq!(RecordKind::from_u8(0), RecordKind::Regular);
        assert_eq!(RecordKind::from_u8(2), RecordKind::Group);
        assert!(RecordKind::Regular < RecordKind::Group);
    }

    #[test]
    fn test_base_prefix() -> Result<()> {
        let mut buf = vec![0u8; base::size("abc") + 8];
        let mut w = Writer::new(&mut buf);
        w.put(&1u16)?;
        base::pack(&mut w, RecordKind::Group, "abc")?;
        w.put(&5u64)?;

        assert!(base::is_group(&buf));
        assert_eq!(base::fields_offset(&buf)?, 10);
        let (kind, value) = base::unpack_ident(&buf)?;
        assert_eq!((kind, value.as_str()), (RecordKind::Group, "abc"));
        Ok(())
    }

    #[test]
    fn test_u64_comparator() {
        let a = 5u64.to_le_bytes();
        let b = 256u64.to_le_bytes();
        assert_eq!(compare::u64_le(&a, &b), Ordering::Less);
        assert_eq!(compare::u64_le(&b, &a), Ordering::Greater);
        assert_eq!(compare::u64_le(&a, &a), Ordering::Equal);
    }
}
