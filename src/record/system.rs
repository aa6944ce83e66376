//! Database system record

use super::Record;
use crate::codec::{self, Reader, Tstamp, Writer};
use crate::error::Result;

/// Single record describing the dataset itself
///
/// ```text
/// v1: [version][app_version u32][incremental u8][batch u8]
/// v2: + [last tstamp]
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemRecord {
    /// Packed as `major << 24 | minor << 16 | patch`
    pub app_version: u32,
    pub incremental: bool,
    pub batch: bool,
    /// Timestamp of the last processed log record
    pub last_processed: Option<Tstamp>,
}

impl SystemRecord {
    pub const KEY: u64 = 1;

    pub fn pack_version(major: u8, minor: u8, patch: u16) -> u32 {
        u32::from(major) << 24 | u32::from(minor) << 16 | u32::from(patch)
    }

    /// Current crate version, packed
    pub fn current_app_version() -> u32 {
        let mut parts = crate::VERSION
            .split(|c: char| !c.is_ascii_digit())
            .filter_map(|p| p.parse::<u16>().ok());
        let major = parts.next().unwrap_or(0).min(255) as u8;
        let minor = parts.next().unwrap_or(0).min(255) as u8;
        let patch = parts.next().unwrap_or(0);
        Self::pack_version(major, minor, patch)
    }
}

impl Record for SystemRecord {
    const NAME: &'static str = "SystemRecord";
    const VERSION: u16 = 2;
    const TABLE: &'static str = "system";

    fn key(&self) -> u64 {
        Self::KEY
    }

    fn set_key(&mut self, _key: u64) {}

    fn data_size(&self) -> usize {
        2 + 4 + 1 + 1 + codec::size_of(&self.last_processed)
    }

    fn pack_fields(&self, w: &mut Writer<'_>) -> Result<()> {
        w.put(&self.app_version)?;
        w.put(&self.incremental)?;
        w.put(&self.batch)?;
        w.put(&self.last_processed)
    }

    fn unpack_fields(&mut self, r: &mut Reader<'_>, version: u16) -> Result<()> {
        self.app_version = r.get()?;
        self.incremental = r.get()?;
        self.batch = r.get()?;
        self.last_processed = if version >= 2 { r.get()? } else { None };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::testing::{decode, reload, Golden};

    #[test]
    fn test_round_trip() -> Result<()> {
        let sys = SystemRecord {
            app_version: SystemRecord::current_app_version(),
            incremental: true,
            batch: false,
            last_processed: Some(Tstamp::utc(2022, 9, 1, 0, 0, 1)),
        };
        assert_eq!(reload(&sys)?, sys);
        Ok(())
    }

    #[test]
    fn test_v1_golden() -> Result<()> {
        let data = Golden::default()
            .u16(1)
            .u32(SystemRecord::pack_version(4, 1, 2))
            .u8(1)
            .u8(0)
            .0;
        let sys: SystemRecord = decode(&data)?;
        assert_eq!(sys.app_version, 0x0401_0002);
        assert!(sys.incremental);
        assert_eq!(sys.last_processed, None);
        Ok(())
    }
}
