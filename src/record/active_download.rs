//! Active download record

use super::Record;
use crate::codec::{self, Reader, Tstamp, Writer};
use crate::error::Result;

/// A download job still in progress, keyed by the key of its
/// [`DownloadRecord`](super::DownloadRecord)
///
/// ```text
/// v1: [version][hits][last seen, unix seconds u64][proctime][xfer]
/// v2: [version][hits][last seen tstamp][proctime][xfer]
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveDownloadRecord {
    pub download_key: u64,
    pub hits: u64,
    pub last_seen: Option<Tstamp>,
    /// Processing time in milliseconds
    pub proctime: u64,
    pub xfer: u64,
}

impl ActiveDownloadRecord {
    pub fn new(download_key: u64, last_seen: Tstamp) -> Self {
        Self {
            download_key,
            last_seen: Some(last_seen),
            ..Default::default()
        }
    }
}

impl Record for ActiveDownloadRecord {
    const NAME: &'static str = "ActiveDownloadRecord";
    const VERSION: u16 = 2;
    const TABLE: &'static str = "downloads.active";

    fn key(&self) -> u64 {
        self.download_key
    }

    fn set_key(&mut self, key: u64) {
        self.download_key = key;
    }

    fn data_size(&self) -> usize {
        2 + 8 + codec::size_of(&self.last_seen) + 8 + 8
    }

    fn pack_fields(&self, w: &mut Writer<'_>) -> Result<()> {
        w.put(&self.hits)?;
        w.put(&self.last_seen)?;
        w.put(&self.proctime)?;
        w.put(&self.xfer)
    }

    fn unpack_fields(&mut self, r: &mut Reader<'_>, version: u16) -> Result<()> {
        self.hits = r.get()?;
        self.last_seen = if version >= 2 {
            r.get()?
        } else {
            Tstamp::from_unix(r.get()?)
        };
        self.proctime = r.get()?;
        self.xfer = r.get()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::testing::{decode, reload, Golden};

    #[test]
    fn test_round_trip() -> Result<()> {
        let mut job = ActiveDownloadRecord::new(12, Tstamp::local(2020, 5, 6, 7, 8, 9, 60));
        job.hits = 3;
        job.proctime = 1500;
        job.xfer = 1 << 33;
        assert_eq!(reload(&job)?, job);
        Ok(())
    }

    #[test]
    fn test_v1_golden_epoch_seconds() -> Result<()> {
        let data = Golden::default()
            .u16(1)
            .u64(2)
            .u64(1_709_209_815)
            .u64(250)
            .u64(4096)
            .0;
        let job: ActiveDownloadRecord = decode(&data)?;
        assert_eq!(job.hits, 2);
        assert_eq!(job.last_seen, Some(Tstamp::utc(2024, 2, 29, 12, 30, 15)));
        assert_eq!((job.proctime, job.xfer), (250, 4096));
        Ok(())
    }

    #[test]
    fn test_v1_golden_zero_time_is_unset() -> Result<()> {
        let data = Golden::default().u16(1).u64(1).u64(0).u64(0).u64(0).0;
        let job: ActiveDownloadRecord = decode(&data)?;
        assert_eq!(job.last_seen, None);
        Ok(())
    }
}
