//! Daily and hourly totals

use super::Record;
use crate::codec::{Reader, Writer};
use crate::error::Result;

/// Totals of one day of the month, keyed by the day (1-31)
///
/// ```text
/// v1: [version][hits][files][pages][hosts][visits][xfer]
/// v2: + [max hourly hits][files][pages][xfer][visits][hosts]
///       [avg hourly hits f64][files][pages][xfer][visits][hosts]
///       [hours u16]
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyRecord {
    pub day: u64,
    pub hits: u64,
    pub files: u64,
    pub pages: u64,
    pub hosts: u64,
    pub visits: u64,
    pub xfer: u64,
    pub max_hourly: HourlyPeaks,
    pub avg_hourly: HourlyAverages,
    /// Hours with traffic
    pub hours: u16,
}

/// Busiest hour of a day, per counter
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HourlyPeaks {
    pub hits: u64,
    pub files: u64,
    pub pages: u64,
    pub xfer: u64,
    pub visits: u64,
    pub hosts: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HourlyAverages {
    pub hits: f64,
    pub files: f64,
    pub pages: f64,
    pub xfer: f64,
    pub visits: f64,
    pub hosts: f64,
}

impl DailyRecord {
    pub fn new(day: u64) -> Self {
        Self {
            day,
            ..Default::default()
        }
    }
}

impl Record for DailyRecord {
    const NAME: &'static str = "DailyRecord";
    const VERSION: u16 = 2;
    const TABLE: &'static str = "totals.daily";

    fn key(&self) -> u64 {
        self.day
    }

    fn set_key(&mut self, key: u64) {
        self.day = key;
    }

    fn data_size(&self) -> usize {
        2 + 8 * 6 + 8 * 6 + 8 * 6 + 2
    }

    fn pack_fields(&self, w: &mut Writer<'_>) -> Result<()> {
        for count in [self.hits, self.files, self.pages, self.hosts, self.visits, self.xfer] {
            w.put(&count)?;
        }
        let max = &self.max_hourly;
        for count in [max.hits, max.files, max.pages, max.xfer, max.visits, max.hosts] {
            w.put(&count)?;
        }
        let avg = &self.avg_hourly;
        for value in [avg.hits, avg.files, avg.pages, avg.xfer, avg.visits, avg.hosts] {
            w.put(&value)?;
        }
        w.put(&self.hours)
    }

    fn unpack_fields(&mut self, r: &mut Reader<'_>, version: u16) -> Result<()> {
        self.hits = r.get()?;
        self.files = r.get()?;
        self.pages = r.get()?;
        self.hosts = r.get()?;
        self.visits = r.get()?;
        self.xfer = r.get()?;

        if version < 2 {
            self.max_hourly = HourlyPeaks::default();
            self.avg_hourly = HourlyAverages::default();
            self.hours = 0;
            return Ok(());
        }

        self.max_hourly = HourlyPeaks {
            hits: r.get()?,
            files: r.get()?,
            pages: r.get()?,
            xfer: r.get()?,
            visits: r.get()?,
            hosts: r.get()?,
        };
        self.avg_hourly = HourlyAverages {
            hits: r.get()?,
            files: r.get()?,
            pages: r.get()?,
            xfer: r.get()?,
            visits: r.get()?,
            hosts: r.get()?,
        };
        self.hours = r.get()?;
        Ok(())
    }
}

/// Totals of one hour of the day, keyed by the hour (0-23)
///
/// ```text
/// v1: [version][hits][files][pages][xfer]
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HourlyRecord {
    pub hour: u64,
    pub hits: u64,
    pub files: u64,
    pub pages: u64,
    pub xfer: u64,
}

impl HourlyRecord {
    pub fn new(hour: u64) -> Self {
        Self {
            hour,
            ..Default::default()
        }
    }
}

impl Record for HourlyRecord {
    const NAME: &'static str = "HourlyRecord";
    const VERSION: u16 = 1;
    const TABLE: &'static str = "totals.hourly";

    fn key(&self) -> u64 {
        self.hour
    }

    fn set_key(&mut self, key: u64) {
        self.hour = key;
    }

    fn data_size(&self) -> usize {
        2 + 8 * 4
    }

    fn pack_fields(&self, w: &mut Writer<'_>) -> Result<()> {
        w.put(&self.hits)?;
        w.put(&self.files)?;
        w.put(&self.pages)?;
        w.put(&self.xfer)
    }

    fn unpack_fields(&mut self, r: &mut Reader<'_>, _version: u16) -> Result<()> {
        self.hits = r.get()?;
        self.files = r.get()?;
        self.pages = r.get()?;
        self.xfer = r.get()?;
        Ok(())
    }
}
