//! Compact timestamp
//!
//! ```text
//! [null u8]                                      null timestamp
//! [null u8][utc u8][year u16][mon][day][h][m][s] UTC
//! ...same...                       [offset i16]  local time, offset in minutes
//! ```
//!
//! The null and UTC flags come first so the encoded size is known after
//! reading at most two bytes.

use super::{Field, Reader, Writer};
use crate::error::Result;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone, Timelike, Utc};

/// Calendar timestamp with an optional UTC offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tstamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub min: u8,
    pub sec: u8,
    /// Offset from UTC in minutes; `None` for UTC
    pub offset: Option<i16>,
}

const FIXED_SIZE: usize = 1 + 1 + 2 + 5;

impl Tstamp {
    pub fn utc(year: u16, month: u8, day: u8, hour: u8, min: u8, sec: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            min,
            sec,
            offset: None,
        }
    }

    pub fn local(year: u16, month: u8, day: u8, hour: u8, min: u8, sec: u8, offset: i16) -> Self {
        Self {
            offset: Some(offset),
            ..Self::utc(year, month, day, hour, min, sec)
        }
    }

    pub fn is_utc(&self) -> bool {
        self.offset.is_none()
    }

    /// Convert to a chrono date-time; `None` for out-of-range calendar fields
    pub fn to_datetime(&self) -> Option<DateTime<FixedOffset>> {
        let offset = FixedOffset::east_opt(i32::from(self.offset.unwrap_or(0)) * 60)?;
        let naive = NaiveDate::from_ymd_opt(i32::from(self.year), u32::from(self.month), u32::from(self.day))?
            .and_hms_opt(u32::from(self.hour), u32::from(self.min), u32::from(self.sec))?;
        offset.from_local_datetime(&naive).single()
    }

    /// Seconds since the Unix epoch, if the calendar fields are valid
    pub fn timestamp(&self) -> Option<i64> {
        self.to_datetime().map(|dt| dt.timestamp())
    }

    /// UTC timestamp from seconds since the Unix epoch; zero means unset
    pub fn from_unix(secs: u64) -> Option<Self> {
        if secs == 0 {
            return None;
        }
        let secs = i64::try_from(secs).ok()?;
        Utc.timestamp_opt(secs, 0).single().map(Self::from)
    }

    pub fn from_fixed(dt: &DateTime<FixedOffset>) -> Self {
        let minutes = dt.offset().local_minus_utc() / 60;
        Self::local(
            dt.year() as u16,
            dt.month() as u8,
            dt.day() as u8,
            dt.hour() as u8,
            dt.minute() as u8,
            dt.second() as u8,
            minutes as i16,
        )
    }
}

impl From<DateTime<Utc>> for Tstamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::utc(
            dt.year() as u16,
            dt.month() as u8,
            dt.day() as u8,
            dt.hour() as u8,
            dt.minute() as u8,
            dt.second() as u8,
        )
    }
}

impl Field for Option<Tstamp> {
    fn size_of(&self) -> usize {
        match self {
            None => 1,
            Some(ts) if ts.is_utc() => FIXED_SIZE,
            Some(_) => FIXED_SIZE + 2,
        }
    }

    fn write(&self, w: &mut Writer<'_>) -> Result<()> {
        let ts = match self {
            None => return w.put(&true),
            Some(ts) => ts,
        };

        w.put(&false)?;
        w.put(&ts.is_utc())?;
        w.put(&ts.year)?;
        w.put(&ts.month)?;
        w.put(&ts.day)?;
        w.put(&ts.hour)?;
        w.put(&ts.min)?;
        w.put(&ts.sec)?;

        if let Some(offset) = ts.offset {
            w.put(&offset)?;
        }
        Ok(())
    }

    fn read(r: &mut Reader<'_>) -> Result<Self> {
        if r.get::<bool>()? {
            return Ok(None);
        }

        let utc = r.get::<bool>()?;
        let mut ts = Tstamp::utc(
            r.get()?,
            r.get()?,
            r.get()?,
            r.get()?,
            r.get()?,
            r.get()?,
        );
        if !utc {
            ts.offset = Some(r.get()?);
        }
        Ok(Some(ts))
    }

    fn encoded_size(r: &Reader<'_>) -> Result<usize> {
        if r.peek(1)?[0] != 0 {
            return Ok(1);
        }
        let flags = r.peek(2)?;
        Ok(if flags[1] != 0 { FIXED_SIZE } else { FIXED_SIZE + 2 })
    }
}
