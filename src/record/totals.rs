//! Monthly totals record

use super::Record;
use crate::codec::{self, Reader, Tstamp, Writer};
use crate::error::Result;

/// Running totals of the month being processed
///
/// Counters added by later versions decode as zero from older data, except
/// the per-class visit endings of v4, which are estimated from the closest
/// older counters.
///
/// ```text
/// v1: [version][tstamp, unix seconds u64][first day u32][last day u32]
///     [max visit hits][files][pages][xfer]
///     [hits][files][pages][hosts][urls][referrers][agents][visits]
///     [visits ended][users][errors][downloads][search hits][entry hits]
///     [exit hits][entry pages][exit pages][xfer]
///     [visit length avg f64][max]
///     [proctime avg hit f64][max][avg file][max][avg page][max]
///     [daily hosts u64][hour hits][max hour hits]
/// v2: + [robot hits][files][pages][errors][visits][xfer]
/// v3: + [converted visits][converted hosts][robot hosts]
///       [converted length avg f64][max]
///       [hour files][pages][xfer][visits][hosts]
/// v4: + [human visits ended][robot visits ended][spam visits ended]
///       [searches][download jobs]
///       [host groups][url groups][user groups][referrer groups][agent groups]
/// v5: + [spam hosts][hits][files][pages][xfer]
///       [max human visit hits][files][pages][xfer]
/// v6: tstamp is a serialized tstamp
/// v7: [daily hosts] removed
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TotalsRecord {
    /// Timestamp of the last log record counted
    pub last_tstamp: Option<Tstamp>,
    pub first_day: u32,
    pub last_day: u32,

    pub hits: u64,
    pub files: u64,
    pub pages: u64,
    pub hosts: u64,
    pub urls: u64,
    pub referrers: u64,
    pub agents: u64,
    pub users: u64,
    pub errors: u64,
    pub xfer: u64,

    /// Completed downloads
    pub downloads: u64,
    /// Distinct download jobs
    pub download_jobs: u64,
    pub search_hits: u64,
    pub searches: u64,
    pub entry_hits: u64,
    pub exit_hits: u64,
    pub entry_pages: u64,
    pub exit_pages: u64,

    pub visits: u64,
    pub visits_ended: u64,
    pub human_visits_ended: u64,
    pub robot_visits_ended: u64,
    pub spam_visits_ended: u64,
    pub converted_visits: u64,
    pub converted_hosts: u64,
    pub visit_length: LengthStats,
    pub converted_visit_length: LengthStats,
    pub max_visit: VisitPeak,
    pub max_human_visit: VisitPeak,

    pub robots: RobotTotals,
    pub spammers: SpamTotals,
    pub groups: GroupTotals,
    pub proctime: ProcTimes,

    /// Counters of the hour in progress
    pub current_hour: HourTotals,
    pub max_hourly_hits: u64,
}

/// Average and maximum visit length in seconds
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LengthStats {
    pub avg: f64,
    pub max: u64,
}

/// Largest single visit, per counter
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VisitPeak {
    pub hits: u64,
    pub files: u64,
    pub pages: u64,
    pub xfer: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RobotTotals {
    pub hits: u64,
    pub files: u64,
    pub pages: u64,
    pub errors: u64,
    pub hosts: u64,
    pub visits: u64,
    pub xfer: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpamTotals {
    pub hits: u64,
    pub files: u64,
    pub pages: u64,
    pub hosts: u64,
    pub xfer: u64,
}

/// Number of group rows per table
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GroupTotals {
    pub hosts: u64,
    pub urls: u64,
    pub users: u64,
    pub referrers: u64,
    pub agents: u64,
}

/// Request processing times in seconds
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProcTimes {
    pub avg_hit: f64,
    pub max_hit: f64,
    pub avg_file: f64,
    pub max_file: f64,
    pub avg_page: f64,
    pub max_page: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HourTotals {
    pub hits: u64,
    pub files: u64,
    pub pages: u64,
    pub xfer: u64,
    pub visits: u64,
    pub hosts: u64,
}

/// Fixed-size part of the current layout, after the timestamp
const FIXED_FIELDS_SIZE: usize = 4 * 2 + 8 * 67;

fn put_all<T: codec::Field>(w: &mut Writer<'_>, values: &[T]) -> Result<()> {
    values.iter().try_for_each(|v| w.put(v))
}

impl TotalsRecord {
    pub const KEY: u64 = 1;

    pub fn new() -> Self {
        Self {
            first_day: 1,
            last_day: 1,
            ..Default::default()
        }
    }
}

impl Record for TotalsRecord {
    const NAME: &'static str = "TotalsRecord";
    const VERSION: u16 = 7;
    const TABLE: &'static str = "totals";

    fn key(&self) -> u64 {
        Self::KEY
    }

    fn set_key(&mut self, _key: u64) {}

    fn data_size(&self) -> usize {
        2 + codec::size_of(&self.last_tstamp) + FIXED_FIELDS_SIZE
    }

    fn pack_fields(&self, w: &mut Writer<'_>) -> Result<()> {
        w.put(&self.last_tstamp)?;
        w.put(&self.first_day)?;
        w.put(&self.last_day)?;

        let peak = &self.max_visit;
        put_all(w, &[peak.hits, peak.files, peak.pages, peak.xfer])?;
        put_all(
            w,
            &[
                self.hits,
                self.files,
                self.pages,
                self.hosts,
                self.urls,
                self.referrers,
                self.agents,
                self.visits,
                self.visits_ended,
                self.users,
                self.errors,
                self.downloads,
                self.search_hits,
                self.entry_hits,
                self.exit_hits,
                self.entry_pages,
                self.exit_pages,
                self.xfer,
            ],
        )?;
        w.put(&self.visit_length.avg)?;
        w.put(&self.visit_length.max)?;

        let pt = &self.proctime;
        put_all(
            w,
            &[pt.avg_hit, pt.max_hit, pt.avg_file, pt.max_file, pt.avg_page, pt.max_page],
        )?;
        w.put(&self.current_hour.hits)?;
        w.put(&self.max_hourly_hits)?;

        let rb = &self.robots;
        put_all(w, &[rb.hits, rb.files, rb.pages, rb.errors, rb.visits, rb.xfer])?;

        put_all(w, &[self.converted_visits, self.converted_hosts, rb.hosts])?;
        w.put(&self.converted_visit_length.avg)?;
        w.put(&self.converted_visit_length.max)?;
        let hour = &self.current_hour;
        put_all(w, &[hour.files, hour.pages, hour.xfer, hour.visits, hour.hosts])?;

        put_all(
            w,
            &[
                self.human_visits_ended,
                self.robot_visits_ended,
                self.spam_visits_ended,
                self.searches,
                self.download_jobs,
            ],
        )?;
        let grp = &self.groups;
        put_all(w, &[grp.hosts, grp.urls, grp.users, grp.referrers, grp.agents])?;

        let spam = &self.spammers;
        put_all(w, &[spam.hosts, spam.hits, spam.files, spam.pages, spam.xfer])?;
        let peak = &self.max_human_visit;
        put_all(w, &[peak.hits, peak.files, peak.pages, peak.xfer])
    }

    fn unpack_fields(&mut self, r: &mut Reader<'_>, version: u16) -> Result<()> {
        self.last_tstamp = if version >= 6 {
            r.get()?
        } else {
            Tstamp::from_unix(r.get()?)
        };
        self.first_day = r.get()?;
        self.last_day = r.get()?;
        self.max_visit = VisitPeak {
            hits: r.get()?,
            files: r.get()?,
            pages: r.get()?,
            xfer: r.get()?,
        };

        self.hits = r.get()?;
        self.files = r.get()?;
        self.pages = r.get()?;
        self.hosts = r.get()?;
        self.urls = r.get()?;
        self.referrers = r.get()?;
        self.agents = r.get()?;
        self.visits = r.get()?;
        self.visits_ended = r.get()?;
        self.users = r.get()?;
        self.errors = r.get()?;
        self.downloads = r.get()?;
        self.search_hits = r.get()?;
        self.entry_hits = r.get()?;
        self.exit_hits = r.get()?;
        self.entry_pages = r.get()?;
        self.exit_pages = r.get()?;
        self.xfer = r.get()?;

        self.visit_length = LengthStats {
            avg: r.get()?,
            max: r.get()?,
        };
        self.proctime = ProcTimes {
            avg_hit: r.get()?,
            max_hit: r.get()?,
            avg_file: r.get()?,
            max_file: r.get()?,
            avg_page: r.get()?,
            max_page: r.get()?,
        };

        if version < 7 {
            r.skip::<u64>()?;
        }
        self.current_hour = HourTotals {
            hits: r.get()?,
            ..Default::default()
        };
        self.max_hourly_hits = r.get()?;

        self.robots = RobotTotals::default();
        if version >= 2 {
            self.robots.hits = r.get()?;
            self.robots.files = r.get()?;
            self.robots.pages = r.get()?;
            self.robots.errors = r.get()?;
            self.robots.visits = r.get()?;
            self.robots.xfer = r.get()?;
        }

        if version >= 3 {
            self.converted_visits = r.get()?;
            self.converted_hosts = r.get()?;
            self.robots.hosts = r.get()?;
            self.converted_visit_length = LengthStats {
                avg: r.get()?,
                max: r.get()?,
            };
            self.current_hour.files = r.get()?;
            self.current_hour.pages = r.get()?;
            self.current_hour.xfer = r.get()?;
            self.current_hour.visits = r.get()?;
            self.current_hour.hosts = r.get()?;
        } else {
            self.converted_visits = 0;
            self.converted_hosts = 0;
            self.converted_visit_length = LengthStats::default();
        }

        if version >= 4 {
            self.human_visits_ended = r.get()?;
            self.robot_visits_ended = r.get()?;
            self.spam_visits_ended = r.get()?;
            self.searches = r.get()?;
            self.download_jobs = r.get()?;
            self.groups = GroupTotals {
                hosts: r.get()?,
                urls: r.get()?,
                users: r.get()?,
                referrers: r.get()?,
                agents: r.get()?,
            };
        } else {
            self.human_visits_ended = self.visits_ended;
            self.robot_visits_ended = self.robots.visits;
            self.spam_visits_ended = 0;
            self.searches = 0;
            self.download_jobs = 0;
            self.groups = GroupTotals::default();
        }

        if version >= 5 {
            self.spammers = SpamTotals {
                hosts: r.get()?,
                hits: r.get()?,
                files: r.get()?,
                pages: r.get()?,
                xfer: r.get()?,
            };
            self.max_human_visit = VisitPeak {
                hits: r.get()?,
                files: r.get()?,
                pages: r.get()?,
                xfer: r.get()?,
            };
        } else {
            self.spammers = SpamTotals::default();
            self.max_human_visit = VisitPeak::default();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::testing::{decode, reload, Golden};

    /// Fields shared by every version, after the timestamp and up to the
    /// daily host count
    fn common(golden: Golden) -> Golden {
        let mut golden = golden.u32(1).u32(30);
        for v in [40, 30, 20, 1 << 20] {
            golden = golden.u64(v);
        }
        for v in 1..=18u64 {
            golden = golden.u64(v * 100);
        }
        golden = golden.f64(95.5).u64(3600);
        for v in [0.01, 2.0, 0.02, 3.0, 0.03, 4.0] {
            golden = golden.f64(v);
        }
        golden
    }

    #[test]
    fn test_round_trip() -> Result<()> {
        let mut totals = TotalsRecord::new();
        totals.last_tstamp = Some(Tstamp::local(2023, 11, 30, 23, 59, 59, -480));
        totals.last_day = 30;
        totals.hits = 123_456;
        totals.visit_length = LengthStats { avg: 61.5, max: 7200 };
        totals.robots.hosts = 4;
        totals.spammers.xfer = 1 << 30;
        totals.groups.agents = 9;
        totals.current_hour.visits = 12;
        totals.max_human_visit.pages = 80;
        totals.proctime.max_page = 1.25;
        assert_eq!(reload(&totals)?, totals);
        Ok(())
    }

    #[test]
    fn test_v1_golden() -> Result<()> {
        let golden = common(Golden::default().u16(1).u64(1_709_209_815));
        let data = golden.u64(77).u64(500).u64(90).0;

        let totals: TotalsRecord = decode(&data)?;
        assert_eq!(totals.last_tstamp, Some(Tstamp::utc(2024, 2, 29, 12, 30, 15)));
        assert_eq!((totals.first_day, totals.last_day), (1, 30));
        assert_eq!(totals.max_visit.xfer, 1 << 20);
        assert_eq!(totals.hits, 100);
        assert_eq!(totals.visits_ended, 900);
        assert_eq!(totals.xfer, 1800);
        assert_eq!(totals.visit_length.max, 3600);
        assert_eq!(totals.proctime.max_page, 4.0);
        assert_eq!((totals.current_hour.hits, totals.max_hourly_hits), (500, 90));

        // v4 visit endings are estimated, not zeroed
        assert_eq!(totals.human_visits_ended, 900);
        assert_eq!(totals.robot_visits_ended, 0);
        assert_eq!(totals.robots, RobotTotals::default());
        Ok(())
    }

    #[test]
    fn test_v6_golden_keeps_daily_hosts_gap() -> Result<()> {
        let ts = Tstamp::utc(2024, 3, 1, 0, 0, 0);
        let mut stamp = vec![0u8; codec::size_of(&Some(ts))];
        Writer::new(&mut stamp).put(&Some(ts))?;

        let mut golden = common(Golden::default().u16(6).bytes(&stamp));
        golden = golden.u64(77).u64(500).u64(90);
        // robots
        for v in [11, 12, 13, 14, 15, 16] {
            golden = golden.u64(v);
        }
        golden = golden.u64(21).u64(22).u64(23).f64(30.5).u64(600);
        for v in [31, 32, 33, 34, 35] {
            golden = golden.u64(v);
        }
        for v in [41, 42, 43, 44, 45, 51, 52, 53, 54, 55] {
            golden = golden.u64(v);
        }
        for v in [61, 62, 63, 64, 65, 71, 72, 73, 74] {
            golden = golden.u64(v);
        }
        let data = golden.0;

        let totals: TotalsRecord = decode(&data)?;
        assert_eq!(totals.last_tstamp, Some(ts));
        assert_eq!(totals.current_hour.hits, 500);
        assert_eq!(totals.robots.visits, 15);
        assert_eq!(totals.robots.hosts, 23);
        assert_eq!(totals.converted_visit_length, LengthStats { avg: 30.5, max: 600 });
        assert_eq!(totals.current_hour.hosts, 35);
        assert_eq!(totals.human_visits_ended, 41);
        assert_eq!(totals.download_jobs, 45);
        assert_eq!(totals.groups.agents, 55);
        assert_eq!(totals.spammers.hosts, 61);
        assert_eq!(totals.max_human_visit.xfer, 74);

        // re-encoding drops the daily host count
        assert_eq!(totals.data_size(), data.len() - 8);
        Ok(())
    }
}
