//! ## On-Disk Timestamps
//!
//! Property values carry two timestamp encodings: `PtypTime` (`FILETIME`,
//! 100-nanosecond ticks since 1601-01-01 UTC) and `PtypFloatingTime`
//! (`APPTIME`, whole and fractional days since 1899-12-30). Both newtypes
//! keep the raw on-disk value lossless and convert to [`chrono`] on demand.

use chrono::{Duration, NaiveDate, NaiveDateTime};

const MICROSECONDS_PER_DAY: f64 = 86_400_000_000.0;

fn filetime_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1601, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn apptime_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// `FILETIME`: 100-nanosecond ticks since 1601-01-01 UTC.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct FileTime(i64);

impl FileTime {
    pub fn new(ticks: i64) -> Self {
        Self(ticks)
    }

    pub fn ticks(&self) -> i64 {
        self.0
    }

    /// Sub-microsecond precision is dropped; out-of-range values yield `None`.
    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        filetime_epoch().checked_add_signed(Duration::microseconds(self.0 / 10))
    }

    pub fn from_datetime(value: NaiveDateTime) -> Option<Self> {
        let delta = value.signed_duration_since(filetime_epoch());
        Some(Self(delta.num_microseconds()?.checked_mul(10)?))
    }
}

impl From<i64> for FileTime {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// `APPTIME`: days since 1899-12-30, with the fraction of a day since
/// midnight to the right of the decimal point.
#[derive(Copy, Clone, Default, PartialEq, PartialOrd, Debug)]
pub struct AppTime(f64);

impl AppTime {
    pub fn new(days: f64) -> Self {
        Self(days)
    }

    pub fn days(&self) -> f64 {
        self.0
    }

    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        if !self.0.is_finite() {
            return None;
        }
        let microseconds = (self.0 * MICROSECONDS_PER_DAY) as i64;
        apptime_epoch().checked_add_signed(Duration::microseconds(microseconds))
    }

    pub fn from_datetime(value: NaiveDateTime) -> Option<Self> {
        let delta = value.signed_duration_since(apptime_epoch());
        Some(Self(delta.num_microseconds()? as f64 / MICROSECONDS_PER_DAY))
    }
}

impl From<f64> for AppTime {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICKS_PER_SECOND: i64 = 10_000_000;

    #[test]
    fn test_filetime_epoch() {
        let epoch = FileTime::new(0).to_datetime().unwrap();
        assert_eq!(epoch, filetime_epoch());
        assert_eq!(FileTime::from_datetime(epoch).unwrap().ticks(), 0);
    }

    #[test]
    fn test_filetime_one_second() {
        let value = filetime_epoch() + Duration::seconds(1);
        assert_eq!(
            FileTime::from_datetime(value).unwrap().ticks(),
            TICKS_PER_SECOND
        );
        assert_eq!(
            FileTime::new(TICKS_PER_SECOND).to_datetime().unwrap(),
            value
        );
    }

    #[test]
    fn test_filetime_hundred_years() {
        let value = NaiveDate::from_ymd_opt(1701, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let ticks = FileTime::from_datetime(value).unwrap().ticks();
        assert_eq!(
            ticks,
            value
                .signed_duration_since(filetime_epoch())
                .num_seconds()
                * TICKS_PER_SECOND
        );
        assert_eq!(FileTime::new(ticks).to_datetime().unwrap(), value);
    }

    #[test]
    fn test_apptime_round_trip() {
        let epoch = AppTime::new(0.0).to_datetime().unwrap();
        assert_eq!(epoch, apptime_epoch());

        let half_day = AppTime::new(0.5).to_datetime().unwrap();
        assert_eq!(half_day, apptime_epoch() + Duration::hours(12));
        assert_eq!(AppTime::from_datetime(half_day).unwrap().days(), 0.5);

        let value = NaiveDate::from_ymd_opt(1999, 12, 30)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap();
        let days = AppTime::from_datetime(value).unwrap();
        assert_eq!(days.to_datetime().unwrap(), value);
    }

    #[test]
    fn test_apptime_non_finite() {
        assert_eq!(AppTime::new(f64::NAN).to_datetime(), None);
        assert_eq!(AppTime::new(f64::INFINITY).to_datetime(), None);
    }
}
