use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;

/// Source of "today" for ledger and rollover calls.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Wall clock, evaluated in a fixed timezone so month boundaries match the
/// chat's local calendar.
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn utc() -> Self {
        Self { tz: Tz::UTC }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }
}

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz).date_naive()
    }
}

/// A clock pinned to one date, for tests and manual rollover runs.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_returns_its_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(FixedClock(date).today(), date);
    }

    #[test]
    fn system_clock_is_close_to_utc_date() {
        let clock = SystemClock::new(chrono_tz::Europe::Moscow);
        let utc_today = Utc::now().date_naive();
        let diff = (clock.today() - utc_today).num_days().abs();
        assert!(diff <= 1, "got {diff} days apart");
    }
}
