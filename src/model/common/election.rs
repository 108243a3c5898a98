use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The phase of an election relative to its time window.
///
/// This is never stored; it is derived from the window whenever an election
/// is reported, so it cannot drift out of date.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionStatus {
    /// The window has not started yet.
    Upcoming,
    /// The window contains the current instant.
    Active,
    /// The window has passed.
    Completed,
}

impl ElectionStatus {
    /// Derive the status of the given window at the given instant.
    pub fn at(now: DateTime<Utc>, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        if now < start_time {
            Self::Upcoming
        } else if now <= end_time {
            Self::Active
        } else {
            Self::Completed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{NaiveDateTime, TimeZone};

    fn instant(s: &str) -> DateTime<Utc> {
        let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap();
        Utc.from_utc_datetime(&naive)
    }

    #[test]
    fn status_follows_the_window() {
        let start = instant("2025-01-01 10:00:00");
        let end = instant("2025-01-01 12:00:00");

        assert_eq!(
            ElectionStatus::at(instant("2025-01-01 09:59:59"), start, end),
            ElectionStatus::Upcoming
        );
        assert_eq!(
            ElectionStatus::at(start, start, end),
            ElectionStatus::Active
        );
        assert_eq!(
            ElectionStatus::at(instant("2025-01-01 11:00:00"), start, end),
            ElectionStatus::Active
        );
        assert_eq!(ElectionStatus::at(end, start, end), ElectionStatus::Active);
        assert_eq!(
            ElectionStatus::at(instant("2025-01-01 12:00:01"), start, end),
            ElectionStatus::Completed
        );
    }
}
