use std::str::FromStr;

use chrono::{DateTime, Utc};
use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// States in the voting session lifecycle.
///
/// Transitions only ever move rightwards: `scheduled -> open -> closed`.
/// Nothing leaves `closed`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// The window has not started; no votes accepted yet.
    Scheduled,
    /// Votes are accepted while the current instant stays inside the window.
    Open,
    /// Ended or superseded; terminal.
    Closed,
}

impl SessionStatus {
    /// The initial status of a session created at `now` with the given window:
    /// already inside the window means `open`, anything else means `scheduled`.
    pub fn initial_at(
        now: DateTime<Utc>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        if start_time <= now && now <= end_time {
            Self::Open
        } else {
            Self::Scheduled
        }
    }
}

impl FromStr for SessionStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(Self::Scheduled),
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            _ => Err(()),
        }
    }
}

impl From<SessionStatus> for Bson {
    fn from(status: SessionStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}

/// What a vote attempt observes about a session at a given instant.
///
/// The `needs_transition` flags report that the stored status has been
/// overtaken by the clock and a lazy, idempotent status update is due.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionRuling {
    /// Voting is permitted right now.
    Open { needs_transition: bool },
    /// The window has not started yet.
    TooEarly,
    /// The window has passed.
    TooLate { needs_transition: bool },
    /// The session was closed explicitly (or superseded).
    Closed,
}

impl SessionRuling {
    /// Rule on a session with the given stored status and window.
    pub fn evaluate(
        status: SessionStatus,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        match status {
            SessionStatus::Closed => Self::Closed,
            SessionStatus::Scheduled => {
                if now < start_time {
                    Self::TooEarly
                } else if now <= end_time {
                    // The window arrived before anyone opened the session.
                    Self::Open {
                        needs_transition: true,
                    }
                } else {
                    // The whole window passed while the session sat scheduled.
                    Self::TooLate {
                        needs_transition: false,
                    }
                }
            }
            SessionStatus::Open => {
                if now < start_time {
                    // An admin opened the session early; the window still rules.
                    Self::TooEarly
                } else if now <= end_time {
                    Self::Open {
                        needs_transition: false,
                    }
                } else {
                    Self::TooLate {
                        needs_transition: true,
                    }
                }
            }
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

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (instant("2025-01-01 10:00:00"), instant("2025-01-01 12:00:00"))
    }

    #[test]
    fn initial_status() {
        let (start, end) = window();
        assert_eq!(
            SessionStatus::initial_at(instant("2025-01-01 09:00:00"), start, end),
            SessionStatus::Scheduled
        );
        assert_eq!(
            SessionStatus::initial_at(instant("2025-01-01 11:00:00"), start, end),
            SessionStatus::Open
        );
        // A window entirely in the past still starts scheduled; vote attempts
        // against it are rejected by the ruling, never recorded.
        assert_eq!(
            SessionStatus::initial_at(instant("2025-01-01 13:00:00"), start, end),
            SessionStatus::Scheduled
        );
    }

    #[test]
    fn scheduled_session_rulings() {
        let (start, end) = window();
        let at = |s| SessionRuling::evaluate(SessionStatus::Scheduled, start, end, instant(s));

        assert_eq!(at("2025-01-01 09:00:00"), SessionRuling::TooEarly);
        // Entering the window lazily opens the session.
        assert_eq!(
            at("2025-01-01 10:00:00"),
            SessionRuling::Open {
                needs_transition: true
            }
        );
        assert_eq!(
            at("2025-01-01 13:00:00"),
            SessionRuling::TooLate {
                needs_transition: false
            }
        );
    }

    #[test]
    fn open_session_rulings() {
        let (start, end) = window();
        let at = |s| SessionRuling::evaluate(SessionStatus::Open, start, end, instant(s));

        assert_eq!(at("2025-01-01 09:59:59"), SessionRuling::TooEarly);
        assert_eq!(
            at("2025-01-01 11:00:00"),
            SessionRuling::Open {
                needs_transition: false
            }
        );
        assert_eq!(at("2025-01-01 12:00:00"), SessionRuling::Open { needs_transition: false });
        // Past the window an open session is due for a lazy close.
        assert_eq!(
            at("2025-01-01 12:00:01"),
            SessionRuling::TooLate {
                needs_transition: true
            }
        );
    }

    #[test]
    fn closed_is_terminal() {
        let (start, end) = window();
        // Even inside the window, explicitly closed means closed.
        let ruling =
            SessionRuling::evaluate(SessionStatus::Closed, start, end, instant("2025-01-01 11:00:00"));
        assert_eq!(ruling, SessionRuling::Closed);
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            SessionStatus::Scheduled,
            SessionStatus::Open,
            SessionStatus::Closed,
        ] {
            let json = rocket::serde::json::serde_json::to_string(&status).unwrap();
            let parsed: SessionStatus =
                rocket::serde::json::serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, status);
        }
        assert_eq!("open".parse(), Ok(SessionStatus::Open));
        assert!("ajar".parse::<SessionStatus>().is_err());
    }
}
