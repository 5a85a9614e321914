//! Session entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::status::SessionStatus;

/// One device's interaction with the deposit machine.
///
/// A session is created on first portal contact or on a claim of the
/// insertion slot, accumulates bottle credit, is activated into a bounded
/// grant of network access, and ends as `expired` or `revoked`. Terminal
/// sessions are kept as history.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    /// Monotonically assigned identifier.
    pub id: i64,
    /// Resolved device identity (MAC address or `device:<token>`).
    pub identity: String,
    /// Last-observed client address.
    pub ip_address: String,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Number of bottles credited to this session.
    pub bottles_inserted: i32,
    /// Seconds of access earned by those bottles.
    pub seconds_earned: i64,

    // -- Insertion slot --
    /// When the current claim of the insertion slot began.
    pub inserting_since: Option<DateTime<Utc>>,

    // -- Access window --
    /// When access was granted.
    pub session_start: Option<DateTime<Utc>>,
    /// When access runs out. Present only while `active`.
    pub session_end: Option<DateTime<Utc>>,
    /// When the session entered a terminal status.
    pub ended_at: Option<DateTime<Utc>>,

    // -- Feedback --
    /// Overall rating, set at most once.
    pub rating: Option<i16>,

    // -- Timestamps --
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Check whether the session can no longer change.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Seconds since the session was created.
    pub fn age_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_seconds()
    }

    /// Seconds of access left, zero when not active or already past the end.
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        match (self.status, self.session_end) {
            (SessionStatus::Active, Some(end)) => (end - now).num_seconds().max(0),
            _ => 0,
        }
    }

    /// Check whether the session is active with time left at `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::Active && self.session_end.is_some_and(|end| end > now)
    }
}

/// Result of extending an active session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extension {
    /// The recomputed end of the access window.
    pub new_end: DateTime<Utc>,
    /// Bottle total after the extension.
    pub bottles_inserted: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn make_session(status: SessionStatus, end: Option<DateTime<Utc>>) -> Session {
        let now = Utc::now();
        Session {
            id: 1,
            identity: "aa:bb:cc:dd:ee:ff".to_string(),
            ip_address: "10.0.0.2".to_string(),
            status,
            bottles_inserted: 1,
            seconds_earned: 120,
            inserting_since: None,
            session_start: end.map(|_| now),
            session_end: end,
            ended_at: None,
            rating: None,
            created_at: now - Duration::seconds(30),
            updated_at: now,
        }
    }

    #[test]
    fn test_remaining_seconds_only_when_active() {
        let now = Utc::now();
        let active = make_session(SessionStatus::Active, Some(now + Duration::seconds(90)));
        assert_eq!(active.remaining_seconds(now), 90);
        assert!(active.is_live(now));

        let past = make_session(SessionStatus::Active, Some(now - Duration::seconds(5)));
        assert_eq!(past.remaining_seconds(now), 0);
        assert!(!past.is_live(now));

        let waiting = make_session(SessionStatus::AwaitingInsertion, None);
        assert_eq!(waiting.remaining_seconds(now), 0);
    }

    #[test]
    fn test_age_seconds() {
        let session = make_session(SessionStatus::Inserting, None);
        assert!(session.age_seconds(Utc::now()) >= 30);
    }
}
