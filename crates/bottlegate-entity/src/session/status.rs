//! Session status enumeration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a device session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "session_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Device reached the portal but does not hold the insertion slot.
    AwaitingInsertion,
    /// Device holds the machine-wide insertion slot.
    Inserting,
    /// Network access granted until `session_end`.
    Active,
    /// Access time ran out or was ended explicitly.
    Expired,
    /// Administratively ended early.
    Revoked,
}

impl SessionStatus {
    /// Statuses from which a session may still change.
    pub const NON_TERMINAL: [SessionStatus; 3] =
        [Self::AwaitingInsertion, Self::Inserting, Self::Active];

    /// Check if the status is permanent.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Expired | Self::Revoked)
    }

    /// Check if bottle events accumulate credit rather than extend access.
    pub fn is_pre_active(&self) -> bool {
        matches!(self, Self::AwaitingInsertion | Self::Inserting)
    }

    /// Return the status as a snake_case string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingInsertion => "awaiting_insertion",
            Self::Inserting => "inserting",
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "awaiting_insertion" => Ok(Self::AwaitingInsertion),
            "inserting" => Ok(Self::Inserting),
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            "revoked" => Ok(Self::Revoked),
            other => Err(format!("Unknown session status '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(SessionStatus::Expired.is_terminal());
        assert!(SessionStatus::Revoked.is_terminal());
        for status in SessionStatus::NON_TERMINAL {
            assert!(!status.is_terminal());
        }
    }

    #[test]
    fn test_parse_matches_as_str() {
        for status in [
            SessionStatus::AwaitingInsertion,
            SessionStatus::Inserting,
            SessionStatus::Active,
            SessionStatus::Expired,
            SessionStatus::Revoked,
        ] {
            assert_eq!(status.as_str().parse::<SessionStatus>(), Ok(status));
        }
        assert!("paused".parse::<SessionStatus>().is_err());
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&SessionStatus::AwaitingInsertion).expect("serialize");
        assert_eq!(json, "\"awaiting_insertion\"");
    }
}
