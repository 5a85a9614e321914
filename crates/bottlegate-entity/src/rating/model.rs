//! Rating entity model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Number of survey questions (`q1` through `q10`).
pub const RATING_QUESTIONS: usize = 10;

/// Append-only feedback left after a session.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Rating {
    /// Unique rating identifier.
    pub id: i64,
    /// The session being rated.
    pub session_id: i64,
    /// Overall score (1..=5).
    pub rating: Option<i16>,
    /// Survey answers keyed `q1`..`q10` (JSON object).
    pub answers: serde_json::Value,
    /// Free-form comment.
    pub comment: Option<String>,
    /// When the rating was submitted.
    pub created_at: DateTime<Utc>,
}

/// Data required to record a rating.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewRating {
    /// The session being rated.
    pub session_id: i64,
    /// Overall score (1..=5).
    pub rating: Option<i16>,
    /// Survey answers keyed `q1`..`q10`; unanswered questions are `None`.
    pub answers: BTreeMap<String, Option<i32>>,
    /// Free-form comment.
    pub comment: Option<String>,
}

impl NewRating {
    /// Answers as the JSON object stored in the `answers` column.
    pub fn answers_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.answers
                .iter()
                .map(|(k, v)| (k.clone(), v.map_or(serde_json::Value::Null, Into::into)))
                .collect(),
        )
    }
}
