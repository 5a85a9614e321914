//! Request DTOs with validation.

use std::collections::BTreeMap;

use serde::Deserialize;
use validator::Validate;

use bottlegate_entity::rating::{NewRating, RATING_QUESTIONS};

/// Optional device hints sent by the portal page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceRequest {
    /// Client-reported MAC address.
    pub mac: Option<String>,
    /// Alternate field name used by older portal pages.
    pub mac_address: Option<String>,
}

impl DeviceRequest {
    /// The MAC the client claims, if any.
    pub fn explicit_mac(&self) -> Option<String> {
        self.mac_address.clone().or_else(|| self.mac.clone())
    }
}

/// Query string accepted by `GET /api/session/lookup`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceQuery {
    /// Client-reported MAC address.
    pub mac: Option<String>,
}

/// Bottle or sensor event body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BottleRequest {
    /// Session the bottle is credited to.
    pub session_id: Option<i64>,
}

/// Administrative status change body.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct StatusUpdateRequest {
    /// Target status, e.g. `expired`.
    #[validate(length(min = 1, message = "Status is required"))]
    pub status: String,
}

/// Rating submission: overall score, survey answers `q1`..`q10`, comment.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RatingRequest {
    /// Overall score.
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: Option<i16>,
    pub q1: Option<i32>,
    pub q2: Option<i32>,
    pub q3: Option<i32>,
    pub q4: Option<i32>,
    pub q5: Option<i32>,
    pub q6: Option<i32>,
    pub q7: Option<i32>,
    pub q8: Option<i32>,
    pub q9: Option<i32>,
    pub q10: Option<i32>,
    /// Free-form comment.
    #[validate(length(max = 2000, message = "Comment is too long"))]
    pub comment: Option<String>,
}

impl RatingRequest {
    /// Convert into the rating to store for `session_id`.
    pub fn into_new_rating(self, session_id: i64) -> NewRating {
        let values = [
            self.q1, self.q2, self.q3, self.q4, self.q5, self.q6, self.q7, self.q8, self.q9,
            self.q10,
        ];
        let answers: BTreeMap<String, Option<i32>> = values
            .into_iter()
            .take(RATING_QUESTIONS)
            .enumerate()
            .map(|(i, v)| (format!("q{}", i + 1), v))
            .collect();

        NewRating {
            session_id,
            rating: self.rating,
            answers,
            comment: self
                .comment
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
        }
    }
}
