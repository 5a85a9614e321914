//! Rating repository implementation.

use sqlx::PgPool;

use bottlegate_core::error::{AppError, ErrorKind};
use bottlegate_core::result::AppResult;
use bottlegate_entity::rating::{NewRating, Rating};

use super::is_foreign_key_violation;

/// Repository for append-only session feedback.
#[derive(Debug, Clone)]
pub struct RatingRepository {
    pool: PgPool,
}

impl RatingRepository {
    /// Create a new rating repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store a rating and copy its overall score onto the session once.
    pub async fn create(&self, rating: &NewRating) -> AppResult<Rating> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let stored = sqlx::query_as::<_, Rating>(
            "INSERT INTO ratings (session_id, rating, answers, comment) \
             VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(rating.session_id)
        .bind(rating.rating)
        .bind(rating.answers_json())
        .bind(rating.comment.as_deref())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                AppError::not_found(format!("Session {} not found", rating.session_id))
            } else {
                AppError::with_source(ErrorKind::Database, "Failed to store rating", e)
            }
        })?;

        if let Some(score) = rating.rating {
            sqlx::query("UPDATE sessions SET rating = $2 WHERE id = $1 AND rating IS NULL")
                .bind(rating.session_id)
                .bind(score)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to set session rating", e)
                })?;
        }

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit rating", e)
        })?;

        Ok(stored)
    }

    /// List the most recent ratings.
    pub async fn list_recent(&self, limit: i64) -> AppResult<Vec<Rating>> {
        sqlx::query_as::<_, Rating>("SELECT * FROM ratings ORDER BY created_at DESC LIMIT $1")
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list ratings", e))
    }
}
