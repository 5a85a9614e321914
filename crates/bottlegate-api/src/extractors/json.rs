//! JSON body extractor that tolerates an empty body.

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;

use bottlegate_core::error::AppError;

use crate::error::ApiError;

/// Like `Json<T>`, but an empty body yields `T::default()`.
///
/// Portal clients post to several endpoints without any body, and some
/// send form-less requests without a content type.
#[derive(Debug, Clone, Default)]
pub struct OptionalJson<T>(pub T);

impl<S, T> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::validation(format!("Failed to read request body: {e}")))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(T::default()));
        }

        serde_json::from_slice(&bytes)
            .map(Self)
            .map_err(|e| AppError::validation(format!("Invalid JSON body: {e}")).into())
    }
}
