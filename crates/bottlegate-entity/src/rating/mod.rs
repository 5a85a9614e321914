//! Post-session feedback entities.

pub mod model;

pub use model::{NewRating, Rating, RATING_QUESTIONS};
