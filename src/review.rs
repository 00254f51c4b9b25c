use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::errors::CatalogError;
use crate::normalization;

/// A rating and comment left on one experience.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Review {
    #[serde(deserialize_with = "normalization::deserialize_id")]
    pub id: String,

    /// The reviewer's display name.
    pub name: String,

    /// From 1 to 5.
    #[serde(deserialize_with = "normalization::deserialize_review_rating")]
    pub rating: u8,

    pub comment: String,

    /// The creation date as `YYYY-MM-DD`.
    #[serde(default)]
    pub date: String,
}

/// A review as submitted, before it's been given an ID and date.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewReview {
    pub name: String,

    #[serde(
        default = "default_rating",
        deserialize_with = "normalization::deserialize_count"
    )]
    pub rating: u32,

    pub comment: String,
}

fn default_rating() -> u32 {
    5
}

impl NewReview {
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.name.trim().is_empty() {
            return Err(CatalogError::InvalidReview {
                reason: "name must not be empty",
            });
        }

        if self.comment.trim().is_empty() {
            return Err(CatalogError::InvalidReview {
                reason: "comment must not be empty",
            });
        }

        if !(1..=5).contains(&self.rating) {
            return Err(CatalogError::InvalidReview {
                reason: "rating must be between 1 and 5",
            });
        }

        Ok(())
    }

    /// Validates the submission and stamps it with a new ID and today's
    /// date.
    pub fn into_review(self) -> Result<Review, CatalogError> {
        self.validate()?;

        Ok(Review {
            id: Uuid::new_v4().to_string(),
            name: self.name.trim().to_owned(),
            rating: normalization::clamp_review_rating(self.rating),
            comment: self.comment.trim().to_owned(),
            date: today(),
        })
    }
}

/// Returns the mean rating rounded to one decimal place, or `0.0` if
/// there are no reviews.
///
/// ```
/// use experiences::review::{average_rating, Review};
///
/// let review = |rating: u8| Review {
///     id: rating.to_string(),
///     name: "Anna".to_owned(),
///     rating,
///     comment: "Bella".to_owned(),
///     date: "2024-06-01".to_owned(),
/// };
///
/// assert_eq!(average_rating(&[]), 0.0);
/// assert_eq!(average_rating(&[review(5), review(4), review(4)]), 4.3);
/// ```
pub fn average_rating(reviews: &[Review]) -> f64 {
    if reviews.is_empty() {
        return 0.0;
    }

    let sum: u32 = reviews.iter().map(|r| u32::from(r.rating)).sum();
    let mean = f64::from(sum) / reviews.len() as f64;

    (mean * 10.0).round() / 10.0
}

fn today() -> String {
    let date = OffsetDateTime::now_utc().date();

    format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
}
