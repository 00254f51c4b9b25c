//! Coercion of loosely-typed input into the catalog's numeric and
//! collection fields.
//!
//! Values arrive from HTML forms, hand-edited JSON files and database
//! columns that report numerics as text, so every reader goes through
//! the functions here instead of trusting the declared type.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::experience::Experience;
use crate::review::Review;

/// Normalizes an experience that is crossing a storage boundary.
///
/// ```
/// use experiences::experience::{Experience, Translation, Translations};
/// use experiences::normalization::normalize;
///
/// let mut experience = Experience::new(Translations {
///     en: Translation::titled("Boat trip"),
///     it: Translation::titled("Giro in barca"),
/// });
/// experience.price = -3.0;
/// experience.rating = f64::NAN;
///
/// let experience = normalize(experience);
/// assert_eq!(experience.price, 0.0);
/// assert_eq!(experience.rating, 0.0);
/// ```
pub fn normalize(mut experience: Experience) -> Experience {
    experience.price = clamp_decimal(experience.price);
    experience.rating = clamp_decimal(experience.rating);

    for review in experience.reviews.iter_mut() {
        review.rating = clamp_review_rating(u32::from(review.rating));
    }

    experience
}

/// Reads a non-negative decimal, falling back to `0.0`.
///
/// ```
/// use experiences::normalization::coerce_decimal;
/// use serde_json::json;
///
/// assert_eq!(coerce_decimal(&json!("49.99")), 49.99);
/// assert_eq!(coerce_decimal(&json!(12)), 12.0);
/// assert_eq!(coerce_decimal(&json!("a lot")), 0.0);
/// ```
pub fn coerce_decimal(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    clamp_decimal(parsed.unwrap_or(0.0))
}

/// Reads a non-negative whole number, truncating decimals and falling
/// back to `0`.
pub fn coerce_count(value: &Value) -> u32 {
    match value {
        Value::Number(n) => match n.as_u64() {
            Some(whole) => saturate(whole),
            None => n.as_f64().map(count_from_f64).unwrap_or(0),
        },
        Value::String(s) => {
            let s = s.trim();

            match s.parse::<u64>() {
                Ok(whole) => saturate(whole),
                Err(_) => s.parse::<f64>().map(count_from_f64).unwrap_or(0),
            }
        }
        _ => 0,
    }
}

/// Reads a list of reviews. Anything that isn't an array is treated as
/// empty and elements that can't be read as a review are dropped.
pub fn coerce_reviews(value: &Value) -> Vec<Review> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| Review::deserialize(item).ok())
            .collect(),
        _ => vec![],
    }
}

/// Reads a list of image URLs, dropping anything that isn't a string.
pub fn coerce_images(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_owned))
            .collect(),
        _ => vec![],
    }
}

/// Reads an identifier that may have been stored as a number.
pub fn coerce_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn clamp_review_rating(rating: u32) -> u8 {
    rating.max(1).min(5) as u8
}

fn clamp_decimal(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

fn count_from_f64(value: f64) -> u32 {
    if value.is_finite() && value >= 0.0 {
        saturate(value.trunc() as u64)
    } else {
        0
    }
}

fn saturate(value: u64) -> u32 {
    value.min(u64::from(u32::MAX)) as u32
}

/// Deserializes a decimal through `coerce_decimal`.
pub fn deserialize_decimal<'de, D>(deserializer: D) -> Result<f64, D::Error>
where D: Deserializer<'de> {
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_decimal(&value))
}

/// Deserializes a whole number through `coerce_count`.
pub fn deserialize_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where D: Deserializer<'de> {
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_count(&value))
}

/// Deserializes a review rating, clamped to 1–5.
pub fn deserialize_review_rating<'de, D>(deserializer: D) -> Result<u8, D::Error>
where D: Deserializer<'de> {
    let value = Value::deserialize(deserializer)?;
    Ok(clamp_review_rating(coerce_count(&value)))
}

/// Deserializes reviews through `coerce_reviews`.
pub fn deserialize_reviews<'de, D>(deserializer: D) -> Result<Vec<Review>, D::Error>
where D: Deserializer<'de> {
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_reviews(&value))
}

/// Deserializes image URLs through `coerce_images`.
pub fn deserialize_images<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where D: Deserializer<'de> {
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_images(&value))
}

/// Deserializes a string or numeric identifier.
pub fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where D: Deserializer<'de> {
    use serde::de::Error;

    let value = Value::deserialize(deserializer)?;
    coerce_id(&value).ok_or_else(|| D::Error::custom("expected a string or numeric ID"))
}
