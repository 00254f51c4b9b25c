use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::CatalogError;
use crate::normalization;
use crate::review::Review;

/// Shown wherever an experience has no images of its own.
pub const DEFAULT_IMAGE: &str =
    "https://images.unsplash.com/photo-1488590528505-98d2b5aba04b?auto=format&fit=crop&w=800&h=500";

/// A bookable tour or activity in the catalog.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    /// The ID of the experience. Never changes once created.
    #[serde(deserialize_with = "normalization::deserialize_id")]
    pub id: String,

    /// Whether the experience is listed publicly.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,

    /// Image URLs in display order. May be empty.
    #[serde(default, deserialize_with = "normalization::deserialize_images")]
    pub images: Vec<String>,

    /// The localized texts.
    pub translations: Translations,

    #[serde(default, deserialize_with = "normalization::deserialize_decimal")]
    pub price: f64,

    /// Free text, e.g. "3 hours".
    #[serde(default)]
    pub duration: String,

    #[serde(default)]
    pub location: String,

    /// Nominally 0–5 with one decimal place.
    #[serde(default, deserialize_with = "normalization::deserialize_decimal")]
    pub rating: f64,

    #[serde(default, deserialize_with = "normalization::deserialize_count")]
    pub max_people: u32,

    #[serde(default, deserialize_with = "normalization::deserialize_reviews")]
    pub reviews: Vec<Review>,
}

fn enabled_by_default() -> bool {
    true
}

impl Experience {
    /// Creates an enabled experience with a fresh ID and nothing but
    /// the given texts.
    pub fn new(translations: Translations) -> Self {
        Experience {
            id: Uuid::new_v4().to_string(),
            enabled: true,
            images: vec![],
            translations,
            price: 0.0,
            duration: String::new(),
            location: String::new(),
            rating: 0.0,
            max_people: 0,
            reviews: vec![],
        }
    }

    pub fn translation(&self, locale: Locale) -> &Translation {
        match locale {
            Locale::En => &self.translations.en,
            Locale::It => &self.translations.it,
        }
    }

    /// Returns the first image, or the placeholder if there are none.
    pub fn display_image(&self) -> &str {
        self.images
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_IMAGE)
    }
}

/// The texts of an experience in every supported locale.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Translations {
    pub en: Translation,
    pub it: Translation,
}

/// The texts of an experience in one locale.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Translation {
    pub title: String,

    #[serde(default)]
    pub description: String,

    /// Either plain text with `*`, `-` or `1.` list markers or raw
    /// markup. See [`crate::format::format_content`].
    #[serde(default)]
    pub content: String,
}

impl Translation {
    pub fn titled(title: impl Into<String>) -> Self {
        Translation {
            title: title.into(),
            ..Default::default()
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    En,
    It,
}

impl FromStr for Locale {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "en" => Ok(Locale::En),
            "it" => Ok(Locale::It),
            _ => Err(CatalogError::InvalidLocale(s.to_owned())),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locale::En => f.write_str("en"),
            Locale::It => f.write_str("it"),
        }
    }
}
