use serde::Serialize;

use crate::experience::{Experience, Locale};
use crate::format::format_content;
use crate::review::average_rating;

/// An experience as shown to a visitor in one locale, with its content
/// turned into markup and the placeholder image filled in.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceView {
    pub id: String,
    pub locale: Locale,
    pub title: String,
    pub description: String,
    pub content: String,
    pub image: String,
    pub images: Vec<String>,
    pub price: f64,
    pub duration: String,
    pub location: String,
    pub rating: f64,
    pub max_people: u32,
    pub review_count: usize,
    pub average_review_rating: f64,
}

impl ExperienceView {
    pub fn new(experience: &Experience, locale: Locale) -> Self {
        let translation = experience.translation(locale);

        ExperienceView {
            id: experience.id.clone(),
            locale,
            title: translation.title.clone(),
            description: translation.description.clone(),
            content: format_content(&translation.content),
            image: experience.display_image().to_owned(),
            images: experience.images.clone(),
            price: experience.price,
            duration: experience.duration.clone(),
            location: experience.location.clone(),
            rating: experience.rating,
            max_people: experience.max_people,
            review_count: experience.reviews.len(),
            average_review_rating: average_rating(&experience.reviews),
        }
    }
}
