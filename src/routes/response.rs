use serde::Serialize;

use crate::review::Review;

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SuccessResponse<'a> {
    Created {
        id: String,
    },
    Healthz {
        revision: Option<&'a str>,
        timestamp: Option<&'a str>,
        version: &'a str,
        mode: &'a str,
        sources: Vec<&'a str>,
    },
    Imported {
        count: usize,
    },
    Review(Review),
    Toggled {
        id: String,
        enabled: bool,
    },
}
