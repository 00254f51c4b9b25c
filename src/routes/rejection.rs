use serde::Serialize;
use warp::reject;

use crate::errors::CatalogError;

#[derive(Debug)]
pub struct Rejection {
    pub(crate) context: Context,
    pub(crate) error: CatalogError,
}

impl Rejection {
    pub fn new(context: Context, error: CatalogError) -> Self {
        Rejection { context, error }
    }

    pub fn flatten(&self) -> FlattenedRejection {
        FlattenedRejection {
            context: self.context.clone(),
            message: format!("{}", self.error),
        }
    }
}

impl reject::Reject for Rejection {}

#[derive(Debug, Serialize)]
pub struct FlattenedRejection {
    #[serde(flatten)]
    pub(crate) context: Context,
    pub(crate) message: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum Context {
    AddReview { id: String },
    Create { id: Option<String> },
    Delete { id: String },
    DeleteReview { id: String, review_id: String },
    Export,
    Import,
    List,
    Public,
    Retrieve { id: String },
    Toggle { id: String },
    Update { id: String },
    View { id: String, locale: String },
}

impl Context {
    pub fn add_review(id: String) -> Context {
        Context::AddReview { id }
    }

    pub fn create(id: Option<String>) -> Context {
        Context::Create { id }
    }

    pub fn delete(id: String) -> Context {
        Context::Delete { id }
    }

    pub fn delete_review(id: String, review_id: String) -> Context {
        Context::DeleteReview { id, review_id }
    }

    pub fn export() -> Context {
        Context::Export
    }

    pub fn import() -> Context {
        Context::Import
    }

    pub fn list() -> Context {
        Context::List
    }

    pub fn public() -> Context {
        Context::Public
    }

    pub fn retrieve(id: String) -> Context {
        Context::Retrieve { id }
    }

    pub fn toggle(id: String) -> Context {
        Context::Toggle { id }
    }

    pub fn update(id: String) -> Context {
        Context::Update { id }
    }

    pub fn view(id: String, locale: String) -> Context {
        Context::View { id, locale }
    }
}
