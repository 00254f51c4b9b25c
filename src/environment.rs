use std::sync::Arc;

use log::Logger;

use crate::catalog::Catalog;

/// Everything a route handler needs, cloned into each route.
#[derive(Clone)]
pub struct Environment {
    pub logger: Arc<Logger>,
    pub catalog: Arc<Catalog>,

    /// The path segment every catalog route lives under.
    pub path: String,
}

impl Environment {
    pub fn new(logger: Arc<Logger>, catalog: Arc<Catalog>, path: impl Into<String>) -> Self {
        Self {
            logger,
            catalog,
            path: path.into(),
        }
    }
}
