use thiserror::Error;

/// Enumerates high-level errors returned by this library.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Represents an error returned by the remote database.
    #[error("SQLx error")]
    Sqlx { source: sqlx::Error },

    /// Represents an error reading or writing a local file.
    #[error("I/O error on {path}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Represents an error (de)serializing the catalog.
    #[error("JSON error")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// The remote backend already holds a record with the same ID.
    #[error("ID already exists")]
    IdAlreadyExists,

    /// No record matches the given ID.
    #[error("Experience {0} not found")]
    NotFound(String),

    /// An import was rejected without touching the catalog.
    #[error("Malformed import: {reason}")]
    MalformedImport { reason: String },

    /// A submitted experience could not be parsed.
    #[error("Malformed experience")]
    MalformedExperience { source: serde_json::Error },

    /// A submitted review could not be parsed.
    #[error("Malformed review")]
    MalformedReview { source: serde_json::Error },

    /// A submitted review failed validation.
    #[error("Invalid review: {reason}")]
    InvalidReview { reason: &'static str },

    /// The requested locale isn't one of the supported ones.
    #[error("Unsupported locale {0}")]
    InvalidLocale(String),

    /// The ID in the path and the ID in the body disagree.
    #[error("ID in body ({body}) does not match ID in path ({path})")]
    IdMismatch { path: String, body: String },

    /// The source can only be read from.
    #[error("Source {0} is read-only")]
    ReadOnlySource(&'static str),

    /// A blocking task panicked or was cancelled.
    #[error("Background task failed")]
    Task { source: tokio::task::JoinError },
}

impl CatalogError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        CatalogError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}
