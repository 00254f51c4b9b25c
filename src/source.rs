//! The places a catalog can be loaded from, tried in priority order.

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use log::{debug, info, warn, Logger};

use crate::db::Db;
use crate::errors::CatalogError;
use crate::experience::Experience;
use crate::seed;
use crate::snapshot::LocalStore;

pub const REMOTE: &str = "remote";
pub const LOCAL: &str = "local";
pub const BUNDLED: &str = "bundled";
pub const SEED_FILE: &str = "seed-file";

/// Something a whole catalog can be read from and, optionally, written
/// back to.
pub trait Source: Send + Sync {
    fn name(&self) -> &'static str;

    fn load(&self) -> BoxFuture<Result<Vec<Experience>, CatalogError>>;

    fn save(&self, experiences: &[Experience]) -> BoxFuture<Result<(), CatalogError>>;
}

/// The remote database.
pub struct RemoteSource {
    db: Arc<dyn Db + Send + Sync>,
}

impl RemoteSource {
    pub fn new(db: Arc<dyn Db + Send + Sync>) -> Self {
        RemoteSource { db }
    }
}

impl Source for RemoteSource {
    fn name(&self) -> &'static str {
        REMOTE
    }

    fn load(&self) -> BoxFuture<Result<Vec<Experience>, CatalogError>> {
        self.db.select_all()
    }

    fn save(&self, experiences: &[Experience]) -> BoxFuture<Result<(), CatalogError>> {
        self.db.upsert_many(experiences)
    }
}

/// The local snapshot.
pub struct LocalSource {
    store: Arc<LocalStore>,
}

impl LocalSource {
    pub fn new(store: Arc<LocalStore>) -> Self {
        LocalSource { store }
    }
}

impl Source for LocalSource {
    fn name(&self) -> &'static str {
        LOCAL
    }

    fn load(&self) -> BoxFuture<Result<Vec<Experience>, CatalogError>> {
        async move { Ok(self.store.load().await) }.boxed()
    }

    fn save(&self, experiences: &[Experience]) -> BoxFuture<Result<(), CatalogError>> {
        let experiences = Arc::new(experiences.to_vec());

        async move { self.store.save(experiences).await }.boxed()
    }
}

/// The catalog compiled into the binary.
pub struct BundledSource;

impl Source for BundledSource {
    fn name(&self) -> &'static str {
        BUNDLED
    }

    fn load(&self) -> BoxFuture<Result<Vec<Experience>, CatalogError>> {
        async move { Ok(seed::bundled()) }.boxed()
    }

    fn save(&self, _: &[Experience]) -> BoxFuture<Result<(), CatalogError>> {
        async move { Err(CatalogError::ReadOnlySource(BUNDLED)) }.boxed()
    }
}

/// A seed catalog on disk.
pub struct SeedFileSource {
    path: PathBuf,
}

impl SeedFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SeedFileSource { path: path.into() }
    }
}

impl Source for SeedFileSource {
    fn name(&self) -> &'static str {
        SEED_FILE
    }

    fn load(&self) -> BoxFuture<Result<Vec<Experience>, CatalogError>> {
        seed::read_file(self.path.clone()).boxed()
    }

    fn save(&self, _: &[Experience]) -> BoxFuture<Result<(), CatalogError>> {
        async move { Err(CatalogError::ReadOnlySource(SEED_FILE)) }.boxed()
    }
}

/// A catalog together with the source that provided it.
#[derive(Debug)]
pub struct Loaded {
    pub source: &'static str,
    pub experiences: Vec<Experience>,

    /// Higher-priority sources that answered but had nothing.
    pub empty: Vec<&'static str>,
}

/// Sources in priority order. The first one to return a non-empty
/// catalog wins; failures and empty results move on to the next.
pub struct SourceChain {
    logger: Arc<Logger>,
    sources: Vec<Box<dyn Source>>,
}

impl SourceChain {
    pub fn new(logger: Arc<Logger>, sources: Vec<Box<dyn Source>>) -> Self {
        SourceChain { logger, sources }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub async fn load(&self) -> Option<Loaded> {
        let mut empty = vec![];

        for source in self.sources.iter() {
            let name = source.name();

            match source.load().await {
                Ok(experiences) if experiences.is_empty() => {
                    debug!(self.logger, "Source is empty"; "source" => name);
                    empty.push(name);
                }
                Ok(experiences) => {
                    info!(self.logger, "Catalog loaded"; "source" => name, "count" => experiences.len());

                    return Some(Loaded {
                        source: name,
                        experiences,
                        empty,
                    });
                }
                Err(e) => {
                    warn!(self.logger, "Source failed, trying the next one"; "source" => name, "error" => %e);
                }
            }
        }

        warn!(self.logger, "No source had any experiences"; "sources" => ?self.names());

        None
    }

    /// Writes a catalog to the named source. Returns `false` if the
    /// chain has no such source.
    pub async fn save_to(
        &self,
        name: &str,
        experiences: &[Experience],
    ) -> Result<bool, CatalogError> {
        match self.sources.iter().find(|s| s.name() == name) {
            Some(source) => {
                source.save(experiences).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
