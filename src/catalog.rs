//! The single access point for reading and changing the experience
//! catalog.
//!
//! A [`Catalog`] keeps the current catalog in memory and decides which
//! backend each operation touches. Reads on a cold cache walk the
//! [`SourceChain`]; writes go to the primary backend first (the remote
//! database in remote mode, the local snapshot otherwise), then replace
//! the cached catalog in a single assignment and signal subscribers.
//!
//! Writers take turns: each mutation holds a write lock from reading the
//! current catalog until the new one is cached, so concurrent changes
//! are applied one after another. Readers never wait on it.

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, info, warn, Logger};
use serde::Deserialize;
use serde_json::Value;

use crate::config::{DataConfig, Mode};
use crate::db::{Db, PgDb};
use crate::errors::CatalogError;
use crate::experience::Experience;
use crate::normalization::{coerce_id, normalize};
use crate::notify::{Notifier, Subscription};
use crate::review::{NewReview, Review};
use crate::snapshot::LocalStore;
use crate::source::{self, BundledSource, LocalSource, RemoteSource, SeedFileSource, Source, SourceChain};

type Snapshot = Arc<Vec<Experience>>;

/// The backends a catalog is assembled from.
#[derive(Default)]
pub struct Backends {
    /// Makes the catalog run in remote mode.
    pub remote: Option<Arc<dyn Db + Send + Sync>>,

    pub local: Option<Arc<LocalStore>>,

    pub seed_path: Option<PathBuf>,

    /// Leaves the compiled-in catalog out of the source chain.
    pub skip_bundled_seed: bool,
}

pub struct Catalog {
    logger: Arc<Logger>,
    remote: Option<Arc<dyn Db + Send + Sync>>,
    local: Option<Arc<LocalStore>>,
    chain: SourceChain,
    cache: RwLock<Option<Snapshot>>,
    populating: tokio::sync::Mutex<()>,
    writing: tokio::sync::Mutex<()>,
    notifier: Notifier,
}

impl Catalog {
    pub fn new(logger: Arc<Logger>, backends: Backends) -> Self {
        let Backends {
            remote,
            local,
            seed_path,
            skip_bundled_seed,
        } = backends;

        let mut sources: Vec<Box<dyn Source>> = vec![];

        if let Some(db) = &remote {
            sources.push(Box::new(RemoteSource::new(db.clone())));
        }

        if let Some(store) = &local {
            sources.push(Box::new(LocalSource::new(store.clone())));
        }

        if !skip_bundled_seed {
            sources.push(Box::new(BundledSource));
        }

        if let Some(path) = seed_path {
            sources.push(Box::new(SeedFileSource::new(path)));
        }

        let chain = SourceChain::new(logger.clone(), sources);

        Catalog {
            logger,
            remote,
            local,
            chain,
            cache: RwLock::new(None),
            populating: tokio::sync::Mutex::new(()),
            writing: tokio::sync::Mutex::new(()),
            notifier: Notifier::new(),
        }
    }

    /// Assembles a catalog from configuration. The database pool
    /// connects lazily, so an unreachable database only shows up on
    /// first use.
    pub fn from_config(logger: Arc<Logger>, config: &DataConfig) -> Result<Self, CatalogError> {
        let remote: Option<Arc<dyn Db + Send + Sync>> = match (config.mode, &config.connection_string) {
            (Mode::Remote, Some(connection_string)) => {
                Some(Arc::new(PgDb::connect_lazy(logger.clone(), connection_string)?))
            }
            _ => None,
        };

        let local = config
            .local_store_dir
            .as_ref()
            .map(|dir| Arc::new(LocalStore::new(logger.clone(), dir.clone())));

        Ok(Catalog::new(
            logger,
            Backends {
                remote,
                local,
                seed_path: config.seed_path.clone(),
                skip_bundled_seed: !config.bundled_seed,
            },
        ))
    }

    pub fn mode(&self) -> Mode {
        if self.remote.is_some() {
            Mode::Remote
        } else {
            Mode::Json
        }
    }

    /// The sources consulted on a cold cache, in order.
    pub fn sources(&self) -> Vec<&'static str> {
        self.chain.names()
    }

    pub fn subscribe(&self) -> Subscription {
        self.notifier.subscribe()
    }

    /// Returns the whole catalog. Never fails; the worst case is an
    /// empty list.
    pub async fn list_all(&self) -> Vec<Experience> {
        self.snapshot().await.as_ref().clone()
    }

    /// Returns the experiences that are listed publicly.
    pub async fn list_enabled(&self) -> Vec<Experience> {
        self.snapshot()
            .await
            .iter()
            .filter(|e| e.enabled)
            .cloned()
            .collect()
    }

    pub async fn get_by_id(&self, id: &str) -> Option<Experience> {
        self.snapshot().await.iter().find(|e| e.id == id).cloned()
    }

    /// Adds a new experience. Returns `false` if one with the same ID is
    /// already in the catalog.
    pub async fn add(&self, experience: Experience) -> Result<bool, CatalogError> {
        let experience = normalize(experience);
        let _writing = self.writing.lock().await;
        let current = self.snapshot().await;

        if current.iter().any(|e| e.id == experience.id) {
            debug!(self.logger, "Not adding duplicate experience"; "id" => &experience.id);
            return Ok(false);
        }

        if let Some(remote) = &self.remote {
            remote.insert(&experience).await?;
        }

        let id = experience.id.clone();
        let mut next = current.as_ref().clone();
        next.push(experience);
        self.commit(next).await?;

        info!(self.logger, "Added experience"; "id" => id);

        Ok(true)
    }

    /// Replaces an existing experience. Returns `false` if there's no
    /// experience with the same ID.
    pub async fn update(&self, experience: Experience) -> Result<bool, CatalogError> {
        let experience = normalize(experience);
        let _writing = self.writing.lock().await;
        let current = self.snapshot().await;

        self.replace(&current, experience).await
    }

    /// Removes an experience. Returns `false` if there was nothing to
    /// remove, so deleting twice is harmless.
    pub async fn delete(&self, id: &str) -> Result<bool, CatalogError> {
        let _writing = self.writing.lock().await;
        let current = self.snapshot().await;

        if !current.iter().any(|e| e.id == id) {
            debug!(self.logger, "Not deleting unknown experience"; "id" => id);
            return Ok(false);
        }

        if let Some(remote) = &self.remote {
            if !remote.delete(id).await? {
                warn!(self.logger, "Experience was already gone remotely"; "id" => id);
            }
        }

        let next = current.iter().filter(|e| e.id != id).cloned().collect();
        self.commit(next).await?;

        info!(self.logger, "Deleted experience"; "id" => id);

        Ok(true)
    }

    /// Flips whether an experience is listed publicly, saving the whole
    /// record. Returns the new flag, or `None` if the experience doesn't
    /// exist.
    pub async fn toggle_status(&self, id: &str) -> Result<Option<bool>, CatalogError> {
        let _writing = self.writing.lock().await;
        let current = self.snapshot().await;

        let mut experience = match current.iter().find(|e| e.id == id) {
            Some(experience) => experience.clone(),
            None => return Ok(None),
        };

        experience.enabled = !experience.enabled;
        let enabled = experience.enabled;

        if self.replace(&current, experience).await? {
            Ok(Some(enabled))
        } else {
            Ok(None)
        }
    }

    /// Attaches a review to an experience. Returns `None` if the
    /// experience doesn't exist.
    pub async fn add_review(
        &self,
        experience_id: &str,
        submission: NewReview,
    ) -> Result<Option<Review>, CatalogError> {
        let review = submission.into_review()?;

        let _writing = self.writing.lock().await;
        let current = self.snapshot().await;

        let mut experience = match current.iter().find(|e| e.id == experience_id) {
            Some(experience) => experience.clone(),
            None => return Ok(None),
        };

        experience.reviews.push(review.clone());

        if self.replace(&current, experience).await? {
            Ok(Some(review))
        } else {
            Ok(None)
        }
    }

    /// Removes one review. Returns `false` if either the experience or
    /// the review doesn't exist.
    pub async fn delete_review(
        &self,
        experience_id: &str,
        review_id: &str,
    ) -> Result<bool, CatalogError> {
        let _writing = self.writing.lock().await;
        let current = self.snapshot().await;

        let mut experience = match current.iter().find(|e| e.id == experience_id) {
            Some(experience) => experience.clone(),
            None => return Ok(false),
        };

        let before = experience.reviews.len();
        experience.reviews.retain(|r| r.id != review_id);

        if experience.reviews.len() == before {
            return Ok(false);
        }

        self.replace(&current, experience).await
    }

    /// Serializes the whole catalog as indented JSON.
    pub async fn export_as_json(&self) -> Result<String, CatalogError> {
        let snapshot = self.snapshot().await;

        Ok(serde_json::to_string_pretty(snapshot.as_ref())?)
    }

    /// Replaces the catalog with the experiences in `text`, returning
    /// how many there were.
    ///
    /// The text is fully validated before any backend is touched; on
    /// any problem the existing catalog is left exactly as it was. The
    /// remote database is upserted by ID, the local snapshot and the
    /// cache are overwritten.
    pub async fn import_from_json(&self, text: &str) -> Result<usize, CatalogError> {
        let experiences = parse_import(text).map_err(|e| {
            warn!(self.logger, "Rejected import"; "error" => %e);
            e
        })?;

        let _writing = self.writing.lock().await;

        if let Some(remote) = &self.remote {
            remote.upsert_many(&experiences).await?;
        }

        let count = experiences.len();
        self.commit(experiences).await?;

        info!(self.logger, "Imported experiences"; "count" => count);

        Ok(count)
    }

    async fn snapshot(&self) -> Snapshot {
        if let Some(cached) = self.cached() {
            return cached;
        }

        let _guard = self.populating.lock().await;

        // another caller may have finished populating while we waited
        if let Some(cached) = self.cached() {
            return cached;
        }

        self.populate().await
    }

    async fn populate(&self) -> Snapshot {
        let experiences = match self.chain.load().await {
            Some(loaded) => {
                let experiences: Vec<Experience> =
                    loaded.experiences.into_iter().map(normalize).collect();

                if loaded.empty.contains(&source::REMOTE) {
                    self.backfill_remote(&experiences).await;
                }

                experiences
            }
            None => vec![],
        };

        self.swap(Arc::new(experiences))
    }

    async fn backfill_remote(&self, experiences: &[Experience]) {
        match self.chain.save_to(source::REMOTE, experiences).await {
            Ok(_) => {
                info!(self.logger, "Seeded empty remote database"; "count" => experiences.len());
            }
            Err(e) => {
                warn!(self.logger, "Failed to seed remote database"; "error" => %e);
            }
        }
    }

    /// Swaps `experience` in for the cached record with the same ID.
    /// Callers hold the write lock and pass the snapshot they read
    /// under it.
    async fn replace(
        &self,
        current: &[Experience],
        experience: Experience,
    ) -> Result<bool, CatalogError> {
        let index = match current.iter().position(|e| e.id == experience.id) {
            Some(index) => index,
            None => {
                debug!(self.logger, "Not updating unknown experience"; "id" => &experience.id);
                return Ok(false);
            }
        };

        if let Some(remote) = &self.remote {
            if !remote.update(&experience).await? {
                warn!(self.logger, "Experience is cached but missing remotely"; "id" => &experience.id);
                return Ok(false);
            }
        }

        let id = experience.id.clone();
        let mut next = current.to_vec();
        next[index] = experience;
        self.commit(next).await?;

        info!(self.logger, "Updated experience"; "id" => id);

        Ok(true)
    }

    /// Saves the next catalog locally, makes it current and signals
    /// subscribers. The local snapshot is the primary store in JSON
    /// mode; in remote mode it's only a mirror and failures are logged.
    async fn commit(&self, next: Vec<Experience>) -> Result<(), CatalogError> {
        let next = Arc::new(next);

        if let Some(local) = &self.local {
            match local.save(next.clone()).await {
                Ok(()) => {}
                Err(e) if self.remote.is_none() => return Err(e),
                Err(e) => {
                    warn!(self.logger, "Failed to mirror catalog locally"; "error" => %e);
                }
            }
        }

        self.swap(next);
        self.notifier.notify();

        Ok(())
    }

    fn cached(&self) -> Option<Snapshot> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn swap(&self, next: Snapshot) -> Snapshot {
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = Some(next.clone());

        next
    }
}

/// Validates and parses an import. Every element must be an object
/// with an `id` and titled `en` and `it` translations; IDs must be
/// unique.
fn parse_import(text: &str) -> Result<Vec<Experience>, CatalogError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| malformed(format!("invalid JSON: {}", e)))?;

    let items = value
        .as_array()
        .ok_or_else(|| malformed("expected an array of experiences".to_owned()))?;

    let mut experiences: Vec<Experience> = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        check_shape(index, item)?;

        let experience = Experience::deserialize(item)
            .map_err(|e| malformed(format!("element {}: {}", index, e)))?;

        if experiences.iter().any(|e| e.id == experience.id) {
            return Err(malformed(format!(
                "element {}: duplicate ID {}",
                index, experience.id
            )));
        }

        experiences.push(normalize(experience));
    }

    Ok(experiences)
}

fn check_shape(index: usize, item: &Value) -> Result<(), CatalogError> {
    let object = item
        .as_object()
        .ok_or_else(|| malformed(format!("element {} is not an object", index)))?;

    match object.get("id").and_then(coerce_id) {
        Some(id) if !id.trim().is_empty() => {}
        _ => return Err(malformed(format!("element {} has no ID", index))),
    }

    for locale in &["en", "it"] {
        let titled = object
            .get("translations")
            .and_then(|t| t.get(*locale))
            .and_then(|t| t.get("title"))
            .map_or(false, Value::is_string);

        if !titled {
            return Err(malformed(format!(
                "element {} is missing the {} translation",
                index, locale
            )));
        }
    }

    Ok(())
}

fn malformed(reason: String) -> CatalogError {
    CatalogError::MalformedImport { reason }
}
