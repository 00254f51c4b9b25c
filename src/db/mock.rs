use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use futures::future::{BoxFuture, FutureExt};

use crate::db::Db;
use crate::errors::CatalogError;
use crate::experience::Experience;

/// An in-memory stand-in for the remote database.
#[derive(Default)]
pub(crate) struct MockDb {
    pub(crate) rows: RwLock<Vec<Experience>>,
    pub(crate) upserts: AtomicUsize,
    pub(crate) selects: AtomicUsize,
    failing: AtomicBool,
    yielding: AtomicBool,
}

impl MockDb {
    pub fn with_rows(rows: Vec<Experience>) -> Self {
        MockDb {
            rows: RwLock::new(rows),
            ..Default::default()
        }
    }

    /// Makes every later call fail as if the database were unreachable.
    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Makes every later write give up its turn once before touching
    /// the rows, as a network round-trip would.
    pub fn yield_on_writes(&self) {
        self.yielding.store(true, Ordering::SeqCst);
    }

    pub fn ids(&self) -> Vec<String> {
        self.rows.read().unwrap().iter().map(|e| e.id.clone()).collect()
    }

    async fn round_trip(&self) {
        if self.yielding.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
    }

    fn check(&self) -> Result<(), CatalogError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(CatalogError::Sqlx {
                source: sqlx::Error::PoolTimedOut,
            })
        } else {
            Ok(())
        }
    }
}

impl Db for MockDb {
    fn provision(&self) -> BoxFuture<Result<(), CatalogError>> {
        async move { self.check() }.boxed()
    }

    fn select_all(&self) -> BoxFuture<Result<Vec<Experience>, CatalogError>> {
        async move {
            self.check()?;
            self.selects.fetch_add(1, Ordering::SeqCst);

            Ok(self.rows.read().unwrap().clone())
        }
        .boxed()
    }

    fn select_by_id(&self, id: &str) -> BoxFuture<Result<Option<Experience>, CatalogError>> {
        let id = id.to_owned();

        async move {
            self.check()?;

            Ok(self.rows.read().unwrap().iter().find(|e| e.id == id).cloned())
        }
        .boxed()
    }

    fn insert(&self, experience: &Experience) -> BoxFuture<Result<(), CatalogError>> {
        let experience = experience.clone();

        async move {
            self.round_trip().await;
            self.check()?;

            let mut rows = self.rows.write().unwrap();

            if rows.iter().any(|e| e.id == experience.id) {
                return Err(CatalogError::IdAlreadyExists);
            }

            rows.push(experience);

            Ok(())
        }
        .boxed()
    }

    fn update(&self, experience: &Experience) -> BoxFuture<Result<bool, CatalogError>> {
        let experience = experience.clone();

        async move {
            self.round_trip().await;
            self.check()?;

            let mut rows = self.rows.write().unwrap();

            match rows.iter_mut().find(|e| e.id == experience.id) {
                Some(row) => {
                    *row = experience;
                    Ok(true)
                }
                None => Ok(false),
            }
        }
        .boxed()
    }

    fn delete(&self, id: &str) -> BoxFuture<Result<bool, CatalogError>> {
        let id = id.to_owned();

        async move {
            self.round_trip().await;
            self.check()?;

            let mut rows = self.rows.write().unwrap();
            let before = rows.len();
            rows.retain(|e| e.id != id);

            Ok(rows.len() < before)
        }
        .boxed()
    }

    fn upsert_many(&self, experiences: &[Experience]) -> BoxFuture<Result<(), CatalogError>> {
        let experiences = experiences.to_vec();

        async move {
            self.round_trip().await;
            self.check()?;
            self.upserts.fetch_add(1, Ordering::SeqCst);

            let mut rows = self.rows.write().unwrap();

            for experience in experiences {
                match rows.iter_mut().find(|e| e.id == experience.id) {
                    Some(row) => *row = experience,
                    None => rows.push(experience),
                }
            }

            Ok(())
        }
        .boxed()
    }
}
