use futures::future::BoxFuture;

use crate::errors::CatalogError;
use crate::experience::Experience;

#[cfg(test)]
pub(crate) mod mock;

/// The remote relational backend holding the `experiences` table.
pub trait Db {
    /// Creates the table if it doesn't exist yet.
    fn provision(&self) -> BoxFuture<Result<(), CatalogError>>;

    fn select_all(&self) -> BoxFuture<Result<Vec<Experience>, CatalogError>>;

    fn select_by_id(&self, id: &str) -> BoxFuture<Result<Option<Experience>, CatalogError>>;

    fn insert(&self, experience: &Experience) -> BoxFuture<Result<(), CatalogError>>;

    /// Replaces the stored record. Returns `false` if no record has the
    /// same ID.
    fn update(&self, experience: &Experience) -> BoxFuture<Result<bool, CatalogError>>;

    /// Returns `false` if no record has the given ID.
    fn delete(&self, id: &str) -> BoxFuture<Result<bool, CatalogError>>;

    /// Inserts or replaces every given record in one transaction.
    fn upsert_many(&self, experiences: &[Experience]) -> BoxFuture<Result<(), CatalogError>>;
}

pub use self::postgres::*;

mod postgres {
    use std::convert::TryFrom;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use futures::future::BoxFuture;
    use futures::FutureExt;
    use log::{error, info, warn, Logger};
    use serde_json::Value;
    use sqlx::{
        self,
        postgres::{PgArguments, PgPool, PgRow, Postgres},
        query::Query,
        types::Json,
    };

    use crate::errors::CatalogError;
    use crate::experience::{Experience, Translations};
    use crate::normalization::{coerce_decimal, coerce_reviews, normalize};

    const EXPERIENCES_ID_CONSTRAINT: &str = "experiences_pkey";

    /// Postgres error code for `relation ... does not exist`.
    const UNDEFINED_TABLE: &str = "42P01";

    pub struct PgDb {
        logger: Arc<Logger>,
        pool: PgPool,
        provisioning_attempted: AtomicBool,
    }

    impl PgDb {
        pub fn new(logger: Arc<Logger>, pool: PgPool) -> Self {
            PgDb {
                logger,
                pool,
                provisioning_attempted: AtomicBool::new(false),
            }
        }

        /// Creates a pool that only connects when first used, so an
        /// unreachable database doesn't stop the service from starting.
        pub fn connect_lazy(
            logger: Arc<Logger>,
            connection_string: &str,
        ) -> Result<Self, CatalogError> {
            let pool = PgPool::connect_lazy(connection_string).map_err(map_sqlx_error)?;

            Ok(PgDb::new(logger, pool))
        }

        async fn fetch_all(&self) -> Result<Vec<Experience>, sqlx::Error> {
            sqlx::query(include_str!("queries/select_all.sql"))
                .try_map(|row: PgRow| experience_from_row(&row))
                .fetch_all(&self.pool)
                .await
        }

        async fn fetch_one(&self, id: &str) -> Result<Option<Experience>, sqlx::Error> {
            sqlx::query(include_str!("queries/select_by_id.sql"))
                .bind(id.to_owned())
                .try_map(|row: PgRow| experience_from_row(&row))
                .fetch_optional(&self.pool)
                .await
        }

        /// Provisions the table the first time a select finds it
        /// missing. Failures are logged and otherwise ignored; callers
        /// fall back to other sources.
        async fn provision_once(&self, cause: &sqlx::Error) -> bool {
            if self.provisioning_attempted.swap(true, Ordering::SeqCst) {
                return false;
            }

            warn!(self.logger, "Experiences table is missing, creating it..."; "cause" => %cause);

            match super::Db::provision(self).await {
                Ok(()) => {
                    info!(self.logger, "Created experiences table");
                    true
                }
                Err(e) => {
                    error!(self.logger, "Failed to create experiences table"; "error" => ?e);
                    false
                }
            }
        }
    }

    // these can be simplified once async functions in traits are stabilized
    impl super::Db for PgDb {
        fn provision(&self) -> BoxFuture<Result<(), CatalogError>> {
            async move {
                sqlx::query(include_str!("queries/create_table.sql"))
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(())
            }
            .boxed()
        }

        fn select_all(&self) -> BoxFuture<Result<Vec<Experience>, CatalogError>> {
            async move {
                match self.fetch_all().await {
                    Err(e) if is_missing_relation(&e) => {
                        if self.provision_once(&e).await {
                            self.fetch_all().await.map_err(map_sqlx_error)
                        } else {
                            Err(map_sqlx_error(e))
                        }
                    }
                    result => result.map_err(map_sqlx_error),
                }
            }
            .boxed()
        }

        fn select_by_id(&self, id: &str) -> BoxFuture<Result<Option<Experience>, CatalogError>> {
            let id = id.to_owned();

            async move {
                match self.fetch_one(&id).await {
                    Err(e) if is_missing_relation(&e) => {
                        if self.provision_once(&e).await {
                            self.fetch_one(&id).await.map_err(map_sqlx_error)
                        } else {
                            Err(map_sqlx_error(e))
                        }
                    }
                    result => result.map_err(map_sqlx_error),
                }
            }
            .boxed()
        }

        fn insert(&self, experience: &Experience) -> BoxFuture<Result<(), CatalogError>> {
            let experience = experience.clone();

            async move {
                let query = sqlx::query(include_str!("queries/insert.sql"));

                bind_experience(query, &experience)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(())
            }
            .boxed()
        }

        fn update(&self, experience: &Experience) -> BoxFuture<Result<bool, CatalogError>> {
            let experience = experience.clone();

            async move {
                let query = sqlx::query(include_str!("queries/update.sql"));

                let count = bind_experience(query, &experience)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();

                Ok(count > 0)
            }
            .boxed()
        }

        fn delete(&self, id: &str) -> BoxFuture<Result<bool, CatalogError>> {
            let id = id.to_owned();

            async move {
                let count = sqlx::query(include_str!("queries/delete.sql"))
                    .bind(id)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();

                Ok(count > 0)
            }
            .boxed()
        }

        fn upsert_many(&self, experiences: &[Experience]) -> BoxFuture<Result<(), CatalogError>> {
            let experiences = experiences.to_vec();

            async move {
                let mut transaction = self.pool.begin().await.map_err(map_sqlx_error)?;

                for experience in &experiences {
                    let query = sqlx::query(include_str!("queries/upsert.sql"));

                    bind_experience(query, experience)
                        .execute(&mut transaction)
                        .await
                        .map_err(map_sqlx_error)?;
                }

                transaction.commit().await.map_err(map_sqlx_error)?;

                Ok(())
            }
            .boxed()
        }
    }

    fn bind_experience<'q>(
        query: Query<'q, Postgres, PgArguments>,
        experience: &Experience,
    ) -> Query<'q, Postgres, PgArguments> {
        let max_people = i32::try_from(experience.max_people).unwrap_or(i32::MAX);

        query
            .bind(experience.id.clone())
            .bind(experience.enabled)
            .bind(experience.images.clone())
            .bind(Json(experience.translations.clone()))
            .bind(experience.price)
            .bind(experience.duration.clone())
            .bind(experience.location.clone())
            .bind(experience.rating)
            .bind(max_people)
            .bind(Json(experience.reviews.clone()))
    }

    /// Numeric columns come back as text and go through the same
    /// coercion as every other input.
    fn experience_from_row(row: &PgRow) -> Result<Experience, sqlx::Error> {
        use sqlx::Row;

        let price: Option<String> = row.try_get("price")?;
        let rating: Option<String> = row.try_get("rating")?;
        let max_people: Option<i32> = row.try_get("max_people")?;
        let images: Option<Vec<String>> = row.try_get("images")?;
        let Json(translations): Json<Translations> = row.try_get("translations")?;
        let reviews: Option<Json<Value>> = row.try_get("reviews")?;

        let experience = Experience {
            id: row.try_get("id")?,
            enabled: row.try_get("enabled")?,
            images: images.unwrap_or_default(),
            translations,
            price: coerce_decimal(&price.map(Value::String).unwrap_or(Value::Null)),
            duration: row.try_get("duration")?,
            location: row.try_get("location")?,
            rating: coerce_decimal(&rating.map(Value::String).unwrap_or(Value::Null)),
            max_people: max_people.map(|n| n.max(0) as u32).unwrap_or(0),
            reviews: reviews.map(|Json(r)| coerce_reviews(&r)).unwrap_or_default(),
        };

        Ok(normalize(experience))
    }

    fn is_missing_relation(error: &sqlx::Error) -> bool {
        match error {
            sqlx::Error::Database(e) => e.code().as_deref() == Some(UNDEFINED_TABLE),
            _ => false,
        }
    }

    fn map_sqlx_error(error: sqlx::Error) -> CatalogError {
        use sqlx::Error;

        match error {
            Error::Database(ref e) if e.constraint() == Some(EXPERIENCES_ID_CONSTRAINT) => {
                CatalogError::IdAlreadyExists
            }
            _ => CatalogError::Sqlx { source: error },
        }
    }
}
