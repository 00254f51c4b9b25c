use std::convert::Infallible;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::stream::StreamExt;
use log::debug;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;
use warp::{
    http::StatusCode,
    reject,
    reply::{json, with_header, with_status, Reply},
    sse::{self, Event},
};

use crate::environment::Environment;
use crate::errors::CatalogError;
use crate::experience::{Experience, Locale};
use crate::review::NewReview;
use crate::routes::{
    rejection::{Context, Rejection},
    response::SuccessResponse,
};
use crate::view::ExperienceView;

const SERVER_TIMING_HEADER: &str = "server-timing";
const EXPORT_FILE_NAME: &str = "experiences.json";
type RouteResult = Result<Box<dyn Reply>, reject::Rejection>;

macro_rules! timed {
    ($($expression:stmt);+) => {
        let start = Instant::now();

        let result = { $($expression)+ };

        Ok(Box::new(with_header(
            result,
            SERVER_TIMING_HEADER,
            format_server_timing(start.elapsed()),
        )) as Box<dyn Reply>)
    };
}

pub async fn list(environment: Environment) -> RouteResult {
    timed! {
        let experiences = environment.catalog.list_all().await;

        json(&experiences)
    }
}

pub async fn public(environment: Environment) -> RouteResult {
    timed! {
        let experiences = environment.catalog.list_enabled().await;

        json(&experiences)
    }
}

pub async fn retrieve(environment: Environment, id: String) -> RouteResult {
    timed! {
        debug!(environment.logger, "Retrieving experience..."; "id" => &id);

        let experience = environment
            .catalog
            .get_by_id(&id)
            .await
            .ok_or_else(|| Rejection::new(Context::retrieve(id.clone()), CatalogError::NotFound(id.clone())))?;

        json(&experience)
    }
}

pub async fn view(environment: Environment, id: String, locale: String) -> RouteResult {
    timed! {
        let error_handler = |e: CatalogError| Rejection::new(Context::view(id.clone(), locale.clone()), e);

        let parsed: Locale = locale.parse().map_err(error_handler)?;

        let experience = environment
            .catalog
            .get_by_id(&id)
            .await
            .ok_or_else(|| error_handler(CatalogError::NotFound(id.clone())))?;

        json(&ExperienceView::new(&experience, parsed))
    }
}

pub async fn create(environment: Environment, body: Bytes) -> RouteResult {
    timed! {
        let experience = parse_experience(&body, || Uuid::new_v4().to_string())
            .map_err(|e| Rejection::new(Context::create(None), e))?;

        let id = experience.id.clone();
        let error_handler = |e: CatalogError| Rejection::new(Context::create(Some(id.clone())), e);

        debug!(environment.logger, "Adding experience..."; "id" => &id);

        let added = environment.catalog.add(experience).await.map_err(error_handler)?;

        if !added {
            return Err(error_handler(CatalogError::IdAlreadyExists).into());
        };

        let location = format!("/{}/id/{}", environment.path, id);

        with_header(
            with_status(json(&SuccessResponse::Created { id }), StatusCode::CREATED),
            "location",
            location,
        )
    }
}

pub async fn update(environment: Environment, id: String, body: Bytes) -> RouteResult {
    timed! {
        let error_handler = |e: CatalogError| Rejection::new(Context::update(id.clone()), e);

        let experience = parse_experience(&body, || id.clone()).map_err(error_handler)?;

        if experience.id != id {
            return Err(error_handler(CatalogError::IdMismatch {
                path: id.clone(),
                body: experience.id,
            })
            .into());
        };

        debug!(environment.logger, "Updating experience..."; "id" => &id);

        let updated = environment.catalog.update(experience).await.map_err(error_handler)?;

        if !updated {
            return Err(error_handler(CatalogError::NotFound(id.clone())).into());
        };

        let stored = environment
            .catalog
            .get_by_id(&id)
            .await
            .ok_or_else(|| error_handler(CatalogError::NotFound(id.clone())))?;

        json(&stored)
    }
}

pub async fn delete(environment: Environment, id: String) -> RouteResult {
    timed! {
        let error_handler = |e: CatalogError| Rejection::new(Context::delete(id.clone()), e);

        debug!(environment.logger, "Deleting experience..."; "id" => &id);

        let deleted = environment.catalog.delete(&id).await.map_err(error_handler)?;

        if !deleted {
            return Err(error_handler(CatalogError::NotFound(id.clone())).into());
        };

        StatusCode::NO_CONTENT
    }
}

pub async fn toggle(environment: Environment, id: String) -> RouteResult {
    timed! {
        let error_handler = |e: CatalogError| Rejection::new(Context::toggle(id.clone()), e);

        let enabled = environment
            .catalog
            .toggle_status(&id)
            .await
            .map_err(error_handler)?
            .ok_or_else(|| error_handler(CatalogError::NotFound(id.clone())))?;

        json(&SuccessResponse::Toggled { id: id.clone(), enabled })
    }
}

pub async fn add_review(environment: Environment, id: String, body: Bytes) -> RouteResult {
    timed! {
        let error_handler = |e: CatalogError| Rejection::new(Context::add_review(id.clone()), e);

        let submission: NewReview = serde_json::from_slice(&body)
            .map_err(|source| error_handler(CatalogError::MalformedReview { source }))?;

        let review = environment
            .catalog
            .add_review(&id, submission)
            .await
            .map_err(error_handler)?
            .ok_or_else(|| error_handler(CatalogError::NotFound(id.clone())))?;

        with_status(json(&SuccessResponse::Review(review)), StatusCode::CREATED)
    }
}

pub async fn delete_review(environment: Environment, id: String, review_id: String) -> RouteResult {
    timed! {
        let error_handler =
            |e: CatalogError| Rejection::new(Context::delete_review(id.clone(), review_id.clone()), e);

        let deleted = environment
            .catalog
            .delete_review(&id, &review_id)
            .await
            .map_err(error_handler)?;

        if !deleted {
            return Err(error_handler(CatalogError::NotFound(review_id.clone())).into());
        };

        StatusCode::NO_CONTENT
    }
}

pub async fn export(environment: Environment) -> RouteResult {
    timed! {
        let exported = environment
            .catalog
            .export_as_json()
            .await
            .map_err(|e| Rejection::new(Context::export(), e))?;

        with_header(
            with_header(exported, "content-type", "application/json"),
            "content-disposition",
            format!("attachment; filename=\"{}\"", EXPORT_FILE_NAME),
        )
    }
}

pub async fn import(environment: Environment, body: Bytes) -> RouteResult {
    timed! {
        let error_handler = |e: CatalogError| Rejection::new(Context::import(), e);

        let text = std::str::from_utf8(&body).map_err(|e| {
            error_handler(CatalogError::MalformedImport {
                reason: format!("not UTF-8: {}", e),
            })
        })?;

        let count = environment
            .catalog
            .import_from_json(text)
            .await
            .map_err(error_handler)?;

        json(&SuccessResponse::Imported { count })
    }
}

/// Streams a `changed` event whenever the catalog changes, until the
/// client goes away.
pub async fn events(environment: Environment) -> RouteResult {
    timed! {
        let subscription = environment.catalog.subscribe();

        debug!(environment.logger, "Subscriber connected");

        let stream = subscription
            .into_stream()
            .map(|_| Ok::<_, Infallible>(Event::default().event("changed").data("{}")));

        sse::reply(sse::keep_alive().stream(stream))
    }
}

/// Parses a submitted experience, filling in the ID if the body has
/// none.
fn parse_experience(
    body: &[u8],
    default_id: impl FnOnce() -> String,
) -> Result<Experience, CatalogError> {
    let mut value: Value = serde_json::from_slice(body)
        .map_err(|source| CatalogError::MalformedExperience { source })?;

    if let Some(object) = value.as_object_mut() {
        if object.get("id").map_or(true, Value::is_null) {
            object.insert("id".to_owned(), Value::String(default_id()));
        }
    }

    Experience::deserialize(value).map_err(|source| CatalogError::MalformedExperience { source })
}

fn format_server_timing(seconds: Duration) -> String {
    format!("handler;dur={}", seconds.as_secs_f64() * 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_ids_are_filled_in() {
        let body = br#"{"translations":{"en":{"title":"A"},"it":{"title":"B"}}}"#;

        let experience = parse_experience(body, || "generated".to_owned()).unwrap();

        assert_eq!(experience.id, "generated");
    }

    #[test]
    fn given_ids_are_kept() {
        let body = br#"{"id":7,"translations":{"en":{"title":"A"},"it":{"title":"B"}}}"#;

        let experience = parse_experience(body, || "generated".to_owned()).unwrap();

        assert_eq!(experience.id, "7");
    }

    #[test]
    fn bodies_without_translations_are_malformed() {
        let result = parse_experience(br#"{"id":"1"}"#, || "generated".to_owned());

        assert!(matches!(result, Err(CatalogError::MalformedExperience { .. })));
    }

    #[test]
    fn timings_are_in_milliseconds() {
        assert_eq!(
            format_server_timing(Duration::from_secs(2)),
            "handler;dur=2000"
        );
    }
}
