use std::sync::Arc;

use log::{debug, error, Logger};
use warp::http::StatusCode;
use warp::reject;
use warp::reply::{json, with_status, Json, WithStatus};

use crate::errors::CatalogError;

pub mod admin;
mod handlers;
mod rejection;
mod response;

pub use internal::*;

/// The largest request body to accept. Imports carry the whole catalog,
/// so this is generous.
const MAX_CONTENT_LENGTH: u64 = 16 * 1024 * 1024;

pub async fn format_rejection(
    logger: Arc<Logger>,
    rej: reject::Rejection,
) -> Result<WithStatus<Json>, reject::Rejection> {
    if let Some(r) = rej.find::<rejection::Rejection>() {
        let e = &r.error;
        let status = status_code_for(e);

        if status.is_server_error() {
            error!(logger, "Catalog error"; "context" => ?r.context, "error" => ?r.error, "status" => %status, "message" => %r.error);
        } else {
            debug!(logger, "Rejected request"; "context" => ?r.context, "status" => %status, "message" => %r.error);
        }

        let flattened = r.flatten();

        return Ok(with_status(json(&flattened), status));
    }

    Err(rej)
}

fn status_code_for(e: &CatalogError) -> StatusCode {
    use CatalogError::*;

    match e {
        NotFound(..) => StatusCode::NOT_FOUND,
        MalformedImport { .. }
        | MalformedExperience { .. }
        | MalformedReview { .. }
        | InvalidReview { .. }
        | InvalidLocale(..)
        | IdMismatch { .. } => StatusCode::BAD_REQUEST,
        IdAlreadyExists => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

mod internal {
    use warp::filters::BoxedFilter;
    use warp::path::end;
    use warp::Filter;
    use warp::Reply;
    use warp::{body, delete, get as g, path as p, path::param as par, post, put};

    use super::{handlers, MAX_CONTENT_LENGTH};
    use crate::environment::Environment;

    type Route = BoxedFilter<(Box<dyn Reply>,)>;

    macro_rules! route_filter {
        ($route_variable:ident; $first:expr) => (let $route_variable = $route_variable.and($first););
        ($route_variable:ident; $first:expr, $($rest:expr),+) => (
            let $route_variable = $route_variable.and($first);
            route_filter!($route_variable; $($rest),+);
        )
    }

    macro_rules! route {
        ($name:ident => $handler:ident, $route_variable:ident; $($filters:expr),+) => (
            pub fn $name(environment: Environment) -> Route {
                let r = environment.path.clone();

                let $route_variable = warp::any()
                    .map(move || environment.clone())
                    .and(p(r));

                route_filter!($route_variable; $($filters),+);

                $route_variable.and_then(handlers::$handler)
                    .boxed()
            }
        );
    }

    route!(make_list_route => list, rt; end(), g());
    route!(make_public_route => public, rt; p("public"), end(), g());
    route!(make_export_route => export, rt; p("export"), end(), g());
    route!(make_import_route => import, rt; p("import"), end(), post(), body::content_length_limit(MAX_CONTENT_LENGTH), body::bytes());
    route!(make_events_route => events, rt; p("events"), end(), g());
    route!(make_create_route => create, rt; end(), post(), body::content_length_limit(MAX_CONTENT_LENGTH), body::bytes());
    route!(make_retrieve_route => retrieve, rt; p("id"), par::<String>(), end(), g());
    route!(make_update_route => update, rt; p("id"), par::<String>(), end(), put(), body::content_length_limit(MAX_CONTENT_LENGTH), body::bytes());
    route!(make_delete_route => delete, rt; p("id"), par::<String>(), end(), delete());
    route!(make_view_route => view, rt; p!("id" / String / "view" / String), end(), g());
    route!(make_toggle_route => toggle, rt; p!("id" / String / "toggle"), end(), post());
    route!(make_add_review_route => add_review, rt; p!("id" / String / "reviews"), end(), post(), body::content_length_limit(MAX_CONTENT_LENGTH), body::bytes());
    route!(make_delete_review_route => delete_review, rt; p!("id" / String / "reviews" / String), end(), delete());

    /// Every catalog route, combined.
    pub fn make_catalog_routes(environment: Environment) -> Route {
        make_list_route(environment.clone())
            .or(make_public_route(environment.clone()))
            .unify()
            .or(make_export_route(environment.clone()))
            .unify()
            .or(make_import_route(environment.clone()))
            .unify()
            .or(make_events_route(environment.clone()))
            .unify()
            .or(make_create_route(environment.clone()))
            .unify()
            .or(make_retrieve_route(environment.clone()))
            .unify()
            .or(make_update_route(environment.clone()))
            .unify()
            .or(make_delete_route(environment.clone()))
            .unify()
            .or(make_view_route(environment.clone()))
            .unify()
            .or(make_toggle_route(environment.clone()))
            .unify()
            .or(make_add_review_route(environment.clone()))
            .unify()
            .or(make_delete_review_route(environment))
            .unify()
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_4xx() {
        assert_eq!(
            status_code_for(&CatalogError::NotFound("1".to_owned())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_code_for(&CatalogError::IdAlreadyExists),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_code_for(&CatalogError::InvalidLocale("fr".to_owned())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_code_for(&CatalogError::MalformedImport {
                reason: "empty".to_owned()
            }),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn backend_failures_map_to_500() {
        assert_eq!(
            status_code_for(&CatalogError::ReadOnlySource("bundled")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
