use std::sync::Arc;

use log::{crit, error, warn, Logger};
use warp::http::StatusCode;
use warp::reject;
use warp::reply::{json, with_status, Json, WithStatus};

use crate::errors::{ErrorKind, InspectionError};

pub mod admin;
mod handlers;
mod query;
mod rejection;
mod response;

pub use internal::*;

/// The maximum form body to accept. A complete inspection form is a few
/// kilobytes.
const MAX_CONTENT_LENGTH: u64 = 256 * 1024;

pub async fn format_rejection(
    logger: Arc<Logger>,
    rej: reject::Rejection,
) -> Result<WithStatus<Json>, reject::Rejection> {
    if let Some(r) = rej.find::<rejection::Rejection>() {
        let e = &r.error;
        let status = status_code_for(e);

        match e {
            InspectionError::Arity { .. } => {
                crit!(logger, "Statement does not match the column table"; "schema_drift" => true, "context" => ?r.context, "error" => %e, "status" => %status)
            }
            InspectionError::Misdirected { .. } => {
                crit!(logger, "Statement sent to the wrong operation"; "context" => ?r.context, "error" => %e, "status" => %status)
            }
            InspectionError::Storage { source } => {
                error!(logger, "Storage error"; "context" => ?r.context, "error" => ?source, "status" => %status)
            }
            _ => {
                warn!(logger, "Request refused"; "context" => ?r.context, "error" => %e, "status" => %status)
            }
        }

        return Ok(with_status(json(&r.flatten()), status));
    }

    Err(rej)
}

fn status_code_for(e: &InspectionError) -> StatusCode {
    match e.kind() {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Arity | ErrorKind::Storage | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

mod internal {
    use warp::body::{content_length_limit, form};
    use warp::filters::BoxedFilter;
    use warp::path::end;
    use warp::Filter;
    use warp::Reply;
    use warp::{delete, get as g, path as p, path::param as par, post, query};

    use super::{handlers, query as q, MAX_CONTENT_LENGTH};
    use crate::environment::Environment;
    use crate::normalization::RawSubmission;

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
            let r = environment.urls.inspections_path.clone();

            let $route_variable = warp::any()
                .map(move || environment.clone())
                .and(p(r));

            route_filter!($route_variable; $($filters),+);

            $route_variable.and_then(handlers::$handler)
                .boxed()
        }
    );
}

    route!(make_create_route => create, rt; end(), post(), content_length_limit(MAX_CONTENT_LENGTH), form::<RawSubmission>());
    route!(make_list_route => list, rt; end(), g(), query::<q::ListingParams>());
    route!(make_retrieve_route => retrieve, rt; p("id"), par::<String>(), end(), g());
    route!(make_edit_route => edit, rt; p("id"), par::<String>(), end(), post(), content_length_limit(MAX_CONTENT_LENGTH), form::<RawSubmission>());
    route!(make_delete_route => delete, rt; p("id"), par::<String>(), end(), delete());
    route!(make_export_route => export, rt; p("export"), end(), g());
    route!(make_dashboard_route => dashboard, rt; p("dashboard"), end(), g());
    route!(make_status_route => status, rt; p("status"), end(), g());

    /// Every public route, combined.
    pub fn make_routes(environment: Environment) -> Route {
        make_create_route(environment.clone())
            .or(make_list_route(environment.clone()))
            .unify()
            .or(make_retrieve_route(environment.clone()))
            .unify()
            .or(make_edit_route(environment.clone()))
            .unify()
            .or(make_delete_route(environment.clone()))
            .unify()
            .or(make_export_route(environment.clone()))
            .unify()
            .or(make_dashboard_route(environment.clone()))
            .unify()
            .or(make_status_route(environment))
            .unify()
            .boxed()
    }
}
