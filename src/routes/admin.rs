//! Routes served on the admin port only.

use std::convert::Infallible;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use log::{debug, info};
use warp::http::StatusCode;
use warp::reject;
use warp::reply::{json, Reply};
use warp::Filter;

use super::response::SuccessResponse;
use crate::environment::Environment;

/// Asks the servers to shut down once in-flight requests complete.
pub type TerminationFunctionWrapper<'a> = Arc<dyn Fn() -> BoxFuture<'a, ()> + Send + Sync + 'a>;

/// Reports the build and the form revision this build accepts.
pub fn make_healthz_route(
    environment: Environment,
) -> impl Filter<Extract = (impl Reply,), Error = reject::Rejection> + Clone {
    let logger = environment.logger;

    warp::path!("healthz").and(warp::get()).map(move || {
        debug!(logger, "Health check");

        json(&SuccessResponse::Healthz {
            revision: info::REVISION,
            timestamp: info::BUILD_TIMESTAMP,
            version: info::VERSION,
            form: info::FORM_CODE,
        })
    })
}

pub fn make_termination_route<'a>(
    environment: Environment,
    terminate: TerminationFunctionWrapper<'a>,
) -> impl Filter<Extract = (impl Reply,), Error = reject::Rejection> + Clone + 'a {
    let logger = environment.logger;

    warp::path!("terminate")
        .and(warp::post())
        .and_then(move || -> BoxFuture<'a, Result<StatusCode, Infallible>> {
            let terminate = terminate.clone();
            let logger = logger.clone();

            async move {
                info!(logger, "Termination requested");
                terminate().await;

                Ok(StatusCode::NO_CONTENT)
            }
            .boxed()
        })
}
