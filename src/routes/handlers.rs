use std::time::{Duration, Instant};

use log::{debug, info, o, Logger};
use time::OffsetDateTime;
use warp::{
    http::StatusCode,
    reject,
    reply::{json, with_header, with_status, Reply},
};

use crate::environment::Environment;
use crate::errors::InspectionError;
use crate::export;
use crate::inspection::{InspectionId, ListingPage};
use crate::listing::{ListingFilter, ListingQuery, Pagination};
use crate::mapping::{insertion, update};
use crate::normalization::{is_form_field, normalize, RawSubmission};
use crate::routes::{
    query::ListingParams,
    rejection::{Context, Rejection},
    response::SuccessResponse,
};

const SERVER_TIMING_HEADER: &str = "server-timing";
type RouteResult = Result<Box<dyn Reply>, reject::Rejection>;

macro_rules! timed {
    ($($expression:stmt);+) => {
        let start = Instant::now();

        // TODO when `try` blocks are stabilized, we can wrap the body
        // and return the headers even on errors
        let result = { $($expression)+ };

        Ok(Box::new(with_header(
            result,
            SERVER_TIMING_HEADER,
            format_server_timing(start.elapsed()),
        )) as Box<dyn Reply>)
    };
}

pub async fn create(environment: Environment, submission: RawSubmission) -> RouteResult {
    timed! {
        let Environment { logger, db, urls, .. } = environment;

        let error_handler = |e: InspectionError| Rejection::new(Context::create(), e);

        log_ignored_fields(&logger, &submission);

        debug!(logger, "Normalizing submission...");
        let record = normalize(&submission).map_err(error_handler)?;
        let statement = insertion(&record, OffsetDateTime::now_utc()).map_err(error_handler)?;

        debug!(logger, "Inserting inspection...");
        let id = db.insert(statement).await.map_err(error_handler)?;

        let tally = record.tally();
        let logger = logger.new(o!("id" => id));
        info!(logger, "Created inspection"; "good" => tally.good, "bad" => tally.bad);

        let location = urls.inspection(id);

        with_header(
            with_status(json(&SuccessResponse::Created { id, tally }), StatusCode::CREATED),
            "location",
            location.as_str(),
        )
    }
}

pub async fn list(environment: Environment, params: ListingParams) -> RouteResult {
    timed! {
        let error_handler = |e: InspectionError| Rejection::new(Context::list(), e);

        let filter = ListingFilter::parse(
            params.plate.as_deref(),
            params.driver.as_deref(),
            params.date_from.as_deref(),
            params.date_to.as_deref(),
        )
        .map_err(error_handler)?;
        let pagination = Pagination::parse(params.page.as_deref(), environment.config.page_size)
            .map_err(error_handler)?;
        let query = ListingQuery::build(filter, pagination).map_err(error_handler)?;

        debug!(environment.logger, "Listing inspections..."; "page" => pagination.page());
        let listing = environment.db.list(query).await.map_err(error_handler)?;

        json(&ListingPage::new(listing, pagination.page(), pagination.page_size()))
    }
}

pub async fn retrieve(environment: Environment, id: String) -> RouteResult {
    timed! {
        let error_handler = |e: InspectionError| Rejection::new(Context::retrieve(id.clone()), e);

        let id = parse_id(&id).map_err(error_handler)?;
        debug!(environment.logger, "Retrieving inspection..."; "id" => id);

        let record = environment
            .db
            .retrieve(id)
            .await
            .map_err(error_handler)?
            .ok_or(InspectionError::NotFound(id))
            .map_err(error_handler)?;

        json(&record)
    }
}

pub async fn edit(environment: Environment, id: String, submission: RawSubmission) -> RouteResult {
    timed! {
        let error_handler = |e: InspectionError| Rejection::new(Context::edit(id.clone()), e);

        let id = parse_id(&id).map_err(error_handler)?;
        let logger = environment.logger.new(o!("id" => id));

        log_ignored_fields(&logger, &submission);

        debug!(logger, "Normalizing submission...");
        let record = normalize(&submission).map_err(error_handler)?;
        let statement = update(&record, id).map_err(error_handler)?;

        debug!(logger, "Updating inspection...");
        let updated = environment.db.update(statement).await.map_err(error_handler)?;

        info!(logger, "Updated inspection"; "rows" => updated);

        json(&SuccessResponse::Updated { id, updated })
    }
}

pub async fn delete(environment: Environment, id: String) -> RouteResult {
    timed! {
        let error_handler = |e: InspectionError| Rejection::new(Context::delete(id.clone()), e);

        let id = parse_id(&id).map_err(error_handler)?;
        debug!(environment.logger, "Deactivating inspection..."; "id" => id);

        environment.db.soft_delete(id).await.map_err(error_handler)?;

        info!(environment.logger, "Deactivated inspection"; "id" => id);

        StatusCode::NO_CONTENT
    }
}

pub async fn export(environment: Environment) -> RouteResult {
    timed! {
        let rows = environment
            .db
            .export()
            .await
            .map_err(|e| Rejection::new(Context::export(), e))?;

        debug!(environment.logger, "Exporting inspections..."; "rows" => rows.len());

        let disposition = format!(
            "attachment; filename=\"{}\"",
            export::filename(OffsetDateTime::now_utc().date())
        );

        with_header(
            with_header(export::render(&rows), "content-type", export::CONTENT_TYPE),
            "content-disposition",
            disposition,
        )
    }
}

pub async fn dashboard(environment: Environment) -> RouteResult {
    timed! {
        let dashboard = environment
            .db
            .dashboard()
            .await
            .map_err(|e| Rejection::new(Context::dashboard(), e))?;

        json(&dashboard)
    }
}

pub async fn status(environment: Environment) -> RouteResult {
    timed! {
        let status = environment
            .db
            .status()
            .await
            .map_err(|e| Rejection::new(Context::status(), e))?;

        json(&status)
    }
}

fn parse_id(id: &str) -> Result<InspectionId, InspectionError> {
    id.parse::<InspectionId>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| InspectionError::InvalidId(id.to_owned()))
}

fn log_ignored_fields(logger: &Logger, submission: &RawSubmission) {
    for field in submission.keys().filter(|k| !is_form_field(k)) {
        debug!(logger, "Ignoring unknown field"; "field" => field);
    }
}

fn format_server_timing(seconds: Duration) -> String {
    format!("handler;dur={}", seconds.as_secs_f64() * 1000.0)
}

#[cfg(test)]
mod tests {
    use super::parse_id;

    #[test]
    fn ids_must_be_positive_integers() {
        assert_eq!(parse_id("42").unwrap(), 42);

        for bad in &["0", "-3", "abc", "1.5", ""] {
            assert!(parse_id(bad).is_err(), "{:?} must be refused", bad);
        }
    }
}
