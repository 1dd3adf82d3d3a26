use futures::future::BoxFuture;

use crate::errors::InspectionError;
use crate::inspection::{Dashboard, DatabaseStatus, ExportRow, InspectionId, InspectionRecord, Listing};
use crate::listing::ListingQuery;
use crate::mapping::Statement;

pub mod mock;

/// The persistence gateway. Every method uses a single pooled session
/// for the duration of one statement.
pub trait Db {
    /// Executes an insertion and returns the generated ID. Any other
    /// statement is refused before a session is acquired.
    fn insert(&self, statement: Statement) -> BoxFuture<'_, Result<InspectionId, InspectionError>>;

    /// Executes an update and returns the number of rows affected. Fails
    /// with `NotFound` if no active record matched, and refuses any
    /// statement that isn’t an update.
    fn update(&self, statement: Statement) -> BoxFuture<'_, Result<u64, InspectionError>>;

    /// Marks a record inactive. Fails with `NotFound` if no active record
    /// matched.
    fn soft_delete(&self, id: InspectionId) -> BoxFuture<'_, Result<(), InspectionError>>;

    /// Retrieves an active record.
    fn retrieve(&self, id: InspectionId)
        -> BoxFuture<'_, Result<Option<InspectionRecord>, InspectionError>>;

    /// Returns one page of matching records, the total number of
    /// matches and defect counts over every active record.
    fn list(&self, query: ListingQuery) -> BoxFuture<'_, Result<Listing, InspectionError>>;

    fn export(&self) -> BoxFuture<'_, Result<Vec<ExportRow>, InspectionError>>;

    fn dashboard(&self) -> BoxFuture<'_, Result<Dashboard, InspectionError>>;

    fn status(&self) -> BoxFuture<'_, Result<DatabaseStatus, InspectionError>>;
}

pub use self::postgres::*;

mod postgres {
    use std::time::Duration;

    use futures::future::BoxFuture;
    use futures::FutureExt;
    use sqlx::{
        self,
        postgres::{PgPool, PgPoolOptions, PgRow},
    };
    use time::OffsetDateTime;

    use crate::columns::{Column, Policy, COLUMNS};
    use crate::errors::InspectionError;
    use crate::inspection::{
        Dashboard, DashboardTotals, DatabaseStatus, ExportRow, Fields, InspectionId,
        InspectionRecord, InspectionSummary, Listing, ListingStats, MonthlyCount, Value,
        VehicleCount,
    };
    use crate::listing::ListingQuery;
    use crate::mapping::Statement;

    /// Binds a [`Value`] to any sqlx query builder.
    macro_rules! bind_value {
        ($query:expr, $value:expr) => {
            match $value {
                Value::Text(t) => $query.bind(t.clone()),
                Value::Date(d) => $query.bind(*d),
                Value::Integer(i) => $query.bind(*i),
                Value::BigInt(i) => $query.bind(*i),
                Value::Flag(b) => $query.bind(*b),
                Value::Condition(c) => $query.bind(c.as_str()),
                Value::Timestamp(t) => $query.bind(*t),
                Value::Id(id) => $query.bind(*id),
            }
        };
    }

    macro_rules! bind_all {
        ($query:expr, $values:expr) => {{
            let mut query = $query;

            for value in $values {
                query = bind_value!(query, value);
            }

            query
        }};
    }

    pub struct PgDb {
        pool: PgPool,
    }

    impl PgDb {
        pub fn new(pool: PgPool) -> Self {
            PgDb { pool }
        }
    }

    /// Creates a pool that waits up to `acquire_timeout` for a free
    /// connection instead of failing immediately.
    pub async fn create_pool(
        connection_string: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<PgPool, InspectionError> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(connection_string)
            .await
            .map_err(map_sqlx_error)
    }

    // these can be simplified once async functions in traits are usable
    // behind `dyn`
    impl super::Db for PgDb {
        fn insert(&self, statement: Statement) -> BoxFuture<'_, Result<InspectionId, InspectionError>> {
            async move {
                statement.expect_insert()?;
                statement.verify()?;

                let mut connection = self.pool.acquire().await.map_err(map_sqlx_error)?;

                let query = sqlx::query_as::<_, (InspectionId,)>(statement.text());
                let query = bind_all!(query, statement.values());

                let (id,) = query
                    .fetch_one(&mut *connection)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(id)
            }
            .boxed()
        }

        fn update(&self, statement: Statement) -> BoxFuture<'_, Result<u64, InspectionError>> {
            async move {
                let id = statement.expect_update()?;
                statement.verify()?;

                let mut connection = self.pool.acquire().await.map_err(map_sqlx_error)?;

                let query = bind_all!(sqlx::query(statement.text()), statement.values());

                let count = query
                    .execute(&mut *connection)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();

                if count == 0 {
                    Err(InspectionError::NotFound(id))
                } else {
                    Ok(count)
                }
            }
            .boxed()
        }

        fn soft_delete(&self, id: InspectionId) -> BoxFuture<'_, Result<(), InspectionError>> {
            async move {
                let mut connection = self.pool.acquire().await.map_err(map_sqlx_error)?;

                let count = sqlx::query(include_str!("queries/soft_delete.sql"))
                    .bind(id)
                    .execute(&mut *connection)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();

                if count == 0 {
                    Err(InspectionError::NotFound(id))
                } else {
                    Ok(())
                }
            }
            .boxed()
        }

        fn retrieve(
            &self,
            id: InspectionId,
        ) -> BoxFuture<'_, Result<Option<InspectionRecord>, InspectionError>> {
            async move {
                let mut connection = self.pool.acquire().await.map_err(map_sqlx_error)?;

                let query = sqlx::query(include_str!("queries/retrieve.sql"));

                let record = query
                    .bind(id)
                    .try_map(|row: PgRow| new_record(&row))
                    .fetch_optional(&mut *connection)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(record)
            }
            .boxed()
        }

        fn list(&self, query: ListingQuery) -> BoxFuture<'_, Result<Listing, InspectionError>> {
            async move {
                query.verify()?;

                let mut connection = self.pool.acquire().await.map_err(map_sqlx_error)?;

                let count = sqlx::query_as::<_, (i64,)>(query.count_text());
                let (total,) = bind_all!(count, query.params())
                    .fetch_one(&mut *connection)
                    .await
                    .map_err(map_sqlx_error)?;

                let page_params = query.page_params();
                let page = sqlx::query_as::<_, InspectionSummary>(query.page_text());
                let inspections = bind_all!(page, page_params.iter())
                    .fetch_all(&mut *connection)
                    .await
                    .map_err(map_sqlx_error)?;

                let stats = sqlx::query_as::<_, ListingStats>(include_str!("queries/listing_stats.sql"))
                    .fetch_one(&mut *connection)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(Listing {
                    inspections,
                    total,
                    stats,
                })
            }
            .boxed()
        }

        fn export(&self) -> BoxFuture<'_, Result<Vec<ExportRow>, InspectionError>> {
            async move {
                let mut connection = self.pool.acquire().await.map_err(map_sqlx_error)?;

                let rows = sqlx::query_as::<_, ExportRow>(include_str!("queries/export.sql"))
                    .fetch_all(&mut *connection)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(rows)
            }
            .boxed()
        }

        fn dashboard(&self) -> BoxFuture<'_, Result<Dashboard, InspectionError>> {
            async move {
                let mut connection = self.pool.acquire().await.map_err(map_sqlx_error)?;

                let totals =
                    sqlx::query_as::<_, DashboardTotals>(include_str!("queries/dashboard_totals.sql"))
                        .fetch_one(&mut *connection)
                        .await
                        .map_err(map_sqlx_error)?;

                let by_month =
                    sqlx::query_as::<_, MonthlyCount>(include_str!("queries/dashboard_by_month.sql"))
                        .fetch_all(&mut *connection)
                        .await
                        .map_err(map_sqlx_error)?;

                let top_vehicles = sqlx::query_as::<_, VehicleCount>(include_str!(
                    "queries/dashboard_top_vehicles.sql"
                ))
                .fetch_all(&mut *connection)
                .await
                .map_err(map_sqlx_error)?;

                Ok(Dashboard {
                    totals,
                    by_month,
                    top_vehicles,
                })
            }
            .boxed()
        }

        fn status(&self) -> BoxFuture<'_, Result<DatabaseStatus, InspectionError>> {
            async move {
                let mut connection = self.pool.acquire().await.map_err(map_sqlx_error)?;

                let (version, server_time): (String, OffsetDateTime) =
                    sqlx::query_as(include_str!("queries/status.sql"))
                        .fetch_one(&mut *connection)
                        .await
                        .map_err(map_sqlx_error)?;

                Ok(DatabaseStatus {
                    version,
                    server_time,
                })
            }
            .boxed()
        }
    }

    fn new_record(row: &PgRow) -> Result<InspectionRecord, sqlx::Error> {
        let id: InspectionId = try_get(row, "id")?;
        let created_at: OffsetDateTime = try_get(row, "created_at")?;
        let active: bool = try_get(row, "active")?;

        let fields = COLUMNS
            .iter()
            .map(|column| Ok((column.name.clone(), decode_column(row, column)?)))
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(InspectionRecord::new(
            id,
            created_at,
            active,
            Fields::new(fields),
        ))
    }

    fn decode_column(row: &PgRow, column: &Column) -> Result<Value, sqlx::Error> {
        let name = column.name.as_str();

        let value = match column.policy {
            Policy::RequiredText | Policy::OptionalText | Policy::Plate | Policy::AlternatePlate => {
                Value::Text(try_get(row, name)?)
            }
            Policy::RequiredDate | Policy::OptionalDate => Value::Date(try_get(row, name)?),
            Policy::OptionalInteger => Value::Integer(try_get(row, name)?),
            Policy::Flag => Value::Flag(try_get(row, name)?),
            Policy::Condition => {
                let raw: String = try_get(row, name)?;

                Value::Condition(raw.parse().map_err(|e| sqlx::Error::ColumnDecode {
                    index: name.to_owned(),
                    source: Box::new(e),
                })?)
            }
        };

        Ok(value)
    }

    fn try_get<'a, T: sqlx::Type<sqlx::Postgres> + sqlx::decode::Decode<'a, sqlx::Postgres>>(
        row: &'a PgRow,
        column: &str,
    ) -> Result<T, sqlx::Error> {
        use sqlx::prelude::*;

        row.try_get(column)
    }

    fn map_sqlx_error(error: sqlx::Error) -> InspectionError {
        InspectionError::Storage { source: error }
    }
}
