//! An in-memory gateway for tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::RwLock;

use futures::future::{BoxFuture, FutureExt};
use time::{Date, OffsetDateTime};

use super::Db;
use crate::columns::{Policy, ACTIVE, COLUMNS, CREATED_AT};
use crate::errors::InspectionError;
use crate::inspection::{
    Dashboard, DashboardTotals, DatabaseStatus, ExportRow, Fields, InspectionId,
    InspectionRecord, InspectionSummary, Listing, ListingStats, MonthlyCount, Value, VehicleCount,
};
use crate::listing::ListingQuery;
use crate::mapping::Statement;

#[derive(Clone, Debug)]
struct Row {
    id: InspectionId,
    created_at: OffsetDateTime,
    active: bool,
    values: HashMap<String, Value>,
}

impl Row {
    fn text(&self, column: &str) -> Option<String> {
        self.values
            .get(column)
            .and_then(Value::as_text)
            .map(str::to_owned)
    }

    fn date(&self, column: &str) -> Option<Date> {
        self.values.get(column).and_then(Value::as_date)
    }

    fn flag(&self, column: &str) -> bool {
        self.values
            .get(column)
            .and_then(Value::as_flag)
            .unwrap_or(false)
    }

    fn inspection_date(&self) -> Date {
        self.date("inspection_date").unwrap_or(Date::MIN)
    }

    fn has_defect(&self) -> bool {
        COLUMNS
            .iter()
            .filter(|c| c.policy == Policy::Flag && c.name.starts_with("defect_"))
            .any(|c| self.flag(&c.name))
    }

    fn record(&self) -> InspectionRecord {
        let fields = COLUMNS
            .iter()
            .map(|c| {
                let value = self
                    .values
                    .get(&c.name)
                    .cloned()
                    .unwrap_or_else(|| c.policy.default_value());

                (c.name.clone(), value)
            })
            .collect();

        InspectionRecord::new(self.id, self.created_at, self.active, Fields::new(fields))
    }

    fn summary(&self) -> InspectionSummary {
        InspectionSummary {
            id: self.id,
            inspection_date: self.inspection_date(),
            plate: self.text("plate").unwrap_or_default(),
            other_plate: self.text("other_plate"),
            driver_name: self.text("driver_name").unwrap_or_default(),
            vehicle_type: self.text("vehicle_type"),
            model: self.text("model"),
            prepared_by: self.text("prepared_by").unwrap_or_default(),
            defect_front: self.flag("defect_front"),
            defect_rear: self.flag("defect_rear"),
            defect_left_side: self.flag("defect_left_side"),
            defect_right_side: self.flag("defect_right_side"),
            created_at: self.created_at,
        }
    }

    fn export_row(&self) -> ExportRow {
        ExportRow {
            id: self.id,
            inspection_date: self.inspection_date(),
            plate: self.text("plate").unwrap_or_default(),
            driver_name: self.text("driver_name").unwrap_or_default(),
            vehicle_type: self.text("vehicle_type"),
            model: self.text("model"),
            driver_license: self.text("driver_license"),
            odometer: self.values.get("odometer").and_then(Value::as_integer),
            prepared_by: self.text("prepared_by").unwrap_or_default(),
            created_at: self.created_at,
        }
    }
}

/// Releases its session when dropped, whichever way the operation ends.
struct Session<'a> {
    db: &'a MockDb,
}

impl Session<'_> {
    /// Stands in for running a statement on the session.
    fn execute(&self) -> Result<(), InspectionError> {
        if self.db.failing.load(Ordering::SeqCst) {
            Err(InspectionError::Storage {
                source: sqlx::Error::Protocol("simulated storage failure".to_owned()),
            })
        } else {
            Ok(())
        }
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.db.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Keeps inspections in memory and counts the sessions it hands out.
#[derive(Default)]
pub struct MockDb {
    rows: RwLock<BTreeMap<InspectionId, Row>>,
    last_id: AtomicI32,
    open_sessions: AtomicUsize,
    sessions_opened: AtomicUsize,
    failing: AtomicBool,
}

impl MockDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent statement fail with a storage error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Sessions acquired and not yet released.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    /// Sessions acquired since creation.
    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }

    fn session(&self) -> Session<'_> {
        self.sessions_opened.fetch_add(1, Ordering::SeqCst);
        self.open_sessions.fetch_add(1, Ordering::SeqCst);

        Session { db: self }
    }

    fn active_rows(&self) -> Vec<Row> {
        self.rows
            .read()
            .unwrap()
            .values()
            .filter(|r| r.active)
            .cloned()
            .collect()
    }

    fn insert_row(&self, statement: &Statement) -> InspectionId {
        let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;

        let mut values: HashMap<String, Value> = statement.bindings().iter().cloned().collect();
        let created_at = match values.remove(CREATED_AT) {
            Some(Value::Timestamp(t)) => t,
            _ => OffsetDateTime::now_utc(),
        };
        let active = values.remove(ACTIVE).and_then(|v| v.as_flag()).unwrap_or(true);

        let row = Row {
            id,
            created_at,
            active,
            values,
        };
        self.rows.write().unwrap().insert(id, row);

        id
    }

    fn update_row(&self, id: InspectionId, statement: &Statement) -> Result<u64, InspectionError> {
        let mut rows = self.rows.write().unwrap();

        let row = rows
            .get_mut(&id)
            .filter(|r| r.active)
            .ok_or(InspectionError::NotFound(id))?;

        for (column, value) in statement.bindings() {
            if COLUMNS.iter().any(|c| &c.name == column) {
                row.values.insert(column.clone(), value.clone());
            }
        }

        Ok(1)
    }
}

impl Db for MockDb {
    fn insert(&self, statement: Statement) -> BoxFuture<'_, Result<InspectionId, InspectionError>> {
        async move {
            statement.expect_insert()?;
            statement.verify()?;

            let session = self.session();
            session.execute()?;

            Ok(self.insert_row(&statement))
        }
        .boxed()
    }

    fn update(&self, statement: Statement) -> BoxFuture<'_, Result<u64, InspectionError>> {
        async move {
            let id = statement.expect_update()?;
            statement.verify()?;

            let session = self.session();
            session.execute()?;

            self.update_row(id, &statement)
        }
        .boxed()
    }

    fn soft_delete(&self, id: InspectionId) -> BoxFuture<'_, Result<(), InspectionError>> {
        async move {
            let session = self.session();
            session.execute()?;

            let mut rows = self.rows.write().unwrap();

            match rows.get_mut(&id).filter(|r| r.active) {
                Some(row) => {
                    row.active = false;
                    Ok(())
                }
                None => Err(InspectionError::NotFound(id)),
            }
        }
        .boxed()
    }

    fn retrieve(
        &self,
        id: InspectionId,
    ) -> BoxFuture<'_, Result<Option<InspectionRecord>, InspectionError>> {
        async move {
            let session = self.session();
            session.execute()?;

            let rows = self.rows.read().unwrap();

            Ok(rows.get(&id).filter(|r| r.active).map(Row::record))
        }
        .boxed()
    }

    fn list(&self, query: ListingQuery) -> BoxFuture<'_, Result<Listing, InspectionError>> {
        async move {
            query.verify()?;

            let session = self.session();
            session.execute()?;

            let active = self.active_rows();
            let with_defects = active.iter().filter(|r| r.has_defect()).count() as i64;
            let stats = ListingStats {
                total: active.len() as i64,
                without_defects: active.len() as i64 - with_defects,
                with_defects,
            };

            let filter = query.filter();
            let mut matching: Vec<Row> = active
                .into_iter()
                .filter(|r| {
                    filter.matches(
                        &r.text("plate").unwrap_or_default(),
                        r.text("other_plate").as_deref(),
                        &r.text("driver_name").unwrap_or_default(),
                        r.inspection_date(),
                    )
                })
                .collect();

            matching.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

            let total = matching.len() as i64;
            let pagination = query.pagination();
            let inspections = matching
                .iter()
                .skip(pagination.offset() as usize)
                .take(pagination.limit() as usize)
                .map(Row::summary)
                .collect();

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
            let session = self.session();
            session.execute()?;

            let mut rows = self.active_rows();
            rows.sort_by(|a, b| (b.inspection_date(), b.id).cmp(&(a.inspection_date(), a.id)));

            Ok(rows.iter().map(Row::export_row).collect())
        }
        .boxed()
    }

    fn dashboard(&self) -> BoxFuture<'_, Result<Dashboard, InspectionError>> {
        async move {
            let session = self.session();
            session.execute()?;

            Ok(summarize(&self.active_rows()))
        }
        .boxed()
    }

    fn status(&self) -> BoxFuture<'_, Result<DatabaseStatus, InspectionError>> {
        async move {
            let session = self.session();
            session.execute()?;

            Ok(DatabaseStatus {
                version: "in-memory".to_owned(),
                server_time: OffsetDateTime::now_utc(),
            })
        }
        .boxed()
    }
}

fn summarize(rows: &[Row]) -> Dashboard {
    let mut plates: BTreeMap<String, (i64, Option<String>)> = BTreeMap::new();
    let mut months: BTreeMap<String, i64> = BTreeMap::new();
    let mut drivers = std::collections::BTreeSet::new();

    for row in rows {
        let plate = plates.entry(row.text("plate").unwrap_or_default()).or_default();
        plate.0 += 1;
        plate.1 = plate.1.clone().max(row.text("model"));

        let date = row.inspection_date();
        *months
            .entry(format!("{:04}-{:02}", date.year(), u8::from(date.month())))
            .or_default() += 1;

        drivers.insert(row.text("driver_name").unwrap_or_default());
    }

    let odometers: Vec<i32> = rows
        .iter()
        .filter_map(|r| r.values.get("odometer").and_then(Value::as_integer))
        .collect();

    let totals = DashboardTotals {
        total_inspections: rows.len() as i64,
        unique_vehicles: plates.len() as i64,
        unique_drivers: drivers.len() as i64,
        first_inspection: rows.iter().map(Row::inspection_date).min(),
        last_inspection: rows.iter().map(Row::inspection_date).max(),
        average_odometer: if odometers.is_empty() {
            None
        } else {
            Some(odometers.iter().map(|o| f64::from(*o)).sum::<f64>() / odometers.len() as f64)
        },
        with_defects: rows.iter().filter(|r| r.has_defect()).count() as i64,
    };

    let by_month = months
        .into_iter()
        .rev()
        .map(|(month, count)| MonthlyCount { month, count })
        .collect();

    let mut top_vehicles: Vec<VehicleCount> = plates
        .into_iter()
        .map(|(plate, (inspections, model))| VehicleCount {
            plate,
            inspections,
            model,
        })
        .collect();
    top_vehicles.sort_by(|a, b| b.inspections.cmp(&a.inspections).then_with(|| a.plate.cmp(&b.plate)));
    top_vehicles.truncate(10);

    Dashboard {
        totals,
        by_month,
        top_vehicles,
    }
}
