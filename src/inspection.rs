use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use time::{Date, OffsetDateTime};

use crate::condition::Condition;

/// An ID in the database.
pub type InspectionId = i32;

/// A typed, storage-ready value for a single column.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Text(Option<String>),
    Date(Option<Date>),
    Integer(Option<i32>),
    BigInt(i64),
    Flag(bool),
    Condition(Condition),
    Timestamp(OffsetDateTime),
    Id(InspectionId),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(t) => t.as_deref(),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Value::Flag(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_condition(&self) -> Option<Condition> {
        match self {
            Value::Condition(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<Date> {
        match self {
            Value::Date(d) => *d,
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Value::Integer(i) => *i,
            _ => None,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Text(t) => t.serialize(serializer),
            Value::Date(d) => d.serialize(serializer),
            Value::Integer(i) => i.serialize(serializer),
            Value::BigInt(i) => i.serialize(serializer),
            Value::Flag(b) => b.serialize(serializer),
            Value::Condition(c) => c.serialize(serializer),
            Value::Timestamp(t) => serializer.serialize_i64(t.unix_timestamp()),
            Value::Id(id) => id.serialize(serializer),
        }
    }
}

/// Column values in table order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Fields(Vec<(String, Value)>);

impl Fields {
    pub fn new(fields: Vec<(String, Value)>) -> Self {
        Fields(fields)
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Value)> {
        self.0.iter()
    }
}

impl Serialize for Fields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;

        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }

        map.end()
    }
}

/// A single active inspection, with every stored column.
#[derive(Clone, Debug, Serialize)]
pub struct InspectionRecord {
    pub id: InspectionId,

    /// Set once, on insertion.
    #[serde(with = "time::serde::timestamp")]
    pub created_at: OffsetDateTime,

    pub active: bool,

    #[serde(flatten)]
    pub fields: Fields,

    /// Counts of the checklist conditions.
    pub tally: Tally,

    pub status: GroupStatuses,
}

impl InspectionRecord {
    pub fn new(id: InspectionId, created_at: OffsetDateTime, active: bool, fields: Fields) -> Self {
        let tally = Tally::from_conditions(fields.iter().filter_map(|(_, v)| v.as_condition()));
        let status = GroupStatuses::from_fields(&fields);

        InspectionRecord {
            id,
            created_at,
            active,
            fields,
            tally,
            status,
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }
}

/// How many checklist items were found in each condition.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Tally {
    pub total: u32,
    pub good: u32,
    pub bad: u32,
    pub not_applicable: u32,

    /// Share of good items, rounded to the nearest whole percent.
    pub percent_good: u32,
}

impl Tally {
    pub fn from_conditions(conditions: impl IntoIterator<Item = Condition>) -> Self {
        let mut tally = Tally::default();

        for condition in conditions {
            tally.total += 1;

            match condition {
                Condition::Good => tally.good += 1,
                Condition::Bad => tally.bad += 1,
                Condition::NotApplicable => tally.not_applicable += 1,
            }
        }

        if tally.total > 0 {
            tally.percent_good = (tally.good * 100 + tally.total / 2) / tally.total;
        }

        tally
    }
}

/// Whether a group of key checklist items can be signed off as is.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    /// Every item in the group was found good.
    Ok,
    NeedsReview,
}

impl GroupStatus {
    fn of(fields: &Fields, columns: &[&str]) -> Self {
        let all_good = columns
            .iter()
            .all(|c| fields.get(c).and_then(Value::as_condition) == Some(Condition::Good));

        if all_good {
            GroupStatus::Ok
        } else {
            GroupStatus::NeedsReview
        }
    }
}

const LEVEL_GROUP: &[&str] = &["level_coolant", "level_brake_fluid", "level_oil"];
const PEDAL_GROUP: &[&str] = &["pedal_accelerator", "pedal_brake"];
const LIGHT_GROUP: &[&str] = &["light_headlights", "light_turn_signals", "light_brake"];

/// Summary status of the fluid levels, pedals and main lights.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct GroupStatuses {
    pub levels: GroupStatus,
    pub pedals: GroupStatus,
    pub lights: GroupStatus,
}

impl GroupStatuses {
    pub fn from_fields(fields: &Fields) -> Self {
        GroupStatuses {
            levels: GroupStatus::of(fields, LEVEL_GROUP),
            pedals: GroupStatus::of(fields, PEDAL_GROUP),
            lights: GroupStatus::of(fields, LIGHT_GROUP),
        }
    }
}

/// A row of the inspection listing.
#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct InspectionSummary {
    pub id: InspectionId,
    pub inspection_date: Date,
    pub plate: String,
    pub other_plate: Option<String>,
    pub driver_name: String,
    pub vehicle_type: Option<String>,
    pub model: Option<String>,
    pub prepared_by: String,
    pub defect_front: bool,
    pub defect_rear: bool,
    pub defect_left_side: bool,
    pub defect_right_side: bool,
    #[serde(with = "time::serde::timestamp")]
    pub created_at: OffsetDateTime,
}

/// Defect counts over every active inspection, regardless of filters.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, sqlx::FromRow)]
pub struct ListingStats {
    pub total: i64,
    pub without_defects: i64,
    pub with_defects: i64,
}

/// What the gateway returns for a listing query.
#[derive(Clone, Debug, PartialEq)]
pub struct Listing {
    pub inspections: Vec<InspectionSummary>,

    /// Number of records matching the filters.
    pub total: i64,

    pub stats: ListingStats,
}

/// One page of the inspection listing.
#[derive(Clone, Debug, Serialize)]
pub struct ListingPage {
    pub inspections: Vec<InspectionSummary>,
    pub page: u32,
    pub page_size: u32,
    pub total: i64,
    pub pages: i64,
    pub stats: ListingStats,
}

impl ListingPage {
    pub fn new(listing: Listing, page: u32, page_size: u32) -> Self {
        let Listing {
            inspections,
            total,
            stats,
        } = listing;
        let size = i64::from(page_size.max(1));

        ListingPage {
            inspections,
            page,
            page_size,
            total,
            pages: (total + size - 1) / size,
            stats,
        }
    }
}

/// A row of the CSV export.
#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct ExportRow {
    pub id: InspectionId,
    pub inspection_date: Date,
    pub plate: String,
    pub driver_name: String,
    pub vehicle_type: Option<String>,
    pub model: Option<String>,
    pub driver_license: Option<String>,
    pub odometer: Option<i32>,
    pub prepared_by: String,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, sqlx::FromRow)]
pub struct DashboardTotals {
    pub total_inspections: i64,
    pub unique_vehicles: i64,
    pub unique_drivers: i64,
    pub first_inspection: Option<Date>,
    pub last_inspection: Option<Date>,
    pub average_odometer: Option<f64>,
    pub with_defects: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct MonthlyCount {
    /// Formatted as `YYYY-MM`.
    pub month: String,
    pub count: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct VehicleCount {
    pub plate: String,
    pub inspections: i64,
    pub model: Option<String>,
}

/// Aggregate figures over all active inspections.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Dashboard {
    pub totals: DashboardTotals,
    pub by_month: Vec<MonthlyCount>,
    pub top_vehicles: Vec<VehicleCount>,
}

/// What the database reports about itself.
#[derive(Clone, Debug, Serialize)]
pub struct DatabaseStatus {
    pub version: String,
    #[serde(with = "time::serde::timestamp")]
    pub server_time: OffsetDateTime,
}
