//! The column table for the `inspections` relation.
//!
//! Every statement that writes a record, and every row decoded from the
//! database, walks [`COLUMNS`] in order. Adding a column means adding it
//! here and in a migration; nothing else repeats the list.

use lazy_static::lazy_static;

use crate::condition::Condition;
use crate::inspection::Value;

pub const TABLE: &str = "inspections";

/// Selector value meaning “the plate is in `other_plate`”.
pub const OTHER_PLATE_SENTINEL: &str = "OTHER";

/// How a column’s value is derived from the submitted form.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Policy {
    /// Free text that must be present.
    RequiredText,

    /// Free text; blank means null.
    OptionalText,

    /// A `YYYY-MM-DD` date that must be present.
    RequiredDate,

    /// A `YYYY-MM-DD` date; blank means null.
    OptionalDate,

    /// A whole number; blank means null.
    OptionalInteger,

    /// A checkbox, true only when submitted as `on`.
    Flag,

    /// A checklist item; blank means [`Condition::NotApplicable`].
    Condition,

    /// The plate selector, resolved against the alternate plate.
    Plate,

    /// The free-text plate used when the selector is the sentinel.
    AlternatePlate,
}

impl Policy {
    /// The value stored when nothing usable was submitted.
    pub fn default_value(self) -> Value {
        match self {
            Policy::RequiredText | Policy::OptionalText | Policy::Plate | Policy::AlternatePlate => {
                Value::Text(None)
            }
            Policy::RequiredDate | Policy::OptionalDate => Value::Date(None),
            Policy::OptionalInteger => Value::Integer(None),
            Policy::Flag => Value::Flag(false),
            Policy::Condition => Value::Condition(Condition::default()),
        }
    }

    pub fn is_required(self) -> bool {
        matches!(self, Policy::RequiredText | Policy::RequiredDate | Policy::Plate)
    }
}

/// A single writable column.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Column {
    pub name: String,
    pub policy: Policy,
}

impl Column {
    fn new(name: impl Into<String>, policy: Policy) -> Self {
        Column {
            name: name.into(),
            policy,
        }
    }
}

const VEHICLE: &[(&str, Policy)] = &[
    ("inspection_date", Policy::RequiredDate),
    ("plate", Policy::Plate),
    ("other_plate", Policy::AlternatePlate),
    ("driver_name", Policy::RequiredText),
    ("vehicle_type", Policy::OptionalText),
    ("model", Policy::OptionalText),
    ("card_number", Policy::OptionalText),
    ("driver_license", Policy::OptionalText),
    ("review_date", Policy::OptionalDate),
    ("insurance_expiry_date", Policy::OptionalDate),
    ("oil_change_date", Policy::OptionalDate),
    ("maintenance_date", Policy::OptionalDate),
    ("odometer", Policy::OptionalInteger),
];

const DEFECTS: &[(&str, Policy)] = &[
    ("defect_front", Policy::Flag),
    ("defect_rear", Policy::Flag),
    ("defect_left_side", Policy::Flag),
    ("defect_right_side", Policy::Flag),
    ("defect_roof", Policy::Flag),
    ("defect_interior", Policy::Flag),
    ("defect_engine", Policy::Flag),
    ("defect_chassis", Policy::Flag),
    ("defect_description", Policy::OptionalText),
];

/// Checklist groups as `(prefix, items)`. Each item becomes a condition
/// column `<prefix>_<item>` and an observation column `obs_<prefix>_<item>`.
const CHECKLIST: &[(&str, &[&str])] = &[
    (
        "level",
        &["coolant", "brake_fluid", "oil", "hydraulic", "water"],
    ),
    ("pedal", &["accelerator", "clutch", "brake"]),
    (
        "light",
        &[
            "headlights",
            "turn_signals",
            "parking",
            "brake",
            "dashboard",
            "reverse",
            "interior",
        ],
    ),
    (
        "equipment",
        &[
            "extinguisher",
            "extinguisher_date",
            "spare_tire",
            "lug_wrench",
            "warning_signs",
            "wheel_chocks",
            "tools",
            "flashlight",
            "jack",
            "first_aid_kit",
        ],
    ),
    (
        "misc",
        &[
            "tires",
            "battery",
            "rims",
            "seat_belts",
            "reverse_alarm",
            "horn",
            "parking_brake",
            "mirrors",
            "housing",
            "wipers",
            "upholstery",
            "windshield",
        ],
    ),
];

const SIGN_OFF: &[(&str, Policy)] = &[
    ("general_observations", Policy::OptionalText),
    ("prepared_by", Policy::RequiredText),
    ("driver_signature_name", Policy::OptionalText),
    ("driver_id_number", Policy::OptionalText),
    ("driver_acceptance", Policy::Flag),
    ("coordinator_signature_name", Policy::OptionalText),
    ("coordinator_id_number", Policy::OptionalText),
    ("coordinator_acceptance", Policy::Flag),
];

/// Written once on insertion, never by an update.
pub const CREATED_AT: &str = "created_at";

/// Always true on insertion; cleared only by a soft delete.
pub const ACTIVE: &str = "active";

pub const ID: &str = "id";

lazy_static! {
    /// Every column a submission writes, in statement order.
    pub static ref COLUMNS: Vec<Column> = build_columns();
}

fn build_columns() -> Vec<Column> {
    let mut columns = vec![];

    extend_fixed(&mut columns, VEHICLE);
    extend_fixed(&mut columns, DEFECTS);

    for (prefix, items) in CHECKLIST {
        columns.extend(
            items
                .iter()
                .map(|item| Column::new(format!("{}_{}", prefix, item), Policy::Condition)),
        );
        columns.extend(
            items
                .iter()
                .map(|item| Column::new(format!("obs_{}_{}", prefix, item), Policy::OptionalText)),
        );
    }

    extend_fixed(&mut columns, SIGN_OFF);

    columns
}

fn extend_fixed(columns: &mut Vec<Column>, group: &[(&str, Policy)]) {
    columns.extend(group.iter().map(|(name, policy)| Column::new(*name, *policy)));
}

/// Names of the checklist condition columns, in table order.
pub fn condition_columns() -> impl Iterator<Item = &'static Column> {
    COLUMNS.iter().filter(|c| c.policy == Policy::Condition)
}

/// Looks up a column by name.
pub fn find(name: &str) -> Option<&'static Column> {
    COLUMNS.iter().find(|c| c.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_expected_shape() {
        assert_eq!(COLUMNS.len(), 104);
        assert_eq!(condition_columns().count(), 37);
        assert_eq!(
            COLUMNS.iter().filter(|c| c.policy == Policy::Flag).count(),
            10
        );

        assert_eq!(COLUMNS[0].name, "inspection_date");
        assert_eq!(COLUMNS[22].name, "level_coolant");
        assert_eq!(COLUMNS[27].name, "obs_level_coolant");
        assert_eq!(COLUMNS.last().map(|c| c.name.as_str()), Some("coordinator_acceptance"));
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<_> = COLUMNS.iter().map(|c| c.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();

        assert_eq!(names.len(), COLUMNS.len());
    }

    #[test]
    fn metadata_is_not_writable_from_a_form() {
        for reserved in &[ID, CREATED_AT, ACTIVE] {
            assert!(find(reserved).is_none(), "{} must not be a form column", reserved);
        }
    }

    #[test]
    fn migration_declares_every_column_in_order() {
        let schema = include_str!("../migrations/2021-03-01-000000_create_inspections/up.sql");

        let mut position = 0;

        for column in COLUMNS.iter().map(|c| c.name.as_str()).chain(vec![CREATED_AT, ACTIVE]) {
            let needle = format!("\n    {} ", column);
            let found = schema[position..]
                .find(&needle)
                .unwrap_or_else(|| panic!("{} missing from migration or out of order", column));

            position += found + needle.len();
        }
    }
}
