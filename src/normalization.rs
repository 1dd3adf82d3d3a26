use std::collections::HashMap;

use time::format_description::FormatItem;
use time::macros::format_description;
use time::Date;

use crate::columns::{self, Column, Policy, COLUMNS, OTHER_PLATE_SENTINEL};
use crate::errors::{FieldError, InspectionError};
use crate::inspection::{Tally, Value};

/// A form submission exactly as posted: field name to raw string.
pub type RawSubmission = HashMap<String, String>;

/// The marker browsers send for a ticked checkbox.
pub const CHECKBOX_ON: &str = "on";

pub const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Typed values for every column of the table, keyed by column name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NormalizedRecord {
    values: HashMap<String, Value>,
}

impl NormalizedRecord {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Returns the normalized value for `column`, falling back to the
    /// column’s default if it was never set.
    pub fn value_for(&self, column: &Column) -> Value {
        self.values
            .get(&column.name)
            .cloned()
            .unwrap_or_else(|| column.policy.default_value())
    }

    pub(crate) fn set(&mut self, column: impl Into<String>, value: Value) {
        self.values.insert(column.into(), value);
    }

    /// Counts the checklist conditions about to be stored.
    pub fn tally(&self) -> Tally {
        Tally::from_conditions(self.values.values().filter_map(Value::as_condition))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Converts a raw submission into storage-ready values, applying each
/// column’s default policy. Every problem found is reported at once.
pub fn normalize(raw: &RawSubmission) -> Result<NormalizedRecord, InspectionError> {
    let mut record = NormalizedRecord::default();
    let mut errors = vec![];

    match resolve_plate(raw) {
        Ok((plate, other_plate)) => {
            record.set("plate", Value::Text(Some(plate)));
            record.set("other_plate", Value::Text(other_plate));
        }
        Err(e) => errors.push(e),
    }

    for column in COLUMNS.iter() {
        let submitted = raw.get(&column.name).map(String::as_str);

        match normalize_field(column, submitted) {
            Ok(Some(value)) => record.set(column.name.clone(), value),
            Ok(None) => {}
            Err(e) => errors.push(e),
        }
    }

    if errors.is_empty() {
        Ok(record)
    } else {
        Err(InspectionError::Validation(errors))
    }
}

/// Normalizes a single column. Returns `None` for the plate columns,
/// which depend on each other and are resolved separately.
fn normalize_field(column: &Column, submitted: Option<&str>) -> Result<Option<Value>, FieldError> {
    let name = column.name.as_str();
    let present = submitted.filter(|s| !is_blank(s));

    let value = match (column.policy, present) {
        (Policy::Plate, _) | (Policy::AlternatePlate, _) => return Ok(None),

        (Policy::Flag, _) => Value::Flag(submitted == Some(CHECKBOX_ON)),

        (policy, None) if policy.is_required() => return Err(FieldError::missing(name)),
        (policy, None) => policy.default_value(),

        (Policy::RequiredText, Some(s)) | (Policy::OptionalText, Some(s)) => {
            Value::Text(Some(s.to_owned()))
        }
        (Policy::RequiredDate, Some(s)) | (Policy::OptionalDate, Some(s)) => {
            Value::Date(Some(parse_date(name, s)?))
        }
        (Policy::OptionalInteger, Some(s)) => Value::Integer(Some(parse_count(name, s)?)),
        (Policy::Condition, Some(s)) => Value::Condition(
            s.parse()
                .map_err(|_| FieldError::malformed(name, s, "one of GOOD, BAD or NOT_APPLICABLE"))?,
        ),
    };

    Ok(Some(value))
}

/// Resolves the plate selector against the free-text alternate plate,
/// returning `(plate, other_plate)`.
fn resolve_plate(raw: &RawSubmission) -> Result<(String, Option<String>), FieldError> {
    let selector = raw
        .get("plate")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty());

    match selector {
        Some(OTHER_PLATE_SENTINEL) => {
            let other = raw
                .get("other_plate")
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| FieldError::missing("other_plate"))?
                .to_uppercase();

            Ok((other.clone(), Some(other)))
        }
        Some(plate) => Ok((plate.to_owned(), None)),
        None => Err(FieldError::missing("plate")),
    }
}

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(field: &str, s: &str) -> Result<Date, FieldError> {
    Date::parse(s.trim(), DATE_FORMAT)
        .map_err(|_| FieldError::malformed(field, s, "a date formatted as YYYY-MM-DD"))
}

fn parse_count(field: &str, s: &str) -> Result<i32, FieldError> {
    s.trim()
        .parse::<i32>()
        .ok()
        .filter(|n| *n >= 0)
        .ok_or_else(|| FieldError::malformed(field, s, "a non-negative whole number"))
}

pub(crate) fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// Returns true if `name` is a column a form may write.
pub fn is_form_field(name: &str) -> bool {
    columns::find(name).is_some()
}

#[cfg(test)]
pub(crate) mod tests {
    use time::macros::date;

    use super::*;
    use crate::condition::Condition;
    use crate::errors::FieldError;

    /// The smallest submission that passes validation.
    pub(crate) fn minimal_submission() -> RawSubmission {
        vec![
            ("inspection_date", "2021-03-15"),
            ("plate", "ABC123"),
            ("driver_name", "Juan Perez"),
            ("prepared_by", "Maria Gomez"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect()
    }

    fn field_errors(result: Result<NormalizedRecord, InspectionError>) -> Vec<FieldError> {
        match result {
            Err(InspectionError::Validation(errors)) => errors,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn minimal_submission_fills_every_column() {
        let record = normalize(&minimal_submission()).expect("normalize minimal submission");

        assert_eq!(record.len(), COLUMNS.len());
        assert_eq!(record.get("inspection_date"), Some(&Value::Date(Some(date!(2021 - 03 - 15)))));
        assert_eq!(record.get("plate"), Some(&Value::Text(Some("ABC123".to_owned()))));
        assert_eq!(record.get("other_plate"), Some(&Value::Text(None)));
        assert_eq!(record.get("odometer"), Some(&Value::Integer(None)));
        assert_eq!(record.get("defect_description"), Some(&Value::Text(None)));
    }

    #[test]
    fn unset_checklist_items_are_not_applicable() {
        let record = normalize(&minimal_submission()).unwrap();

        for column in columns::condition_columns() {
            assert_eq!(
                record.get(&column.name),
                Some(&Value::Condition(Condition::NotApplicable)),
                "{}",
                column.name
            );
        }
    }

    #[test]
    fn checklist_items_keep_submitted_condition() {
        let mut raw = minimal_submission();
        raw.insert("level_oil".to_owned(), "BAD".to_owned());
        raw.insert("light_brake".to_owned(), "GOOD".to_owned());
        raw.insert("pedal_clutch".to_owned(), "".to_owned());

        let record = normalize(&raw).unwrap();

        assert_eq!(record.get("level_oil"), Some(&Value::Condition(Condition::Bad)));
        assert_eq!(record.get("light_brake"), Some(&Value::Condition(Condition::Good)));
        assert_eq!(
            record.get("pedal_clutch"),
            Some(&Value::Condition(Condition::NotApplicable))
        );
    }

    #[test]
    fn tally_counts_stored_conditions() {
        let mut raw = minimal_submission();
        raw.insert("level_oil".to_owned(), "BAD".to_owned());
        raw.insert("light_brake".to_owned(), "GOOD".to_owned());
        raw.insert("misc_horn".to_owned(), "GOOD".to_owned());

        let tally = normalize(&raw).unwrap().tally();

        assert_eq!(tally.total, columns::condition_columns().count() as u32);
        assert_eq!(tally.good, 2);
        assert_eq!(tally.bad, 1);
        assert_eq!(tally.not_applicable, tally.total - 3);
    }

    #[test]
    fn unknown_conditions_are_rejected() {
        let mut raw = minimal_submission();
        raw.insert("misc_horn".to_owned(), "BUENO".to_owned());

        assert_eq!(
            field_errors(normalize(&raw)),
            vec![FieldError::malformed(
                "misc_horn",
                "BUENO",
                "one of GOOD, BAD or NOT_APPLICABLE"
            )]
        );
    }

    #[test]
    fn checkboxes_need_the_on_marker() {
        let mut raw = minimal_submission();
        raw.insert("defect_front".to_owned(), "on".to_owned());
        raw.insert("defect_rear".to_owned(), "true".to_owned());
        raw.insert("driver_acceptance".to_owned(), "on".to_owned());

        let record = normalize(&raw).unwrap();

        assert_eq!(record.get("defect_front"), Some(&Value::Flag(true)));
        assert_eq!(record.get("defect_rear"), Some(&Value::Flag(false)));
        assert_eq!(record.get("defect_roof"), Some(&Value::Flag(false)));
        assert_eq!(record.get("driver_acceptance"), Some(&Value::Flag(true)));
        assert_eq!(record.get("coordinator_acceptance"), Some(&Value::Flag(false)));
    }

    #[test]
    fn other_plate_sentinel_uses_free_text() {
        let mut raw = minimal_submission();
        raw.insert("plate".to_owned(), "OTHER".to_owned());
        raw.insert("other_plate".to_owned(), "abc123".to_owned());

        let record = normalize(&raw).unwrap();

        assert_eq!(record.get("plate"), Some(&Value::Text(Some("ABC123".to_owned()))));
        assert_eq!(record.get("other_plate"), Some(&Value::Text(Some("ABC123".to_owned()))));
    }

    #[test]
    fn padded_sentinel_still_selects_free_text() {
        let mut raw = minimal_submission();
        raw.insert("plate".to_owned(), " OTHER ".to_owned());
        raw.insert("other_plate".to_owned(), "xyz789".to_owned());

        let record = normalize(&raw).unwrap();

        assert_eq!(record.get("plate"), Some(&Value::Text(Some("XYZ789".to_owned()))));
        assert_eq!(record.get("other_plate"), Some(&Value::Text(Some("XYZ789".to_owned()))));
    }

    #[test]
    fn other_plate_is_dropped_without_sentinel() {
        let mut raw = minimal_submission();
        raw.insert("other_plate".to_owned(), "XYZ789".to_owned());

        let record = normalize(&raw).unwrap();

        assert_eq!(record.get("plate"), Some(&Value::Text(Some("ABC123".to_owned()))));
        assert_eq!(record.get("other_plate"), Some(&Value::Text(None)));
    }

    #[test]
    fn sentinel_without_free_text_is_missing() {
        let mut raw = minimal_submission();
        raw.insert("plate".to_owned(), "OTHER".to_owned());
        raw.insert("other_plate".to_owned(), "  ".to_owned());

        assert_eq!(
            field_errors(normalize(&raw)),
            vec![FieldError::missing("other_plate")]
        );
    }

    #[test]
    fn missing_required_fields_are_all_reported() {
        let mut raw = minimal_submission();
        raw.remove("plate");
        raw.remove("driver_name");
        raw.insert("prepared_by".to_owned(), "   ".to_owned());

        let fields: Vec<String> = field_errors(normalize(&raw))
            .iter()
            .map(|e| e.field().to_owned())
            .collect();

        assert_eq!(fields, vec!["plate", "driver_name", "prepared_by"]);
    }

    #[test]
    fn malformed_dates_and_numbers_are_rejected() {
        let mut raw = minimal_submission();
        raw.insert("review_date".to_owned(), "15/03/2021".to_owned());
        raw.insert("odometer".to_owned(), "-5".to_owned());

        let fields: Vec<String> = field_errors(normalize(&raw))
            .iter()
            .map(|e| e.field().to_owned())
            .collect();

        assert_eq!(fields, vec!["review_date", "odometer"]);
    }

    #[test]
    fn optional_values_are_kept_verbatim() {
        let mut raw = minimal_submission();
        raw.insert("odometer".to_owned(), " 120500 ".to_owned());
        raw.insert("obs_level_oil".to_owned(), " low, top up ".to_owned());

        let record = normalize(&raw).unwrap();

        assert_eq!(record.get("odometer"), Some(&Value::Integer(Some(120_500))));
        assert_eq!(
            record.get("obs_level_oil"),
            Some(&Value::Text(Some(" low, top up ".to_owned())))
        );
    }

    #[test]
    fn metadata_in_submission_is_ignored() {
        let mut raw = minimal_submission();
        raw.insert("id".to_owned(), "99".to_owned());
        raw.insert("created_at".to_owned(), "1999-01-01".to_owned());
        raw.insert("active".to_owned(), "0".to_owned());

        let record = normalize(&raw).unwrap();

        assert!(record.get("id").is_none());
        assert!(record.get("created_at").is_none());
        assert!(record.get("active").is_none());
        assert!(!is_form_field("created_at"));
    }
}
