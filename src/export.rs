//! CSV rendering of active inspections.

use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::inspection::ExportRow;
use crate::normalization::DATE_FORMAT;

pub const HEADER: &[&str] = &[
    "ID",
    "Date",
    "Plate",
    "Driver",
    "Vehicle Type",
    "Model",
    "License",
    "Odometer",
    "Prepared By",
    "Created At",
];

pub const CONTENT_TYPE: &str = "text/csv; charset=utf-8";

const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Renders the rows as CSV. Every field is quoted; absent values are
/// empty.
pub fn render(rows: &[ExportRow]) -> String {
    let mut output = String::new();

    push_line(&mut output, HEADER.iter().map(|h| h.to_string()));

    for row in rows {
        push_line(
            &mut output,
            vec![
                row.id.to_string(),
                format_date(row.inspection_date),
                row.plate.clone(),
                row.driver_name.clone(),
                row.vehicle_type.clone().unwrap_or_default(),
                row.model.clone().unwrap_or_default(),
                row.driver_license.clone().unwrap_or_default(),
                row.odometer.map(|o| o.to_string()).unwrap_or_default(),
                row.prepared_by.clone(),
                format_timestamp(row.created_at),
            ],
        );
    }

    output
}

/// The download name for an export generated on `today`.
pub fn filename(today: Date) -> String {
    format!("inspections-{}.csv", format_date(today))
}

fn push_line(output: &mut String, fields: impl IntoIterator<Item = String>) {
    let line = fields
        .into_iter()
        .map(|f| quote(&f))
        .collect::<Vec<_>>()
        .join(",");

    output.push_str(&line);
    output.push_str("\r\n");
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn format_date(date: Date) -> String {
    date.format(DATE_FORMAT).unwrap_or_default()
}

fn format_timestamp(timestamp: OffsetDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use time::macros::{date, datetime};

    use super::*;

    fn row() -> ExportRow {
        ExportRow {
            id: 7,
            inspection_date: date!(2021 - 03 - 15),
            plate: "ABC123".to_owned(),
            driver_name: "Juan \"Pepe\" Perez".to_owned(),
            vehicle_type: Some("Truck, heavy".to_owned()),
            model: None,
            driver_license: None,
            odometer: Some(120_500),
            prepared_by: "Maria Gomez".to_owned(),
            created_at: datetime!(2021-03-15 08:30:05 UTC),
        }
    }

    #[test]
    fn header_comes_first() {
        let csv = render(&[]);

        assert_eq!(
            csv,
            "\"ID\",\"Date\",\"Plate\",\"Driver\",\"Vehicle Type\",\"Model\",\"License\",\"Odometer\",\"Prepared By\",\"Created At\"\r\n"
        );
    }

    #[test]
    fn fields_are_quoted_and_escaped() {
        let csv = render(&[row()]);
        let line = csv.lines().nth(1).unwrap();

        assert_eq!(
            line,
            "\"7\",\"2021-03-15\",\"ABC123\",\"Juan \"\"Pepe\"\" Perez\",\"Truck, heavy\",\"\",\"\",\"120500\",\"Maria Gomez\",\"2021-03-15 08:30:05\""
        );
    }

    #[test]
    fn filename_carries_the_date() {
        assert_eq!(filename(date!(2021 - 12 - 01)), "inspections-2021-12-01.csv");
    }
}
