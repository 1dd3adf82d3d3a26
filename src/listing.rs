//! Builds the filtered, paginated listing queries.

use time::Date;

use crate::columns::{ACTIVE, CREATED_AT, ID, TABLE};
use crate::errors::{FieldError, InspectionError};
use crate::inspection::Value;
use crate::mapping::check_arity;
use crate::normalization::{is_blank, parse_date};

/// Columns returned for each row of the listing.
pub const SUMMARY_COLUMNS: &[&str] = &[
    "id",
    "inspection_date",
    "plate",
    "other_plate",
    "driver_name",
    "vehicle_type",
    "model",
    "prepared_by",
    "defect_front",
    "defect_rear",
    "defect_left_side",
    "defect_right_side",
    "created_at",
];

/// Optional listing criteria. Blank criteria are dropped when parsed.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ListingFilter {
    pub plate: Option<String>,
    pub driver: Option<String>,
    pub date_from: Option<Date>,
    pub date_to: Option<Date>,
}

impl ListingFilter {
    pub fn parse(
        plate: Option<&str>,
        driver: Option<&str>,
        date_from: Option<&str>,
        date_to: Option<&str>,
    ) -> Result<Self, InspectionError> {
        let text = |s: Option<&str>| s.filter(|s| !is_blank(s)).map(|s| s.trim().to_owned());

        let mut errors = vec![];
        let mut date = |field: &str, s: Option<&str>| match s.filter(|s| !is_blank(s)) {
            Some(s) => parse_date(field, s).map_err(|e| errors.push(e)).ok(),
            None => None,
        };

        let date_from = date("date_from", date_from);
        let date_to = date("date_to", date_to);

        if !errors.is_empty() {
            return Err(InspectionError::Validation(errors));
        }

        Ok(ListingFilter {
            plate: text(plate),
            driver: text(driver),
            date_from,
            date_to,
        })
    }

    /// Applies the same predicates as the generated SQL to one record.
    pub fn matches(&self, plate: &str, other_plate: Option<&str>, driver: &str, date: Date) -> bool {
        let contains = |haystack: &str, needle: &str| {
            haystack.to_lowercase().contains(&needle.to_lowercase())
        };

        let plate_matches = self.plate.as_deref().map_or(true, |p| {
            contains(plate, p) || other_plate.map_or(false, |o| contains(o, p))
        });
        let driver_matches = self.driver.as_deref().map_or(true, |d| contains(driver, d));
        let from_matches = self.date_from.map_or(true, |from| date >= from);
        let to_matches = self.date_to.map_or(true, |to| date <= to);

        plate_matches && driver_matches && from_matches && to_matches
    }
}

/// A validated page request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Pagination {
    page: u32,
    page_size: u32,
}

impl Pagination {
    pub fn new(page: u32, page_size: u32) -> Result<Self, InspectionError> {
        if page == 0 {
            return Err(InspectionError::field(FieldError::malformed(
                "page",
                page.to_string(),
                "a whole number of at least 1",
            )));
        }

        if page_size == 0 {
            return Err(InspectionError::field(FieldError::malformed(
                "page_size",
                page_size.to_string(),
                "a whole number of at least 1",
            )));
        }

        Ok(Pagination { page, page_size })
    }

    /// Parses a page number from a query string. Absent or blank means
    /// the first page; anything other than plain digits is refused.
    pub fn parse(page: Option<&str>, page_size: u32) -> Result<Self, InspectionError> {
        let page = match page.map(str::trim).filter(|s| !s.is_empty()) {
            None => 1,
            Some(s) if s.chars().all(|c| c.is_ascii_digit()) => s.parse::<u32>().map_err(|_| {
                InspectionError::field(FieldError::malformed("page", s, "a whole number of at least 1"))
            })?,
            Some(s) => {
                return Err(InspectionError::field(FieldError::malformed(
                    "page",
                    s,
                    "a whole number of at least 1",
                )))
            }
        };

        Pagination::new(page, page_size)
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }
}

/// A listing query and its matching count query. Both share the same
/// predicates and parameters; the page query adds ordering and the two
/// pagination parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct ListingQuery {
    filter: ListingFilter,
    pagination: Pagination,
    predicates: Vec<String>,
    params: Vec<Value>,
    count_text: String,
    page_text: String,
}

impl ListingQuery {
    pub fn build(filter: ListingFilter, pagination: Pagination) -> Result<Self, InspectionError> {
        let mut predicates = vec![format!("{} = TRUE", ACTIVE)];
        let mut params = vec![];

        if let Some(plate) = &filter.plate {
            params.push(Value::Text(Some(contains_pattern(plate))));
            let n = params.len();
            predicates.push(format!("(plate ILIKE ${} OR other_plate ILIKE ${})", n, n));
        }

        if let Some(driver) = &filter.driver {
            params.push(Value::Text(Some(contains_pattern(driver))));
            predicates.push(format!("driver_name ILIKE ${}", params.len()));
        }

        if let Some(from) = filter.date_from {
            params.push(Value::Date(Some(from)));
            predicates.push(format!("inspection_date >= ${}", params.len()));
        }

        if let Some(to) = filter.date_to {
            params.push(Value::Date(Some(to)));
            predicates.push(format!("inspection_date <= ${}", params.len()));
        }

        let where_clause = predicates.join(" AND ");

        let count_text = format!("SELECT COUNT(*) FROM {} WHERE {}", TABLE, where_clause);
        let page_text = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY {} DESC, {} DESC LIMIT ${} OFFSET ${}",
            SUMMARY_COLUMNS.join(", "),
            TABLE,
            where_clause,
            CREATED_AT,
            ID,
            params.len() + 1,
            params.len() + 2
        );

        let query = ListingQuery {
            filter,
            pagination,
            predicates,
            params,
            count_text,
            page_text,
        };

        query.verify()?;

        Ok(query)
    }

    pub fn verify(&self) -> Result<(), InspectionError> {
        check_arity(&self.count_text, self.params.len())?;
        check_arity(&self.page_text, self.params.len() + 2)
    }

    pub fn filter(&self) -> &ListingFilter {
        &self.filter
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    pub fn predicates(&self) -> &[String] {
        &self.predicates
    }

    pub fn count_text(&self) -> &str {
        &self.count_text
    }

    pub fn page_text(&self) -> &str {
        &self.page_text
    }

    /// Parameters shared by both queries.
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Parameters for the page query: the shared ones, then limit and offset.
    pub fn page_params(&self) -> Vec<Value> {
        let mut params = self.params.clone();
        params.push(Value::BigInt(self.pagination.limit()));
        params.push(Value::BigInt(self.pagination.offset()));
        params
    }
}

/// Wraps `s` for a substring `ILIKE`, escaping the pattern characters.
fn contains_pattern(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len() + 2);
    escaped.push('%');

    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }

    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    fn where_clause(text: &str) -> &str {
        let start = text.find(" WHERE ").expect("find WHERE") + " WHERE ".len();
        let rest = &text[start..];
        let end = rest.find(" ORDER BY ").unwrap_or_else(|| rest.len());

        &rest[..end]
    }

    #[test]
    fn count_and_page_share_predicates() {
        let filter = ListingFilter::parse(Some("ABC"), None, None, None).unwrap();
        let query = ListingQuery::build(filter, Pagination::new(1, 10).unwrap()).unwrap();

        assert_eq!(where_clause(query.count_text()), where_clause(query.page_text()));
        assert_eq!(
            query.predicates(),
            &["active = TRUE".to_owned(), "(plate ILIKE $1 OR other_plate ILIKE $1)".to_owned()]
        );
        assert_eq!(query.params(), &[Value::Text(Some("%ABC%".to_owned()))]);
        assert_eq!(
            query.page_params(),
            vec![
                Value::Text(Some("%ABC%".to_owned())),
                Value::BigInt(10),
                Value::BigInt(0)
            ]
        );
    }

    #[test]
    fn blank_filters_are_omitted() {
        let filter = ListingFilter::parse(Some("  "), Some(""), None, Some(" ")).unwrap();
        assert_eq!(filter, ListingFilter::default());

        let query = ListingQuery::build(filter, Pagination::new(3, 10).unwrap()).unwrap();

        assert_eq!(query.predicates(), &["active = TRUE".to_owned()]);
        assert!(query.params().is_empty());
        assert!(query.page_text().ends_with("LIMIT $1 OFFSET $2"));
        assert_eq!(query.page_params(), vec![Value::BigInt(10), Value::BigInt(20)]);
    }

    #[test]
    fn every_filter_is_conjunctive() {
        let filter = ListingFilter::parse(
            Some("abc"),
            Some("perez"),
            Some("2021-01-01"),
            Some("2021-12-31"),
        )
        .unwrap();
        let query = ListingQuery::build(filter, Pagination::new(1, 25).unwrap()).unwrap();

        assert_eq!(
            where_clause(query.count_text()),
            "active = TRUE AND (plate ILIKE $1 OR other_plate ILIKE $1) AND driver_name ILIKE $2 \
             AND inspection_date >= $3 AND inspection_date <= $4"
        );
        assert!(query.page_text().ends_with("LIMIT $5 OFFSET $6"));
        assert_eq!(query.params()[2], Value::Date(Some(date!(2021 - 01 - 01))));
    }

    #[test]
    fn pattern_characters_are_escaped() {
        assert_eq!(contains_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn malformed_dates_are_rejected() {
        match ListingFilter::parse(None, None, Some("yesterday"), Some("2021-13-01")) {
            Err(InspectionError::Validation(errors)) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field()).collect();
                assert_eq!(fields, vec!["date_from", "date_to"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn page_numbers_are_strict() {
        assert_eq!(Pagination::parse(None, 10).unwrap().page(), 1);
        assert_eq!(Pagination::parse(Some(""), 10).unwrap().page(), 1);
        assert_eq!(Pagination::parse(Some("4"), 10).unwrap().offset(), 30);

        for bad in &["0", "-1", "+2", "2 OR 1=1", "1.5", "99999999999"] {
            assert!(Pagination::parse(Some(bad), 10).is_err(), "{:?} must be refused", bad);
        }

        assert!(Pagination::new(1, 0).is_err());
    }

    #[test]
    fn in_memory_matching_follows_predicates() {
        let filter = ListingFilter::parse(Some("bc1"), Some("JUAN"), Some("2021-03-01"), None).unwrap();

        assert!(filter.matches("ABC123", None, "Juan Perez", date!(2021 - 03 - 15)));
        assert!(filter.matches("OTHER", Some("xabc1"), "juan", date!(2021 - 03 - 01)));
        assert!(!filter.matches("ABC123", None, "Pedro", date!(2021 - 03 - 15)));
        assert!(!filter.matches("ABC123", None, "Juan", date!(2021 - 02 - 28)));
    }
}
