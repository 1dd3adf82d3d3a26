use serde::Deserialize;

/// Listing criteria as they arrive in the query string. Everything is
/// kept as text so that validation can report malformed values itself.
#[derive(Debug, Default, Deserialize)]
pub struct ListingParams {
    pub plate: Option<String>,
    pub driver: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub page: Option<String>,
}
