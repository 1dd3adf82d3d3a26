use serde::Serialize;

use crate::inspection::{InspectionId, Tally};

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SuccessResponse<'a> {
    Created {
        id: InspectionId,
        tally: Tally,
    },
    Healthz {
        revision: Option<&'a str>,
        timestamp: Option<&'a str>,
        version: &'a str,
        form: &'a str,
    },
    Updated {
        id: InspectionId,
        updated: u64,
    },
}
