use serde::Serialize;
use warp::reject;

use crate::errors::{FieldError, InspectionError};

#[derive(Debug)]
pub struct Rejection {
    pub(crate) context: Context,
    pub(crate) error: InspectionError,
}

impl Rejection {
    pub fn new(context: Context, error: InspectionError) -> Self {
        Rejection { context, error }
    }

    pub fn flatten(&self) -> FlattenedRejection {
        let fields = match &self.error {
            InspectionError::Validation(errors) => errors.iter().map(FieldReport::from).collect(),
            _ => vec![],
        };

        FlattenedRejection {
            context: self.context.clone(),
            message: format!("{}", self.error),
            fields,
        }
    }
}

impl reject::Reject for Rejection {}

#[derive(Debug, Serialize)]
pub struct FlattenedRejection {
    #[serde(flatten)]
    pub(crate) context: Context,
    pub(crate) message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) fields: Vec<FieldReport>,
}

/// One invalid field, as reported to the client.
#[derive(Debug, Serialize)]
pub struct FieldReport {
    pub(crate) field: String,
    pub(crate) message: String,
}

impl From<&FieldError> for FieldReport {
    fn from(error: &FieldError) -> Self {
        FieldReport {
            field: error.field().to_owned(),
            message: error.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Context {
    Create,
    Dashboard,
    Delete { id: String },
    Edit { id: String },
    Export,
    List,
    Retrieve { id: String },
    Status,
}

impl Context {
    pub fn create() -> Context {
        Context::Create
    }

    pub fn dashboard() -> Context {
        Context::Dashboard
    }

    pub fn delete(id: String) -> Context {
        Context::Delete { id }
    }

    pub fn edit(id: String) -> Context {
        Context::Edit { id }
    }

    pub fn export() -> Context {
        Context::Export
    }

    pub fn list() -> Context {
        Context::List
    }

    pub fn retrieve(id: String) -> Context {
        Context::Retrieve { id }
    }

    pub fn status() -> Context {
        Context::Status
    }
}
