use url::Url;

use crate::inspection::InspectionId;

/// Convenience wrapper for URL generation functions.
#[derive(Clone, Debug)]
pub struct Urls {
    /// Top-level URL, including trailing slash.
    base: Url,

    /// Path for all inspection-related actions.
    pub(crate) inspections_path: String,

    /// Prefix for all inspection-related actions.
    inspections_prefix: String,
}

impl Urls {
    /// Create a new instance. `inspections_path` should *not* include a
    /// leading or trailing slash.
    pub fn new(base: impl AsRef<str>, inspections_path: impl Into<String>) -> Result<Self, url::ParseError> {
        let base = Url::parse(base.as_ref())?;
        let inspections_path = inspections_path.into();
        let inspections_prefix = format!("{}/", inspections_path);

        // make sure every later join succeeds
        base.join(&inspections_prefix)?;

        Ok(Urls {
            base,
            inspections_path,
            inspections_prefix,
        })
    }

    pub fn inspections(&self) -> Url {
        self.base
            .join(&self.inspections_prefix)
            .expect("get inspections URL")
    }

    pub fn inspection(&self, id: InspectionId) -> Url {
        self.inspections()
            .join(&format!("id/{}", id))
            .unwrap_or_else(|_| panic!("get URL for inspection {}", id))
    }
}
