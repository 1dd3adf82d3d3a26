use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The inspected state of a single checklist item.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Condition {
    Good,
    Bad,
    NotApplicable,
}

impl Condition {
    pub const ALL: [Condition; 3] = [Condition::Good, Condition::Bad, Condition::NotApplicable];

    pub fn as_str(self) -> &'static str {
        match self {
            Condition::Good => "GOOD",
            Condition::Bad => "BAD",
            Condition::NotApplicable => "NOT_APPLICABLE",
        }
    }
}

impl Default for Condition {
    fn default() -> Self {
        Condition::NotApplicable
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string isn’t one of the three condition symbols.
#[derive(Debug, Eq, Error, PartialEq)]
#[error("unknown checklist condition {0:?}")]
pub struct UnknownCondition(pub String);

impl FromStr for Condition {
    type Err = UnknownCondition;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Condition::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCondition(s.to_owned()))
    }
}
