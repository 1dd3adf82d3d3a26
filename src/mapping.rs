//! Turns normalized records into positional statements.

use std::collections::BTreeSet;

use time::OffsetDateTime;

use crate::columns::{ACTIVE, COLUMNS, CREATED_AT, ID, TABLE};
use crate::errors::InspectionError;
use crate::inspection::{InspectionId, Value};
use crate::normalization::NormalizedRecord;

/// Which kind of write a [`Statement`] performs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Operation {
    Insert,
    Update(InspectionId),
}

/// A parameterized statement whose placeholder count has been checked
/// against its values. Only [`Statement::prepare`] builds one.
#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    operation: Operation,
    text: String,
    bindings: Vec<(String, Value)>,
}

impl Statement {
    /// Checks that `text` has exactly one placeholder per binding.
    pub fn prepare(
        operation: Operation,
        text: String,
        bindings: Vec<(String, Value)>,
    ) -> Result<Self, InspectionError> {
        check_arity(&text, bindings.len())?;

        Ok(Statement {
            operation,
            text,
            bindings,
        })
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The bound values, in placeholder order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.bindings.iter().map(|(_, value)| value)
    }

    /// The bound values paired with the column each one is written to.
    pub fn bindings(&self) -> &[(String, Value)] {
        &self.bindings
    }

    /// Fails unless this statement is an insertion.
    pub fn expect_insert(&self) -> Result<(), InspectionError> {
        match self.operation {
            Operation::Insert => Ok(()),
            operation => Err(InspectionError::Misdirected {
                operation,
                method: "insert",
            }),
        }
    }

    /// Returns the target of an update, failing for any other statement.
    pub fn expect_update(&self) -> Result<InspectionId, InspectionError> {
        match self.operation {
            Operation::Update(id) => Ok(id),
            operation => Err(InspectionError::Misdirected {
                operation,
                method: "update",
            }),
        }
    }

    /// Repeats the arity check; gateways call this before binding.
    pub fn verify(&self) -> Result<(), InspectionError> {
        check_arity(&self.text, self.bindings.len())
    }
}

/// Builds the insertion statement. The creation time is always `now`
/// and the record always starts active.
pub fn insertion(record: &NormalizedRecord, now: OffsetDateTime) -> Result<Statement, InspectionError> {
    let mut bindings = form_bindings(record);
    bindings.push((CREATED_AT.to_owned(), Value::Timestamp(now)));
    bindings.push((ACTIVE.to_owned(), Value::Flag(true)));

    let columns = bindings
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=bindings.len())
        .map(|n| format!("${}", n))
        .collect::<Vec<_>>()
        .join(", ");

    let text = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        TABLE, columns, placeholders, ID
    );

    Statement::prepare(Operation::Insert, text, bindings)
}

/// Builds the statement rewriting every form column of an active record.
/// `id`, `created_at` and `active` are never assigned.
pub fn update(record: &NormalizedRecord, id: InspectionId) -> Result<Statement, InspectionError> {
    let mut bindings = form_bindings(record);

    let assignments = bindings
        .iter()
        .enumerate()
        .map(|(i, (name, _))| format!("{} = ${}", name, i + 1))
        .collect::<Vec<_>>()
        .join(", ");

    bindings.push((ID.to_owned(), Value::Id(id)));

    let text = format!(
        "UPDATE {} SET {} WHERE {} = ${} AND {} = TRUE",
        TABLE,
        assignments,
        ID,
        bindings.len(),
        ACTIVE
    );

    Statement::prepare(Operation::Update(id), text, bindings)
}

fn form_bindings(record: &NormalizedRecord) -> Vec<(String, Value)> {
    COLUMNS
        .iter()
        .map(|column| (column.name.clone(), record.value_for(column)))
        .collect()
}

pub(crate) fn check_arity(text: &str, values: usize) -> Result<(), InspectionError> {
    let placeholders = count_placeholders(text);

    if placeholders == values {
        Ok(())
    } else {
        Err(InspectionError::Arity {
            placeholders,
            values,
        })
    }
}

/// Counts the distinct positional placeholders (`$1`, `$2`, …) in a
/// statement, ignoring anything inside single-quoted literals. A gap in
/// the numbering counts up to the highest placeholder, since the driver
/// will expect a value for every position.
pub fn count_placeholders(text: &str) -> usize {
    let mut seen = BTreeSet::new();
    let mut chars = text.chars().peekable();
    let mut in_literal = false;

    while let Some(c) = chars.next() {
        match c {
            '\'' => in_literal = !in_literal,
            '$' if !in_literal => {
                let mut digits = String::new();

                while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                    digits.push(*d);
                    chars.next();
                }

                if let Ok(n) = digits.parse::<usize>() {
                    seen.insert(n);
                }
            }
            _ => {}
        }
    }

    seen.iter().max().copied().unwrap_or(0).max(seen.len())
}
