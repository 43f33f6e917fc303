//! Parameterized predicates.
//!
//! A [`Condition`] names columns and carries values separately, so a
//! backend can bind every value as a parameter. Column names are resolved
//! against [`Resource::COLUMNS`] before any SQL is built.

use std::cmp::Ordering;

use serde_json::Value as JsonValue;
use sqlx::{Postgres, QueryBuilder};

use super::{Resource, StoreResult};

/// A bound parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Text(String),
}

impl Value {
    /// Whether a stored JSON field holds this value.
    fn matches_json(&self, field: &JsonValue) -> bool {
        match self {
            Self::Int(i) => field.as_i64() == Some(*i),
            Self::Text(s) => field.as_str() == Some(s.as_str()),
        }
    }

    fn push_bind(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Self::Int(i) => qb.push_bind(*i),
            Self::Text(s) => qb.push_bind(s.clone()),
        };
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Predicate over one resource's columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `column = value`
    Eq { column: String, value: Value },
    /// `column IN (values...)`; false when `values` is empty.
    In { column: String, values: Vec<Value> },
    /// `NOT (condition)`
    Not(Box<Condition>),
    /// Conjunction; true when empty.
    And(Vec<Condition>),
}

impl Condition {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn is_in<V, I>(column: impl Into<String>, values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Self::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Matches every row.
    pub const fn always() -> Self {
        Self::And(Vec::new())
    }

    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match self {
            Self::And(mut all) => {
                all.push(other);
                Self::And(all)
            }
            first => Self::And(vec![first, other]),
        }
    }

    /// Fail on the first column `T` does not declare.
    pub fn check_columns<T: Resource>(&self) -> StoreResult<()> {
        match self {
            Self::Eq { column, .. } | Self::In { column, .. } => T::column(column).map(|_| ()),
            Self::Not(inner) => inner.check_columns::<T>(),
            Self::And(all) => all.iter().try_for_each(|c| c.check_columns::<T>()),
        }
    }

    /// Evaluate against a row held as a JSON object.
    pub fn matches(&self, row: &JsonValue) -> bool {
        match self {
            Self::Eq { column, value } => row.get(column).is_some_and(|f| value.matches_json(f)),
            Self::In { column, values } => row
                .get(column)
                .is_some_and(|f| values.iter().any(|v| v.matches_json(f))),
            Self::Not(inner) => !inner.matches(row),
            Self::And(all) => all.iter().all(|c| c.matches(row)),
        }
    }

    /// Append this predicate as SQL, binding every value.
    ///
    /// Columns must have been checked with [`Self::check_columns`].
    pub fn push_sql<T: Resource>(&self, qb: &mut QueryBuilder<'_, Postgres>) -> StoreResult<()> {
        match self {
            Self::Eq { column, value } => {
                qb.push(T::column(column)?).push(" = ");
                value.push_bind(qb);
            }
            Self::In { column, values } => {
                if values.is_empty() {
                    qb.push("FALSE");
                    return Ok(());
                }
                qb.push(T::column(column)?).push(" IN (");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        qb.push(", ");
                    }
                    value.push_bind(qb);
                }
                qb.push(")");
            }
            Self::Not(inner) => {
                qb.push("NOT (");
                inner.push_sql::<T>(qb)?;
                qb.push(")");
            }
            Self::And(all) => {
                if all.is_empty() {
                    qb.push("TRUE");
                    return Ok(());
                }
                qb.push("(");
                for (i, c) in all.iter().enumerate() {
                    if i > 0 {
                        qb.push(" AND ");
                    }
                    c.push_sql::<T>(qb)?;
                }
                qb.push(")");
            }
        }
        Ok(())
    }
}

/// Ordering of two stored JSON fields for `ORDER BY` emulation.
///
/// RFC 3339 timestamps are compared as instants, not as text.
pub(crate) fn compare_json(a: &JsonValue, b: &JsonValue) -> Ordering {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (JsonValue::String(x), JsonValue::String(y)) => {
            match (
                chrono::DateTime::parse_from_rfc3339(x),
                chrono::DateTime::parse_from_rfc3339(y),
            ) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        (JsonValue::Null, JsonValue::Null) => Ordering::Equal,
        (JsonValue::Null, _) => Ordering::Less,
        (_, JsonValue::Null) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}
