//! Bind parameters for the statements produced by the builder.

use serde_json::Value;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::{Query, QueryScalar};

use super::QueryBuf;
use crate::kwargs::criterion_text;

/// A value bound to a statement: comparison text, or a whole JSON document.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlParam {
    Text(Option<String>),
    Json(Value),
}

impl SqlParam {
    pub fn text(s: impl Into<String>) -> Self {
        SqlParam::Text(Some(s.into()))
    }

    /// Criterion value in the text form stored values are compared with.
    pub fn criterion(v: &Value) -> Self {
        SqlParam::Text(criterion_text(v))
    }
}

impl QueryBuf {
    /// Statement returning one JSON row per match.
    pub fn fetch_rows(&self) -> QueryScalar<'_, Postgres, Value, PgArguments> {
        let mut query = sqlx::query_scalar::<Postgres, Value>(&self.sql);
        for p in &self.params {
            query = match p {
                SqlParam::Text(t) => query.bind(t.clone()),
                SqlParam::Json(v) => query.bind(v.clone()),
            };
        }
        query
    }

    /// Statement executed for its effect only.
    pub fn execute(&self) -> Query<'_, Postgres, PgArguments> {
        let mut query = sqlx::query::<Postgres>(&self.sql);
        for p in &self.params {
            query = match p {
                SqlParam::Text(t) => query.bind(t.clone()),
                SqlParam::Json(v) => query.bind(v.clone()),
            };
        }
        query
    }
}
