//! Builds parameterized SELECT, INSERT, UPDATE, DELETE from a model descriptor.
//!
//! Rows are read back as `to_jsonb(t)` and decoded with serde, and writes
//! pass the whole row as one JSON document through `jsonb_populate_record`,
//! so no per-column types are needed.

use serde_json::Value;

use super::SqlParam;
use crate::descriptor::{quoted, ModelDescriptor};
use crate::kwargs::Attrs;

/// Identity column of every mixin table.
pub const ID_COLUMN: &str = "id";

const ALIAS: &str = "t";

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, p: SqlParam) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(p);
        n
    }
}

fn id_match(param_num: u32) -> String {
    format!("{}.{}::text = ${}", ALIAS, quoted(ID_COLUMN), param_num)
}

/// SELECT every row whose attributes equal each criterion. A null criterion matches null.
pub fn select_by(descriptor: &ModelDescriptor, criteria: &Attrs) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut where_parts = Vec::new();
    for (key, val) in criteria {
        let key_param = q.push_param(SqlParam::text(key.as_str()));
        let val_param = q.push_param(SqlParam::criterion(val));
        where_parts.push(format!(
            "(to_jsonb({}) ->> ${}) IS NOT DISTINCT FROM ${}",
            ALIAS, key_param, val_param
        ));
    }
    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };
    q.sql = format!(
        "SELECT to_jsonb({a}) FROM {} AS {a}{}",
        descriptor.qualified_table(),
        where_clause,
        a = ALIAS
    );
    q
}

/// SELECT by identifier, compared in text form so an ill-formed id simply matches nothing.
pub fn select_by_id(descriptor: &ModelDescriptor, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(SqlParam::criterion(id));
    q.sql = format!(
        "SELECT to_jsonb({a}) FROM {} AS {a} WHERE {}",
        descriptor.qualified_table(),
        id_match(n),
        a = ALIAS
    );
    q
}

/// INSERT one row from its attributes. Attributes not present become NULL.
pub fn insert(descriptor: &ModelDescriptor, row: &Attrs) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = descriptor.qualified_table();
    let n = q.push_param(SqlParam::Json(Value::Object(row.clone())));
    q.sql = format!(
        "INSERT INTO {table} AS {a} SELECT * FROM jsonb_populate_record(NULL::{table}, ${n}) RETURNING to_jsonb({a})",
        table = table,
        a = ALIAS,
        n = n
    );
    q
}

/// UPDATE by id: SET every attribute of `row` except the identity.
/// With nothing to set this degrades to a SELECT of the row.
pub fn update(descriptor: &ModelDescriptor, id: &Value, row: &Attrs) -> QueryBuf {
    let table = descriptor.qualified_table();
    let cols: Vec<&str> = row
        .keys()
        .map(String::as_str)
        .filter(|k| *k != ID_COLUMN)
        .collect();
    if cols.is_empty() {
        return select_by_id(descriptor, id);
    }
    let mut q = QueryBuf::new();
    let doc = q.push_param(SqlParam::Json(Value::Object(row.clone())));
    let id_param = q.push_param(SqlParam::criterion(id));
    let sets = cols
        .iter()
        .map(|c| format!("{} = r.{}", quoted(c), quoted(c)))
        .collect::<Vec<_>>()
        .join(", ");
    q.sql = format!(
        "UPDATE {table} AS {a} SET {sets} FROM jsonb_populate_record(NULL::{table}, ${doc}) AS r WHERE {cond} RETURNING to_jsonb({a})",
        table = table,
        a = ALIAS,
        sets = sets,
        doc = doc,
        cond = id_match(id_param)
    );
    q
}

/// DELETE by id.
pub fn delete(descriptor: &ModelDescriptor, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(SqlParam::criterion(id));
    q.sql = format!(
        "DELETE FROM {} AS {} WHERE {}",
        descriptor.qualified_table(),
        ALIAS,
        id_match(n)
    );
    q
}
