//! Database bootstrap and per-model DDL.

use std::str::FromStr;

use sqlx::{ConnectOptions, PgPool};
use tracing::{debug, info};

use crate::descriptor::{quoted, ModelDescriptor};
use crate::error::{ConfigError, CrudError};

/// Create the database named in `database_url` when it does not exist yet,
/// connecting through the `postgres` maintenance database.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), CrudError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| ConfigError::DatabaseUrl(e.to_string()))?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        sqlx::query(&format!("CREATE DATABASE {}", quoted(&db_name)))
            .execute(&mut conn)
            .await?;
        info!(database = %db_name, "created database");
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), ConfigError> {
    let scheme_end = url
        .find("://")
        .ok_or_else(|| ConfigError::DatabaseUrl(format!("{}: no scheme", url)))?
        + 3;
    let path_start = match url[scheme_end..].find('/') {
        Some(i) => scheme_end + i + 1,
        None => return Ok((format!("{}/postgres", url), String::new())),
    };
    let path_and_query = &url[path_start..];
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let admin_url = format!("{}postgres", &url[..path_start]);
    Ok((admin_url, db_name.to_string()))
}

/// Run each descriptor's `CREATE TABLE` statement, creating its schema first.
/// Descriptors without DDL are skipped.
pub async fn create_all(pool: &PgPool, descriptors: &[&ModelDescriptor]) -> Result<(), CrudError> {
    for d in descriptors {
        let Some(ddl) = &d.create_sql else {
            debug!(model = d.name, "no DDL, skipping");
            continue;
        };
        if let Some(schema) = &d.schema {
            sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(schema)))
                .execute(pool)
                .await?;
        }
        sqlx::query(ddl).execute(pool).await?;
        info!(model = d.name, table = %d.qualified_table(), "table ready");
    }
    Ok(())
}

/// Drop the descriptors' tables, last first.
pub async fn drop_all(pool: &PgPool, descriptors: &[&ModelDescriptor]) -> Result<(), CrudError> {
    for d in descriptors.iter().rev() {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", d.qualified_table()))
            .execute(pool)
            .await?;
        info!(model = d.name, "dropped table");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_url_swaps_database() {
        let (admin, db) = parse_db_name_from_url("postgres://u:p@host:5432/foo?sslmode=disable").unwrap();
        assert_eq!(admin, "postgres://u:p@host:5432/postgres");
        assert_eq!(db, "foo");
    }

    #[test]
    fn url_without_database() {
        let (admin, db) = parse_db_name_from_url("postgres://host").unwrap();
        assert_eq!(admin, "postgres://host/postgres");
        assert!(db.is_empty());
        assert!(parse_db_name_from_url("not a url").is_err());
    }
}
