//! Example server: one `Foo` model mounted at /api/v1/foos, plus health,
//! readiness and version routes.
//!
//! Reads DATABASE_URL (or DB_USER/DB_PASSWORD/DB_HOST/DB_PORT/DB_NAME) and
//! APP_HOST/APP_PORT, optionally from `.env`.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use sqlx_crud_utils::{
    common_routes_with_ready, create_all, ensure_database_exists, AppConfig, Attrs, BaseMixin,
    CrudError, CrudResource, ModelDescriptor,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

static POOL: OnceCell<PgPool> = OnceCell::new();

#[derive(Debug, Serialize, Deserialize)]
struct Foo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    bar: Option<String>,
    #[serde(default)]
    baz: Option<Value>,
}

/// `baz` is NUMERIC; it comes back from `to_jsonb` as a JSON number but may
/// arrive as a string from clients.
fn baz_as_float(val: Value) -> Value {
    match &val {
        Value::String(s) => s.parse::<f64>().map(Value::from).unwrap_or(val),
        Value::Number(n) => n.as_f64().map(Value::from).unwrap_or(val),
        _ => val,
    }
}

/// Keep `bar` lower case.
fn lower_bar(row: &mut Attrs) -> Result<(), CrudError> {
    if let Some(Value::String(bar)) = row.get_mut("bar") {
        *bar = bar.to_lowercase();
    }
    Ok(())
}

impl BaseMixin for Foo {
    fn descriptor() -> Result<&'static ModelDescriptor, CrudError> {
        static DESCRIPTOR: OnceCell<ModelDescriptor> = OnceCell::new();
        DESCRIPTOR.get_or_try_init(|| {
            ModelDescriptor::builder("Foo")
                .create_sql(
                    "CREATE TABLE IF NOT EXISTS \"foo\" (\
                     id UUID PRIMARY KEY, \
                     bar VARCHAR(40) NOT NULL, \
                     baz NUMERIC)",
                )
                .to_json(&["baz"], baz_as_float)
                .listen(&["before_insert", "before_update"], lower_bar)
                .build()
        })
    }

    fn pool() -> Result<PgPool, CrudError> {
        POOL.get()
            .cloned()
            .ok_or_else(|| CrudError::Session("pool not initialized".into()))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sqlx_crud_utils=debug,server=info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    ensure_database_exists(&config.database.url).await?;
    let pool = config.database.connect().await?;
    create_all(&pool, &[Foo::descriptor()?]).await?;
    let _ = POOL.set(pool.clone());

    let foos = CrudResource::<Foo>::new("foo_id", "foo")?
        .filter("bar")
        .body_limit(64 * 1024)
        .router("/foos");

    let app = axum::Router::new()
        .merge(common_routes_with_ready(pool))
        .nest("/api/v1", foos);

    let listener = TcpListener::bind(config.address()).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
