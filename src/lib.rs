//! sqlx-crud-utils: a CRUD layer that glues PostgreSQL models (`sqlx`) to
//! `axum` routes.
//!
//! Models implement [`Model`], usually through [`BaseMixin`]. The functions in
//! [`crud`] operate on any such model and are pre-bound per route with
//! [`Binding`]; [`CrudResource`] mounts all five on a router.

pub mod binding;
pub mod config;
pub mod contract;
pub mod descriptor;
pub mod error;
pub mod events;
pub mod handlers;
pub mod kwargs;
pub mod mixin;
pub mod response;
pub mod routes;
pub mod serialize;
pub mod service;
pub mod session;
pub mod sql;
pub mod store;

#[cfg(test)]
mod testing;

pub use binding::{Binding, Operation};
pub use config::{AppConfig, DatabaseConfig};
pub use contract::{ensure_asset, Capability, Model};
pub use descriptor::{ModelDescriptor, ModelDescriptorBuilder};
pub use error::{ConfigError, CrudError};
pub use events::{create_id, EventRegistry, LifecycleEvent};
pub use handlers::CrudResource;
pub use kwargs::{del_nulls, parse_id, parse_not_id, Attrs};
pub use mixin::BaseMixin;
pub use response::{Body, Reply};
pub use routes::{common_routes, common_routes_with_ready};
pub use serialize::{DumpFormat, Dumped};
pub use service::crud;
pub use session::{PgSession, SessionScope, Transactional};
pub use store::{create_all, drop_all, ensure_database_exists};
