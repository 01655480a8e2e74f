//! Routers: common service routes and per-model resources.

mod common;
mod resource;

pub use common::{common_routes, common_routes_with_ready};
