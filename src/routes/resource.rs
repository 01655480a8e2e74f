//! Routes for one model resource: `path` for list/create, `path/:id` for
//! read/update/delete.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::limit::RequestBodyLimitLayer;

use crate::contract::Model;
use crate::handlers::resource::{create, list, read, remove, update, CrudResource};

impl<M: Model> CrudResource<M> {
    pub fn router(self, path: &str) -> Router {
        let body_limit = self.body_limit;
        let item = format!("{}/:id", path.trim_end_matches('/'));
        let router = Router::new()
            .route(path, get(list::<M>).post(create::<M>))
            .route(&item, get(read::<M>).put(update::<M>).delete(remove::<M>))
            .with_state(Arc::new(self));
        match body_limit {
            Some(bytes) => router.layer(RequestBodyLimitLayer::new(bytes)),
            None => router,
        }
    }
}
