//! Generic handlers for one model resource. Each maps the request onto the
//! keyword names of its [`Binding`] and calls it.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::Value;

use crate::binding::Binding;
use crate::contract::Model;
use crate::error::CrudError;
use crate::kwargs::{Attrs, LIMIT_KEY};
use crate::response::Reply;

/// Bindings of the five operations over `M`, keyed by an id parameter name
/// (must contain `id`) and a body parameter name (must not).
pub struct CrudResource<M> {
    pub(crate) id_param: String,
    pub(crate) body_param: String,
    pub(crate) body_limit: Option<usize>,
    pub(crate) get: Binding<M>,
    pub(crate) get_id: Binding<M>,
    pub(crate) post: Binding<M>,
    pub(crate) put: Binding<M>,
    pub(crate) delete: Binding<M>,
}

impl<M: Model> CrudResource<M> {
    pub fn new(id_param: impl Into<String>, body_param: impl Into<String>) -> Result<Self, CrudError> {
        let id_param = id_param.into();
        let body_param = body_param.into();
        if !id_param.contains("id") {
            return Err(CrudError::shape(format!(
                "id parameter '{}' must contain 'id'",
                id_param
            )));
        }
        if body_param.contains("id") {
            return Err(CrudError::shape(format!(
                "body parameter '{}' must not contain 'id'",
                body_param
            )));
        }
        Ok(CrudResource {
            get: Binding::get().with(LIMIT_KEY, Value::Null),
            get_id: Binding::get_id().with(id_param.as_str(), Value::Null),
            post: Binding::post().with(body_param.as_str(), Value::Null),
            put: Binding::put()
                .with(id_param.as_str(), Value::Null)
                .with(body_param.as_str(), Value::Null),
            delete: Binding::delete().with(id_param.as_str(), Value::Null),
            id_param,
            body_param,
            body_limit: None,
        })
    }

    /// Accept `name` as a query filter on the list route.
    pub fn filter(mut self, name: impl Into<String>) -> Self {
        self.get = self.get.with(name.into(), Value::Null);
        self
    }

    /// Reject request bodies larger than `bytes`.
    pub fn body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = Some(bytes);
        self
    }

    fn query_kwargs(&self, params: HashMap<String, String>) -> Attrs {
        params
            .into_iter()
            .filter(|(k, _)| self.get.declares(k))
            .map(|(k, v)| (k, Value::String(v)))
            .collect()
    }

    fn id_kwargs(&self, id: String) -> Attrs {
        let mut kwargs = Attrs::new();
        kwargs.insert(self.id_param.clone(), Value::String(id));
        kwargs
    }
}

pub async fn list<M: Model>(
    State(res): State<Arc<CrudResource<M>>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Reply, CrudError> {
    let kwargs = res.query_kwargs(params);
    res.get.call(kwargs).await
}

pub async fn create<M: Model>(
    State(res): State<Arc<CrudResource<M>>>,
    Json(body): Json<Value>,
) -> Result<Reply, CrudError> {
    let mut kwargs = Attrs::new();
    kwargs.insert(res.body_param.clone(), body);
    res.post.call(kwargs).await
}

pub async fn read<M: Model>(
    State(res): State<Arc<CrudResource<M>>>,
    Path(id): Path<String>,
) -> Result<Reply, CrudError> {
    let kwargs = res.id_kwargs(id);
    res.get_id.call(kwargs).await
}

pub async fn update<M: Model>(
    State(res): State<Arc<CrudResource<M>>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Reply, CrudError> {
    let mut kwargs = res.id_kwargs(id);
    kwargs.insert(res.body_param.clone(), body);
    res.put.call(kwargs).await
}

pub async fn remove<M: Model>(
    State(res): State<Arc<CrudResource<M>>>,
    Path(id): Path<String>,
) -> Result<Reply, CrudError> {
    let kwargs = res.id_kwargs(id);
    res.delete.call(kwargs).await
}
