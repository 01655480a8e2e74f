//! Generic CRUD over any [`Model`].
//!
//! Each function takes the model as a type parameter and a keyword mapping,
//! checks the model with [`ensure_asset`] and answers with a [`Reply`].
//! These are the functions a [`crate::Binding`] pre-binds for a route.

use axum::http::StatusCode;
use serde_json::Value;
use tracing::debug;

use crate::contract::{ensure_asset, Model};
use crate::error::CrudError;
use crate::kwargs::{del_nulls, key_list, parse_limit, parse_not_id, require_id_key, Attrs, LIMIT_KEY};
use crate::response::Reply;

/// Query by the non-null keywords and dump at most `limit` matches.
pub async fn get<M: Model>(mut kwargs: Attrs) -> Result<Reply, CrudError> {
    ensure_asset::<M>()?;
    let limit = parse_limit(kwargs.get(LIMIT_KEY))?;
    kwargs.retain(|k, _| k != LIMIT_KEY);
    let criteria = del_nulls(kwargs);
    if limit == 0 {
        return Ok(Reply::many(Vec::new()));
    }
    let found = M::query_by(criteria).await?;
    let items = found
        .iter()
        .take(limit)
        .map(Model::dump)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Reply::many(items))
}

/// Look up by the first keyword whose name contains `id`.
pub async fn get_id<M: Model>(kwargs: Attrs) -> Result<Reply, CrudError> {
    ensure_asset::<M>()?;
    let id_key = require_id_key(&kwargs)?;
    match M::get_id(&kwargs[id_key]).await? {
        Some(instance) => Ok(Reply::one(instance.dump()?, StatusCode::OK)),
        None => Ok(Reply::no_content(StatusCode::NOT_FOUND)),
    }
}

/// Create from the first keyword's value. The key itself only names the
/// parameter for routing.
pub async fn post<M: Model>(kwargs: Attrs) -> Result<Reply, CrudError> {
    ensure_asset::<M>()?;
    let Some(vals) = kwargs.values().next() else {
        return Err(CrudError::shape(
            "not enough context, expected one keyword holding the attributes",
        ));
    };
    let Value::Object(vals) = vals.clone() else {
        return Err(CrudError::shape(format!(
            "attributes for {} must be an object, got {}",
            M::model_name(),
            vals
        )));
    };
    match create::<M>(vals).await {
        Ok(reply) => Ok(reply),
        Err(err) => {
            debug!(model = M::model_name(), error = %err, "post failed");
            Ok(Reply::no_content(StatusCode::BAD_REQUEST))
        }
    }
}

async fn create<M: Model>(vals: Attrs) -> Result<Reply, CrudError> {
    let mut instance = M::from_attrs(vals)?;
    instance.save().await?;
    debug!(model = M::model_name(), instance = %instance.repr(), "created");
    Ok(Reply::one(instance.dump()?, StatusCode::CREATED))
}

/// Update the instance named by the first id keyword with the attributes held
/// by the first non-id keyword.
pub async fn put<M: Model>(kwargs: Attrs) -> Result<Reply, CrudError> {
    ensure_asset::<M>()?;
    let id_key = require_id_key(&kwargs)?;
    let Some(data_key) = parse_not_id(&kwargs).next() else {
        return Err(CrudError::shape(format!(
            "unable to parse data key: {}",
            key_list(&kwargs)
        )));
    };
    let Some(mut instance) = M::get_id(&kwargs[id_key]).await? else {
        return Ok(Reply::no_content(StatusCode::NOT_FOUND));
    };
    match modify(&mut instance, &kwargs[data_key]).await {
        Ok(reply) => Ok(reply),
        Err(err) => {
            debug!(model = M::model_name(), error = %err, "put failed");
            Ok(Reply::no_content(StatusCode::BAD_REQUEST))
        }
    }
}

async fn modify<M: Model>(instance: &mut M, data: &Value) -> Result<Reply, CrudError> {
    let Value::Object(attrs) = data else {
        return Err(CrudError::shape(format!("update data must be an object, got {}", data)));
    };
    instance.update(attrs.clone()).await?;
    debug!(model = M::model_name(), instance = %instance.repr(), "updated");
    Ok(Reply::one(instance.dump()?, StatusCode::OK))
}

pub async fn delete<M: Model>(kwargs: Attrs) -> Result<Reply, CrudError> {
    ensure_asset::<M>()?;
    let id_key = require_id_key(&kwargs)?;
    let Some(instance) = M::get_id(&kwargs[id_key]).await? else {
        return Ok(Reply::no_content(StatusCode::NOT_FOUND));
    };
    instance.delete().await?;
    debug!(model = M::model_name(), instance = %instance.repr(), "deleted");
    Ok(Reply::no_content(StatusCode::NO_CONTENT))
}
