//! Default implementation of the capability contract for PostgreSQL row structs.
//!
//! A model derives serde, implements [`BaseMixin`] by supplying its descriptor
//! and a pool, and gets [`Model`] for free:
//!
//! ```rust,ignore
//! #[derive(Serialize, Deserialize)]
//! struct Foo {
//!     #[serde(skip_serializing_if = "Option::is_none")]
//!     id: Option<String>,
//!     bar: Option<String>,
//! }
//!
//! impl BaseMixin for Foo {
//!     fn descriptor() -> Result<&'static ModelDescriptor, CrudError> {
//!         static DESCRIPTOR: OnceCell<ModelDescriptor> = OnceCell::new();
//!         DESCRIPTOR.get_or_try_init(|| ModelDescriptor::builder("Foo").build())
//!     }
//!
//!     fn pool() -> Result<PgPool, CrudError> {
//!         POOL.get().cloned().ok_or_else(|| CrudError::Session("pool not initialized".into()))
//!     }
//! }
//! ```
//!
//! Every `*_in` method runs against a caller-owned [`PgSession`] and neither
//! commits nor closes it; the [`Model`] methods open their own scope.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use tracing::debug;

use crate::contract::{Capability, Model};
use crate::descriptor::ModelDescriptor;
use crate::error::CrudError;
use crate::events::LifecycleEvent;
use crate::kwargs::Attrs;
use crate::serialize::{dump_with, project, to_attrs, DumpFormat, Dumped};
use crate::session::PgSession;
use crate::sql::{self, ID_COLUMN};

#[async_trait]
pub trait BaseMixin: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Descriptor built once for the type.
    fn descriptor() -> Result<&'static ModelDescriptor, CrudError>;

    /// Pool the model's sessions are opened on.
    fn pool() -> Result<PgPool, CrudError>;

    /// Identifier of the instance, `None` until first inserted.
    fn id(&self) -> Option<Value> {
        match to_attrs(self) {
            Ok(attrs) => identity(&attrs),
            Err(err) => {
                debug!(model = std::any::type_name::<Self>(), error = %err, "cannot serialize for id");
                None
            }
        }
    }

    /// Dump in an explicit format, ignoring the descriptor default.
    fn dump_as(&self, format: DumpFormat) -> Result<Dumped, CrudError> {
        let descriptor = Self::descriptor()?;
        let vals = project(to_attrs(self)?);
        dump_with(&descriptor.hooks, vals, format)
    }

    async fn query_by_in(session: &mut PgSession, criteria: &Attrs) -> Result<Vec<Self>, CrudError> {
        let descriptor = Self::descriptor()?;
        let q = sql::select_by(descriptor, criteria);
        debug!(sql = %q.sql, params = ?q.params, "query");
        let rows = q.fetch_rows().fetch_all(session.conn()?).await?;
        rows.into_iter()
            .map(|row| Ok(serde_json::from_value(row)?))
            .collect()
    }

    async fn get_id_in(session: &mut PgSession, id: &Value) -> Result<Option<Self>, CrudError> {
        let descriptor = Self::descriptor()?;
        let q = sql::select_by_id(descriptor, id);
        debug!(sql = %q.sql, params = ?q.params, "query");
        let row = q.fetch_rows().fetch_optional(session.conn()?).await?;
        match row {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }

    /// Insert a new instance or write back a persisted one, running the
    /// matching lifecycle callbacks. The instance is refreshed from the stored row.
    async fn save_in(&mut self, session: &mut PgSession) -> Result<(), CrudError> {
        let descriptor = Self::descriptor()?;
        let mut row = to_attrs(self)?;
        let stored = match identity(&row) {
            None => {
                descriptor
                    .events
                    .dispatch(LifecycleEvent::BeforeInsert, &mut row)?;
                let q = sql::insert(descriptor, &row);
                debug!(sql = %q.sql, params = ?q.params, "query");
                let stored = q.fetch_rows().fetch_one(session.conn()?).await?;
                after(descriptor, LifecycleEvent::AfterInsert, &stored)?;
                stored
            }
            Some(id) => {
                descriptor
                    .events
                    .dispatch(LifecycleEvent::BeforeUpdate, &mut row)?;
                let q = sql::update(descriptor, &id, &row);
                debug!(sql = %q.sql, params = ?q.params, "query");
                let stored = q
                    .fetch_rows()
                    .fetch_optional(session.conn()?)
                    .await?
                    .ok_or(sqlx::Error::RowNotFound)?;
                after(descriptor, LifecycleEvent::AfterUpdate, &stored)?;
                stored
            }
        };
        *self = serde_json::from_value(stored)?;
        Ok(())
    }

    /// Overwrite declared attributes with the non-null values of `attrs`, then save.
    /// The identity is never overwritten and undeclared keys are ignored.
    async fn update_in(&mut self, session: &mut PgSession, attrs: Attrs) -> Result<(), CrudError> {
        let mut current = to_attrs(self)?;
        merge_declared(&mut current, attrs);
        *self = serde_json::from_value(Value::Object(current))?;
        self.save_in(session).await
    }

    async fn delete_in(&self, session: &mut PgSession) -> Result<(), CrudError> {
        let descriptor = Self::descriptor()?;
        let mut row = to_attrs(self)?;
        let Some(id) = identity(&row) else {
            return Err(CrudError::shape(format!(
                "cannot delete an unsaved {}",
                descriptor.name
            )));
        };
        descriptor
            .events
            .dispatch(LifecycleEvent::BeforeDelete, &mut row)?;
        let q = sql::delete(descriptor, &id);
        debug!(sql = %q.sql, params = ?q.params, "query");
        q.execute().execute(session.conn()?).await?;
        descriptor
            .events
            .dispatch(LifecycleEvent::AfterDelete, &mut row)?;
        Ok(())
    }
}

fn identity(row: &Attrs) -> Option<Value> {
    row.get(ID_COLUMN).filter(|v| !v.is_null()).cloned()
}

/// `after_*` callbacks see a copy of the stored row; their changes are not kept.
fn after(descriptor: &ModelDescriptor, event: LifecycleEvent, stored: &Value) -> Result<(), CrudError> {
    if let Value::Object(row) = stored {
        descriptor.events.dispatch(event, &mut row.clone())?;
    }
    Ok(())
}

/// Copy non-null values for keys already present in `current`, except the identity.
pub(crate) fn merge_declared(current: &mut Attrs, attrs: Attrs) {
    for (key, value) in attrs {
        if key == ID_COLUMN || value.is_null() {
            continue;
        }
        if let Some(slot) = current.get_mut(&key) {
            *slot = value;
        }
    }
}

#[async_trait]
impl<T: BaseMixin> Model for T {
    type Session = PgSession;

    fn model_name() -> &'static str {
        match T::descriptor() {
            Ok(d) => d.name,
            Err(_) => std::any::type_name::<T>(),
        }
    }

    fn missing_capabilities() -> Vec<Capability> {
        let mut missing = Vec::new();
        if T::descriptor().is_err() {
            missing.extend([Capability::Dump, Capability::AsDict]);
        }
        if T::pool().is_err() {
            missing.extend([Capability::SessionMaker, Capability::SessionScope]);
        }
        missing
    }

    async fn session_maker() -> Result<PgSession, CrudError> {
        let pool = T::pool()?;
        PgSession::begin(&pool).await
    }

    fn from_attrs(mut attrs: Attrs) -> Result<Self, CrudError> {
        attrs.retain(|k, _| k != ID_COLUMN);
        Ok(serde_json::from_value(Value::Object(attrs))?)
    }

    async fn query_by(criteria: Attrs) -> Result<Vec<Self>, CrudError> {
        let mut scope = Self::session_scope().await?;
        let result = T::query_by_in(scope.session(), &criteria).await;
        scope.finish(result).await
    }

    /// Lookup failures of any kind read as "not found".
    async fn get_id(id: &Value) -> Result<Option<Self>, CrudError> {
        let mut scope = Self::session_scope().await?;
        let result = T::get_id_in(scope.session(), id).await;
        match scope.finish(result).await {
            Ok(found) => Ok(found),
            Err(err) => {
                debug!(model = Self::model_name(), error = %err, "get_id failed");
                Ok(None)
            }
        }
    }

    async fn save(&mut self) -> Result<(), CrudError> {
        let mut scope = Self::session_scope().await?;
        let result = self.save_in(scope.session()).await;
        scope.finish(result).await
    }

    async fn update(&mut self, attrs: Attrs) -> Result<(), CrudError> {
        let mut scope = Self::session_scope().await?;
        let result = self.update_in(scope.session(), attrs).await;
        scope.finish(result).await
    }

    async fn delete(&self) -> Result<(), CrudError> {
        let mut scope = Self::session_scope().await?;
        let result = self.delete_in(scope.session()).await;
        scope.finish(result).await
    }

    fn as_dict(&self) -> Attrs {
        match to_attrs(self) {
            Ok(attrs) => project(attrs),
            Err(err) => {
                debug!(model = Self::model_name(), error = %err, "cannot serialize for as_dict");
                Attrs::new()
            }
        }
    }

    fn dump(&self) -> Result<Dumped, CrudError> {
        let format = T::descriptor()?.dump_format;
        self.dump_as(format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ensure_asset;
    use once_cell::sync::OnceCell;
    use serde::Deserialize;
    use serde_json::json;

    fn no_pool() -> Result<PgPool, CrudError> {
        Err(CrudError::Session("pool not initialized".into()))
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Memo {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        title: Option<String>,
        #[serde(default)]
        price: Option<Value>,
        #[serde(default, rename = "_draft")]
        draft: bool,
    }

    impl BaseMixin for Memo {
        fn descriptor() -> Result<&'static ModelDescriptor, CrudError> {
            static DESCRIPTOR: OnceCell<ModelDescriptor> = OnceCell::new();
            DESCRIPTOR.get_or_try_init(|| {
                ModelDescriptor::builder("Memo")
                    .to_json(&["price"], |v: Value| {
                        let parsed = v.as_str().and_then(|s| s.parse::<f64>().ok());
                        parsed.map_or(v, |n| json!(n))
                    })
                    .post_dump(|mut vals: Attrs| {
                        vals.insert("kind".into(), json!("memo"));
                        vals
                    })
                    .build()
            })
        }

        fn pool() -> Result<PgPool, CrudError> {
            no_pool()
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Misbuilt {
        title: Option<String>,
    }

    impl BaseMixin for Misbuilt {
        fn descriptor() -> Result<&'static ModelDescriptor, CrudError> {
            static DESCRIPTOR: OnceCell<ModelDescriptor> = OnceCell::new();
            DESCRIPTOR.get_or_try_init(|| {
                ModelDescriptor::builder("Misbuilt")
                    .listen(&["before_upsert"], |_: &mut Attrs| Ok(()))
                    .build()
            })
        }

        fn pool() -> Result<PgPool, CrudError> {
            no_pool()
        }
    }

    /// Serializes to a bare string rather than an object.
    #[derive(Debug, Serialize, Deserialize)]
    #[serde(transparent)]
    struct Scalar(String);

    impl BaseMixin for Scalar {
        fn descriptor() -> Result<&'static ModelDescriptor, CrudError> {
            static DESCRIPTOR: OnceCell<ModelDescriptor> = OnceCell::new();
            DESCRIPTOR.get_or_try_init(|| ModelDescriptor::builder("Scalar").build())
        }

        fn pool() -> Result<PgPool, CrudError> {
            no_pool()
        }
    }

    fn memo(v: Value) -> Memo {
        Memo::from_attrs(v.as_object().cloned().unwrap()).unwrap()
    }

    #[test]
    fn missing_pool_fails_the_guard() {
        assert_eq!(Memo::model_name(), "Memo");
        match ensure_asset::<Memo>() {
            Err(CrudError::NotAnAsset { model, missing }) => {
                assert_eq!(model, "Memo");
                assert_eq!(missing, vec![Capability::SessionMaker, Capability::SessionScope]);
            }
            other => panic!("expected NotAnAsset, got {:?}", other),
        }
    }

    #[test]
    fn failed_descriptor_reports_dump_capabilities() {
        assert!(matches!(Misbuilt::descriptor(), Err(CrudError::UnknownEvent(_))));
        assert_eq!(Misbuilt::model_name(), std::any::type_name::<Misbuilt>());
        assert_eq!(
            Misbuilt::missing_capabilities(),
            vec![
                Capability::Dump,
                Capability::AsDict,
                Capability::SessionMaker,
                Capability::SessionScope,
            ]
        );
        let m = Misbuilt { title: None };
        assert!(matches!(m.dump(), Err(CrudError::UnknownEvent(_))));
    }

    #[test]
    fn from_attrs_discards_identity() {
        let m = memo(json!({"id": "client-chosen", "title": "t"}));
        assert_eq!(m.id, None);
        assert_eq!(m.id(), None);

        let stored: Memo = serde_json::from_value(json!({"id": "abc", "title": "t"})).unwrap();
        assert_eq!(stored.id(), Some(json!("abc")));
    }

    #[test]
    fn dump_applies_hooks_in_both_formats() {
        let m = memo(json!({"title": "t", "price": "2.5", "_draft": true}));
        assert!(m.draft);
        assert_eq!(
            m.dump().unwrap(),
            Dumped::Text(r#"{"title":"t","price":2.5,"kind":"memo"}"#.into())
        );
        let dict = m.dump_as(DumpFormat::Dict).unwrap();
        assert_eq!(
            dict,
            Dumped::Dict(json!({"title": "t", "price": 2.5, "kind": "memo"}).as_object().cloned().unwrap())
        );
        assert_eq!(
            Value::Object(m.as_dict()),
            json!({"title": "t", "price": "2.5"})
        );
        assert_eq!(m.repr(), "Memo(title='t', price='2.5')");
    }

    #[test]
    fn non_object_model_has_no_identity_or_attributes() {
        let s = Scalar("plain".into());
        assert_eq!(s.id(), None);
        assert!(s.as_dict().is_empty());
        assert!(matches!(s.dump(), Err(CrudError::Shape(_))));
    }

    #[tokio::test]
    async fn operations_without_pool_fail_with_session_error() {
        assert!(matches!(
            Memo::query_by(Attrs::new()).await,
            Err(CrudError::Session(_))
        ));
        let mut m = memo(json!({"title": "t"}));
        assert!(matches!(m.save().await, Err(CrudError::Session(_))));
        assert!(matches!(
            Memo::get_id(&json!("abc")).await,
            Err(CrudError::Session(_))
        ));
    }

    #[test]
    fn merge_skips_nulls_identity_and_undeclared() {
        let mut current = json!({"id": "abc", "bar": "old", "baz": 1})
            .as_object()
            .cloned()
            .unwrap();
        let incoming = json!({"id": "other", "bar": null, "baz": 2, "nope": true})
            .as_object()
            .cloned()
            .unwrap();
        merge_declared(&mut current, incoming);
        assert_eq!(
            Value::Object(current),
            json!({"id": "abc", "bar": "old", "baz": 2})
        );
    }
}
