//! The capability contract a model must satisfy before the CRUD functions
//! operate on it.
//!
//! Conformance is structural: any type implementing [`Model`] qualifies, no
//! matter whether its methods come from [`crate::BaseMixin`] or are written by
//! hand. A type missing one of the methods does not compile against the CRUD
//! functions. What the compiler cannot see is whether a conforming type can
//! actually serve its methods at runtime (a mixin model without a configured
//! pool, for instance); [`Model::missing_capabilities`] reports that and
//! [`ensure_asset`] turns it into an error.

use async_trait::async_trait;
use serde_json::Value;
use strum::{Display, EnumIter, EnumString};

use crate::error::CrudError;
use crate::kwargs::Attrs;
use crate::serialize::{quote_if_str, Dumped};
use crate::session::{SessionScope, Transactional};

/// The fixed method surface of the contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Capability {
    QueryBy,
    GetId,
    Save,
    Update,
    Delete,
    Dump,
    AsDict,
    SessionScope,
    SessionMaker,
}

#[async_trait]
pub trait Model: Sized + Send + Sync + 'static {
    /// Transactional handle produced by [`Model::session_maker`].
    type Session: Transactional;

    /// Name used in logs and errors.
    fn model_name() -> &'static str;

    /// Capabilities the type declares but cannot serve right now.
    fn missing_capabilities() -> Vec<Capability> {
        Vec::new()
    }

    /// Open a new transactional handle.
    async fn session_maker() -> Result<Self::Session, CrudError>;

    /// Open a handle wrapped in a scope that commits or rolls back on finish.
    async fn session_scope() -> Result<SessionScope<Self::Session>, CrudError> {
        let session = Self::session_maker().await?;
        Ok(SessionScope::new(Self::model_name(), session))
    }

    /// Build a transient instance from an attribute mapping. An `id` in
    /// `attrs` is discarded: a transient instance is always inserted, and
    /// its identity is assigned by `create_id`.
    fn from_attrs(attrs: Attrs) -> Result<Self, CrudError>;

    /// Every stored instance whose attributes equal each criterion.
    async fn query_by(criteria: Attrs) -> Result<Vec<Self>, CrudError>;

    /// The instance with the given identifier, if any.
    async fn get_id(id: &Value) -> Result<Option<Self>, CrudError>;

    async fn save(&mut self) -> Result<(), CrudError>;

    /// Apply attribute changes and persist them.
    async fn update(&mut self, attrs: Attrs) -> Result<(), CrudError>;

    async fn delete(&self) -> Result<(), CrudError>;

    /// Attribute projection without private (`_`-prefixed) keys.
    fn as_dict(&self) -> Attrs;

    /// Serialized form used in responses.
    fn dump(&self) -> Result<Dumped, CrudError>;

    /// Debug rendering, `Name(key='value', other=1)`.
    fn repr(&self) -> String {
        let fields = self
            .as_dict()
            .iter()
            .map(|(k, v)| format!("{}={}", k, quote_if_str(v)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", Self::model_name(), fields)
    }
}

/// Reject a model type that cannot serve the full contract.
pub fn ensure_asset<M: Model>() -> Result<(), CrudError> {
    let missing = M::missing_capabilities();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(CrudError::NotAnAsset {
            model: M::model_name(),
            missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Broken, Gadget};
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn capability_names() {
        assert_eq!(Capability::iter().count(), 9);
        assert_eq!(Capability::SessionMaker.to_string(), "session_maker");
        assert_eq!(Capability::from_str("query_by").unwrap(), Capability::QueryBy);
    }

    #[test]
    fn conforming_model_passes_guard() {
        assert!(ensure_asset::<Gadget>().is_ok());
    }

    #[test]
    fn model_missing_a_capability_fails_guard() {
        match ensure_asset::<Broken>() {
            Err(CrudError::NotAnAsset { model, missing }) => {
                assert_eq!(model, "Broken");
                assert_eq!(missing, vec![Capability::SessionMaker]);
            }
            other => panic!("expected NotAnAsset, got {:?}", other),
        }
    }

    #[test]
    fn repr_quotes_strings() {
        let w = Gadget::from_attrs(crate::testing::attrs(serde_json::json!({
            "name": "something",
            "size": 1
        })))
        .unwrap();
        let r = w.repr();
        assert!(r.starts_with("Gadget("));
        assert!(r.contains("name='something'"));
        assert!(r.contains("size=1"));
    }
}
