//! In-memory models for unit tests. `Gadget` implements [`Model`] by hand,
//! `Broken` reports a capability it cannot serve.
//!
//! State is thread-local: each `#[tokio::test]` runs on its own current-thread
//! runtime, and tests call [`reset`] first.

use std::cell::RefCell;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::contract::{Capability, Model};
use crate::descriptor::ModelDescriptor;
use crate::error::CrudError;
use crate::events::LifecycleEvent;
use crate::kwargs::{criterion_text, Attrs};
use crate::mixin::merge_declared;
use crate::serialize::{dump_with, project, to_attrs, DumpFormat, Dumped};
use crate::session::Transactional;

thread_local! {
    static ROWS: RefCell<Vec<Attrs>> = const { RefCell::new(Vec::new()) };
    static LOG: RefCell<Vec<&'static str>> = const { RefCell::new(Vec::new()) };
}

pub fn reset() {
    ROWS.with(|r| r.borrow_mut().clear());
    LOG.with(|l| l.borrow_mut().clear());
}

/// Drain the session log.
pub fn session_log() -> Vec<&'static str> {
    LOG.with(|l| std::mem::take(&mut *l.borrow_mut()))
}

pub fn stored_rows() -> Vec<Attrs> {
    ROWS.with(|r| r.borrow().clone())
}

fn log(entry: &'static str) {
    LOG.with(|l| l.borrow_mut().push(entry));
}

pub fn attrs(v: Value) -> Attrs {
    match v {
        Value::Object(m) => m,
        other => panic!("expected object, got {}", other),
    }
}

/// Session over a private copy of the rows, written back on commit.
pub struct MemSession {
    staged: Option<Vec<Attrs>>,
    fail_commit: bool,
}

impl MemSession {
    pub fn open() -> Self {
        log("open");
        MemSession {
            staged: Some(stored_rows()),
            fail_commit: false,
        }
    }

    pub fn failing_commit() -> Self {
        MemSession {
            fail_commit: true,
            ..Self::open()
        }
    }

    fn rows(&mut self) -> Result<&mut Vec<Attrs>, CrudError> {
        self.staged
            .as_mut()
            .ok_or_else(|| CrudError::Session("finished".into()))
    }
}

#[async_trait]
impl Transactional for MemSession {
    async fn commit(&mut self) -> Result<(), CrudError> {
        log("commit");
        if self.fail_commit {
            return Err(CrudError::Session("commit refused".into()));
        }
        let staged = self
            .staged
            .take()
            .ok_or_else(|| CrudError::Session("finished".into()))?;
        ROWS.with(|r| *r.borrow_mut() = staged);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), CrudError> {
        log("rollback");
        self.staged = None;
        Ok(())
    }

    async fn close(self) {
        log("close");
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Gadget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub size: Option<i64>,
}

fn reject_explode(row: &mut Attrs) -> Result<(), CrudError> {
    if row.get("name").and_then(Value::as_str) == Some("explode") {
        return Err(CrudError::Callback {
            event: "before_write".into(),
            message: "explode is not a gadget".into(),
        });
    }
    Ok(())
}

impl Gadget {
    pub fn descriptor() -> &'static ModelDescriptor {
        static DESCRIPTOR: OnceCell<ModelDescriptor> = OnceCell::new();
        DESCRIPTOR.get_or_init(|| {
            ModelDescriptor::builder("Gadget")
                .listen(&["before_insert", "before_update"], reject_explode)
                .dump_format(DumpFormat::Dict)
                .build()
                .expect("gadget descriptor")
        })
    }

    fn matches(row: &Attrs, criteria: &Attrs) -> bool {
        criteria
            .iter()
            .all(|(k, v)| criterion_text(row.get(k).unwrap_or(&Value::Null)) == criterion_text(v))
    }

    fn write(&mut self, session: &mut MemSession) -> Result<(), CrudError> {
        let descriptor = Self::descriptor();
        let mut row = to_attrs(self)?;
        let rows = session.rows()?;
        match self.id.clone() {
            None => {
                descriptor
                    .events
                    .dispatch(LifecycleEvent::BeforeInsert, &mut row)?;
                rows.push(row.clone());
            }
            Some(id) => {
                descriptor
                    .events
                    .dispatch(LifecycleEvent::BeforeUpdate, &mut row)?;
                let slot = rows
                    .iter_mut()
                    .find(|r| r.get("id").and_then(Value::as_str) == Some(id.as_str()))
                    .ok_or(sqlx::Error::RowNotFound)?;
                *slot = row.clone();
            }
        }
        *self = serde_json::from_value(Value::Object(row))?;
        Ok(())
    }
}

#[async_trait]
impl Model for Gadget {
    type Session = MemSession;

    fn model_name() -> &'static str {
        Self::descriptor().name
    }

    async fn session_maker() -> Result<MemSession, CrudError> {
        Ok(MemSession::open())
    }

    fn from_attrs(mut attrs: Attrs) -> Result<Self, CrudError> {
        attrs.retain(|k, _| k != "id");
        Ok(serde_json::from_value(Value::Object(attrs))?)
    }

    async fn query_by(criteria: Attrs) -> Result<Vec<Self>, CrudError> {
        let mut scope = Self::session_scope().await?;
        let result = scope.session().rows().and_then(|rows| {
            rows.iter()
                .filter(|r| Self::matches(r, &criteria))
                .map(|r| Ok(serde_json::from_value(Value::Object(r.clone()))?))
                .collect::<Result<Vec<_>, CrudError>>()
        });
        scope.finish(result).await
    }

    async fn get_id(id: &Value) -> Result<Option<Self>, CrudError> {
        let mut criteria = Attrs::new();
        criteria.insert("id".into(), id.clone());
        Ok(Self::query_by(criteria).await?.into_iter().next())
    }

    async fn save(&mut self) -> Result<(), CrudError> {
        let mut scope = Self::session_scope().await?;
        let result = self.write(scope.session());
        scope.finish(result).await
    }

    async fn update(&mut self, attrs: Attrs) -> Result<(), CrudError> {
        let mut current = to_attrs(self)?;
        merge_declared(&mut current, attrs);
        *self = serde_json::from_value(Value::Object(current))?;
        self.save().await
    }

    async fn delete(&self) -> Result<(), CrudError> {
        let mut scope = Self::session_scope().await?;
        let id = self.id.clone();
        let result = scope.session().rows().map(|rows| {
            rows.retain(|r| r.get("id").and_then(Value::as_str) != id.as_deref());
        });
        scope.finish(result).await
    }

    fn as_dict(&self) -> Attrs {
        to_attrs(self).map(project).unwrap_or_default()
    }

    fn dump(&self) -> Result<Dumped, CrudError> {
        let d = Self::descriptor();
        dump_with(&d.hooks, self.as_dict(), d.dump_format)
    }
}

/// Declares the whole contract but has no way to open a session.
#[derive(Debug)]
pub struct Broken;

fn unavailable<T>() -> Result<T, CrudError> {
    Err(CrudError::Session("no session maker".into()))
}

#[async_trait]
impl Model for Broken {
    type Session = MemSession;

    fn model_name() -> &'static str {
        "Broken"
    }

    fn missing_capabilities() -> Vec<Capability> {
        vec![Capability::SessionMaker]
    }

    async fn session_maker() -> Result<MemSession, CrudError> {
        unavailable()
    }

    fn from_attrs(_attrs: Attrs) -> Result<Self, CrudError> {
        Ok(Broken)
    }

    async fn query_by(_criteria: Attrs) -> Result<Vec<Self>, CrudError> {
        unavailable()
    }

    async fn get_id(_id: &Value) -> Result<Option<Self>, CrudError> {
        unavailable()
    }

    async fn save(&mut self) -> Result<(), CrudError> {
        unavailable()
    }

    async fn update(&mut self, _attrs: Attrs) -> Result<(), CrudError> {
        unavailable()
    }

    async fn delete(&self) -> Result<(), CrudError> {
        unavailable()
    }

    fn as_dict(&self) -> Attrs {
        Attrs::new()
    }

    fn dump(&self) -> Result<Dumped, CrudError> {
        Ok(Dumped::Dict(Attrs::new()))
    }
}
