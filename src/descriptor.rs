//! Per-model descriptor: table naming, lifecycle callbacks, dump hooks.
//!
//! A descriptor is built once per model type by an explicit builder chain and
//! then shared; nothing is discovered by inspecting the model.

use std::sync::Arc;

use serde_json::Value;

use crate::error::CrudError;
use crate::events::{create_id, EventCallback, EventRegistry, LifecycleEvent};
use crate::kwargs::Attrs;
use crate::serialize::{DumpFormat, DumpHooks};

#[derive(Debug)]
pub struct ModelDescriptor {
    pub name: &'static str,
    pub table_name: String,
    pub schema: Option<String>,
    pub events: EventRegistry,
    pub hooks: DumpHooks,
    pub dump_format: DumpFormat,
    /// `CREATE TABLE` statement run by [`crate::store::create_all`].
    pub create_sql: Option<String>,
}

impl ModelDescriptor {
    /// Start a descriptor named `name`. The table defaults to the lowercased
    /// name and `create_id` is already registered on `before_insert`.
    pub fn builder(name: &'static str) -> ModelDescriptorBuilder {
        let mut events = EventRegistry::new();
        events.on(LifecycleEvent::BeforeInsert, Arc::new(create_id));
        ModelDescriptorBuilder {
            descriptor: ModelDescriptor {
                name,
                table_name: name.to_lowercase(),
                schema: None,
                events,
                hooks: DumpHooks::default(),
                dump_format: DumpFormat::default(),
                create_sql: None,
            },
            error: None,
        }
    }

    /// Quoted, optionally schema-qualified table name.
    pub fn qualified_table(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", quoted(schema), quoted(&self.table_name)),
            None => quoted(&self.table_name),
        }
    }
}

/// Quote identifier for PostgreSQL.
pub(crate) fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Builder for [`ModelDescriptor`]. Registration errors are held until `build`.
pub struct ModelDescriptorBuilder {
    descriptor: ModelDescriptor,
    error: Option<CrudError>,
}

impl ModelDescriptorBuilder {
    pub fn table(mut self, table_name: impl Into<String>) -> Self {
        self.descriptor.table_name = table_name.into();
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.descriptor.schema = Some(schema.into());
        self
    }

    pub fn dump_format(mut self, format: DumpFormat) -> Self {
        self.descriptor.dump_format = format;
        self
    }

    pub fn create_sql(mut self, sql: impl Into<String>) -> Self {
        self.descriptor.create_sql = Some(sql.into());
        self
    }

    pub fn on<F>(mut self, event: LifecycleEvent, callback: F) -> Self
    where
        F: Fn(&mut Attrs) -> Result<(), CrudError> + Send + Sync + 'static,
    {
        self.descriptor.events.on(event, Arc::new(callback));
        self
    }

    /// Register `callback` under each event name, e.g. `["before_insert", "before_update"]`.
    pub fn listen<F>(mut self, names: &[&str], callback: F) -> Self
    where
        F: Fn(&mut Attrs) -> Result<(), CrudError> + Send + Sync + 'static,
    {
        if self.error.is_none() {
            let callback: EventCallback = Arc::new(callback);
            if let Err(err) = self.descriptor.events.listen(names, callback) {
                self.error = Some(err);
            }
        }
        self
    }

    /// Transform the listed attributes before they are serialized.
    pub fn to_json<F>(mut self, keys: &[&str], transform: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.descriptor.hooks.to_json(keys, Arc::new(transform));
        self
    }

    /// Post-process the whole dumped mapping.
    pub fn post_dump<F>(mut self, processor: F) -> Self
    where
        F: Fn(Attrs) -> Attrs + Send + Sync + 'static,
    {
        self.descriptor.hooks.post_dump(Arc::new(processor));
        self
    }

    pub fn build(self) -> Result<ModelDescriptor, CrudError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.descriptor),
        }
    }
}
