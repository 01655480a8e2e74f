//! Lifecycle events and the per-model callback registry.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use strum::{Display, EnumIter, EnumString};

use crate::error::CrudError;
use crate::kwargs::Attrs;

/// Named points in a write at which registered callbacks run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum LifecycleEvent {
    BeforeInsert,
    AfterInsert,
    BeforeUpdate,
    AfterUpdate,
    BeforeDelete,
    AfterDelete,
}

/// Callback receiving the row attributes being written. Changes made in a
/// `before_*` callback are persisted.
pub type EventCallback = Arc<dyn Fn(&mut Attrs) -> Result<(), CrudError> + Send + Sync>;

#[derive(Clone, Default)]
pub struct EventRegistry {
    listeners: HashMap<LifecycleEvent, Vec<EventCallback>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&mut self, event: LifecycleEvent, callback: EventCallback) {
        self.listeners.entry(event).or_default().push(callback);
    }

    /// Register one callback under every named event. At least one name is required.
    pub fn listen(&mut self, names: &[&str], callback: EventCallback) -> Result<(), CrudError> {
        if names.is_empty() {
            return Err(CrudError::shape("event registration requires at least one event name"));
        }
        let events = names
            .iter()
            .map(|name| {
                LifecycleEvent::from_str(name).map_err(|_| CrudError::UnknownEvent((*name).to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        for event in events {
            self.on(event, Arc::clone(&callback));
        }
        Ok(())
    }

    pub fn listener_count(&self, event: LifecycleEvent) -> usize {
        self.listeners.get(&event).map_or(0, Vec::len)
    }

    /// Run callbacks for `event` in registration order; the first error stops the chain.
    pub fn dispatch(&self, event: LifecycleEvent, target: &mut Attrs) -> Result<(), CrudError> {
        if let Some(callbacks) = self.listeners.get(&event) {
            for callback in callbacks {
                callback(target)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: Vec<_> = self
            .listeners
            .iter()
            .map(|(event, cbs)| (event.to_string(), cbs.len()))
            .collect();
        counts.sort();
        f.debug_struct("EventRegistry").field("listeners", &counts).finish()
    }
}

/// Default `before_insert` callback: give the row a fresh UUID v4 identity.
/// Any id already on the row is replaced; identities come only from here.
pub fn create_id(target: &mut Attrs) -> Result<(), CrudError> {
    target.insert(
        "id".to_string(),
        serde_json::Value::String(uuid::Uuid::new_v4().to_string()),
    );
    Ok(())
}
