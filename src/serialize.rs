//! Dump pipeline: projection, per-attribute transforms, whole-dict post-processors.

use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::{value::RawValue, Value};

use crate::error::CrudError;
use crate::kwargs::Attrs;

/// Prefix marking attributes that never leave the model.
pub const PRIVATE_PREFIX: char = '_';

pub type ValueTransform = Arc<dyn Fn(Value) -> Value + Send + Sync>;
pub type DictProcessor = Arc<dyn Fn(Attrs) -> Attrs + Send + Sync>;

/// Whether `dump` yields a mapping or its JSON text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DumpFormat {
    Dict,
    #[default]
    Text,
}

/// A dumped instance.
#[derive(Clone, Debug, PartialEq)]
pub enum Dumped {
    Dict(Attrs),
    Text(String),
}

impl Dumped {
    pub fn into_dict(self) -> Result<Attrs, CrudError> {
        match self {
            Dumped::Dict(attrs) => Ok(attrs),
            Dumped::Text(text) => Ok(serde_json::from_str(&text)?),
        }
    }

    pub fn into_text(self) -> Result<String, CrudError> {
        match self {
            Dumped::Dict(attrs) => Ok(serde_json::to_string(&attrs)?),
            Dumped::Text(text) => Ok(text),
        }
    }
}

impl Serialize for Dumped {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Dumped::Dict(attrs) => attrs.serialize(serializer),
            Dumped::Text(text) => {
                let raw = RawValue::from_string(text.clone()).map_err(serde::ser::Error::custom)?;
                raw.serialize(serializer)
            }
        }
    }
}

/// Serialization hooks of one model, applied in registration order.
#[derive(Clone, Default)]
pub struct DumpHooks {
    transforms: Vec<(Vec<String>, ValueTransform)>,
    processors: Vec<DictProcessor>,
}

impl DumpHooks {
    pub fn to_json(&mut self, keys: &[&str], transform: ValueTransform) {
        let keys = keys.iter().map(|k| (*k).to_string()).collect();
        self.transforms.push((keys, transform));
    }

    pub fn post_dump(&mut self, processor: DictProcessor) {
        self.processors.push(processor);
    }

    pub fn apply(&self, mut vals: Attrs) -> Attrs {
        for (keys, transform) in &self.transforms {
            for key in keys {
                if let Some(slot) = vals.get_mut(key) {
                    let current = std::mem::take(slot);
                    *slot = transform(current);
                }
            }
        }
        for processor in &self.processors {
            vals = processor(vals);
        }
        vals
    }
}

impl fmt::Debug for DumpHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<_> = self.transforms.iter().map(|(k, _)| k).collect();
        f.debug_struct("DumpHooks")
            .field("to_json", &keys)
            .field("post_dump", &self.processors.len())
            .finish()
    }
}

/// Serialize a model into attributes, all keys included.
pub fn to_attrs<T: Serialize>(model: &T) -> Result<Attrs, CrudError> {
    match serde_json::to_value(model)? {
        Value::Object(map) => Ok(map),
        other => Err(CrudError::shape(format!(
            "model must serialize to an object, got {}",
            other
        ))),
    }
}

/// Drop private attributes.
pub fn project(attrs: Attrs) -> Attrs {
    attrs
        .into_iter()
        .filter(|(k, _)| !k.starts_with(PRIVATE_PREFIX))
        .collect()
}

/// Run `hooks` over a projection and render it in `format`.
pub fn dump_with(hooks: &DumpHooks, vals: Attrs, format: DumpFormat) -> Result<Dumped, CrudError> {
    let vals = hooks.apply(vals);
    Ok(match format {
        DumpFormat::Dict => Dumped::Dict(vals),
        DumpFormat::Text => Dumped::Text(serde_json::to_string(&vals)?),
    })
}

/// Quote string values for `repr` output.
pub fn quote_if_str(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s),
        other => other.to_string(),
    }
}
