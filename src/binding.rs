//! Pre-bound CRUD operations.
//!
//! A [`Binding`] fixes the model and the keyword names an operation is
//! called with, then takes request keywords on top:
//!
//! ```rust,ignore
//! let get_foo = Binding::<Foo>::get().with("limit", Value::Null).with("bar", Value::Null);
//! let put_foo = Binding::<Foo>::put().with("foo_id", Value::Null).with("foo_data", Value::Null);
//! let reply = get_foo.call(query).await?;
//! ```

use std::fmt;
use std::marker::PhantomData;

use serde_json::Value;
use strum::{Display, EnumString};

use crate::contract::Model;
use crate::error::CrudError;
use crate::kwargs::Attrs;
use crate::response::Reply;
use crate::service::crud;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    Get,
    GetId,
    Post,
    Put,
    Delete,
}

pub struct Binding<M> {
    operation: Operation,
    defaults: Attrs,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Binding<M> {
    pub fn new(operation: Operation) -> Self {
        Binding {
            operation,
            defaults: Attrs::new(),
            _model: PhantomData,
        }
    }

    pub fn get() -> Self {
        Self::new(Operation::Get)
    }

    pub fn get_id() -> Self {
        Self::new(Operation::GetId)
    }

    pub fn post() -> Self {
        Self::new(Operation::Post)
    }

    pub fn put() -> Self {
        Self::new(Operation::Put)
    }

    pub fn delete() -> Self {
        Self::new(Operation::Delete)
    }

    /// Declare a keyword with its default value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Declared keyword names, in declaration order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.defaults.keys().map(String::as_str)
    }

    pub fn declares(&self, name: &str) -> bool {
        self.defaults.contains_key(name)
    }

    /// Defaults overlaid with `kwargs`. Declared keys keep their position.
    pub fn merged(&self, kwargs: Attrs) -> Attrs {
        let mut merged = self.defaults.clone();
        for (key, value) in kwargs {
            merged.insert(key, value);
        }
        merged
    }

    pub async fn call(&self, kwargs: Attrs) -> Result<Reply, CrudError> {
        let kwargs = self.merged(kwargs);
        match self.operation {
            Operation::Get => crud::get::<M>(kwargs).await,
            Operation::GetId => crud::get_id::<M>(kwargs).await,
            Operation::Post => crud::post::<M>(kwargs).await,
            Operation::Put => crud::put::<M>(kwargs).await,
            Operation::Delete => crud::delete::<M>(kwargs).await,
        }
    }
}

impl<M> Clone for Binding<M> {
    fn clone(&self) -> Self {
        Binding {
            operation: self.operation,
            defaults: self.defaults.clone(),
            _model: PhantomData,
        }
    }
}

impl<M> fmt::Debug for Binding<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("model", &std::any::type_name::<M>())
            .field("operation", &self.operation)
            .field("defaults", &self.defaults)
            .finish()
    }
}
