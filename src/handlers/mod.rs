//! HTTP handlers for model resources.

pub mod resource;
pub use resource::CrudResource;
