//! CRUD functions over any model satisfying the capability contract.

pub mod crud;
