//! # Domain Layer
//!
//! Order records and their identifiers. Nothing here knows how orders
//! are stored.

pub mod entities;
pub mod value_objects;
