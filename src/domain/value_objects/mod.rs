//! # Value Objects
//!
//! Immutable types with validation and domain semantics.
//!
//! ## Identity Types
//!
//! - [`OrderId`]: caller-assigned numeric order identifier

pub mod ids;

pub use ids::OrderId;
