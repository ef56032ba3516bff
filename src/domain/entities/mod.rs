//! # Domain Entities
//!
//! - [`Order`]: the persisted order record
//! - [`LineItem`]: a single ordered item

pub mod order;

pub use order::{LineItem, Order};
