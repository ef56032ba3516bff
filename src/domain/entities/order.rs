//! # Order Entity
//!
//! The record persisted by the order store.
//!
//! Only [`Order::order_id`] is interpreted by persistence; every other field
//! is payload that travels through serialization unchanged. Fields this
//! version does not model are kept in [`Order::extra`] and written back
//! verbatim, so records produced by other writers survive a read-modify-write.
//!
//! # Examples
//!
//! ```
//! use order_store::domain::entities::Order;
//! use order_store::domain::value_objects::OrderId;
//!
//! let order = Order::new(OrderId::new(1)).with_customer_id("c1");
//! assert_eq!(order.order_id, OrderId::new(1));
//! assert_eq!(order.customer_id, "c1");
//! ```

use crate::domain::value_objects::OrderId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A single line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LineItem {
    /// Catalog item identifier.
    pub item_id: Uuid,
    /// Number of units.
    pub quantity: u32,
    /// Unit price in minor currency units.
    pub price: u64,
}

impl LineItem {
    /// Creates a new line item.
    #[must_use]
    pub fn new(item_id: Uuid, quantity: u32, price: u64) -> Self {
        Self {
            item_id,
            quantity,
            price,
        }
    }

    /// Returns `quantity * price`, saturating on overflow.
    #[must_use]
    pub fn total(&self) -> u64 {
        u64::from(self.quantity).saturating_mul(self.price)
    }
}

/// An order record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Order {
    /// Unique identifier, chosen by the caller before insert.
    pub order_id: OrderId,
    /// Customer that placed the order.
    #[serde(default)]
    pub customer_id: String,
    /// Ordered items.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub line_items: Vec<LineItem>,
    /// When the order was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// When the order was shipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipped_at: Option<DateTime<Utc>>,
    /// When the order was completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Fields not modelled above, preserved as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Order {
    /// Creates an empty order with the given identifier.
    #[must_use]
    pub fn new(order_id: OrderId) -> Self {
        Self {
            order_id,
            ..Self::default()
        }
    }

    /// Sets the customer identifier.
    #[must_use]
    pub fn with_customer_id(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = customer_id.into();
        self
    }

    /// Appends a line item.
    #[must_use]
    pub fn with_line_item(mut self, item: LineItem) -> Self {
        self.line_items.push(item);
        self
    }

    /// Sets the creation time.
    #[must_use]
    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    /// Marks the order as shipped at the given time.
    #[must_use]
    pub fn with_shipped_at(mut self, at: DateTime<Utc>) -> Self {
        self.shipped_at = Some(at);
        self
    }

    /// Marks the order as completed at the given time.
    #[must_use]
    pub fn with_completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(at);
        self
    }

    /// Sum of all line item totals, saturating on overflow.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.line_items
            .iter()
            .fold(0u64, |acc, item| acc.saturating_add(item.total()))
    }
}
