//! # Repository Traits
//!
//! Port definitions for order persistence.
//!
//! [`OrderRepository`] is what callers (an HTTP handler, a CLI, a job)
//! program against. Failures are reported through [`RepositoryError`] only;
//! backend and codec error types never escape an implementation.
//!
//! # Examples
//!
//! ```ignore
//! use order_store::infrastructure::persistence::{CallContext, FindAllPage, OrderRepository};
//!
//! async fn list_everything(repo: &impl OrderRepository) {
//!     let ctx = CallContext::background();
//!     let mut page = FindAllPage::first(50);
//!     loop {
//!         let result = repo.find_all(&ctx, page).await.unwrap();
//!         println!("{} orders", result.orders.len());
//!         if result.is_last() {
//!             break;
//!         }
//!         page = page.next(result.cursor);
//!     }
//! }
//! ```

use crate::domain::entities::Order;
use crate::domain::value_objects::OrderId;
use crate::infrastructure::kv::BackendError;
use crate::infrastructure::persistence::context::CallContext;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Error type for repository operations.
#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    /// The operation required an existing record and none was found.
    #[error("order not found: {key}")]
    NotFound {
        /// Primary key that was looked up.
        key: String,
    },

    /// Insert targeted an id that already has a live record.
    #[error("order already exists: {key}")]
    AlreadyExists {
        /// Primary key that is taken.
        key: String,
    },

    /// Serialization or deserialization failed.
    #[error("{operation} {key}: encoding error: {message}")]
    Encoding {
        /// Store operation.
        operation: &'static str,
        /// Primary key involved.
        key: String,
        /// Codec message.
        message: String,
    },

    /// Transport or protocol failure talking to the backend.
    #[error("{operation} {key}: backend error: {message}")]
    Backend {
        /// Store operation.
        operation: &'static str,
        /// Key involved.
        key: String,
        /// Backend message.
        message: String,
        /// Whether the underlying failure is transient.
        retryable: bool,
    },

    /// The caller's context was canceled or its deadline passed.
    #[error("{operation}: canceled: {reason}")]
    Canceled {
        /// Store operation.
        operation: &'static str,
        /// Cancellation cause.
        reason: String,
    },
}

impl RepositoryError {
    /// Creates a not found error.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates an already exists error.
    #[must_use]
    pub fn already_exists(key: impl Into<String>) -> Self {
        Self::AlreadyExists { key: key.into() }
    }

    /// Creates an encoding error.
    #[must_use]
    pub fn encoding(
        operation: &'static str,
        key: impl Into<String>,
        message: impl fmt::Display,
    ) -> Self {
        Self::Encoding {
            operation,
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// Creates a backend error, keeping the backend's retry classification.
    #[must_use]
    pub fn backend(operation: &'static str, key: impl Into<String>, err: &BackendError) -> Self {
        Self::Backend {
            operation,
            key: key.into(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }

    /// Creates a canceled error.
    #[must_use]
    pub fn canceled(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Canceled {
            operation,
            reason: reason.into(),
        }
    }

    /// Returns true if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if this is an already exists error.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns true if this is a canceled error.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled { .. })
    }

    /// Returns true if a caller may retry with backoff.
    ///
    /// Only transient backend failures qualify; rejected commands and
    /// error replies fail the same way again. The store itself never retries.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend { retryable: true, .. })
    }
}

/// Result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Request for one step of [`OrderRepository::find_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FindAllPage {
    /// How many index entries to examine in this step. Advisory: a step
    /// may return more or fewer orders. `0` uses the store's default.
    pub limit: u64,
    /// Continuation token from the previous step; `0` starts a new scan.
    pub cursor: u64,
}

impl FindAllPage {
    /// First step of a new scan.
    #[must_use]
    pub fn first(limit: u64) -> Self {
        Self { limit, cursor: 0 }
    }

    /// The step following one that returned `cursor`.
    #[must_use]
    pub fn next(self, cursor: u64) -> Self {
        Self { cursor, ..self }
    }
}

/// One step of a paginated scan.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FindResult {
    /// Orders found in this step, in index scan order.
    pub orders: Vec<Order>,
    /// Cursor for the next step; `0` means the scan is complete.
    pub cursor: u64,
}

impl FindResult {
    /// Returns true if there are no further steps.
    ///
    /// An empty `orders` does not imply this; loop on the cursor.
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.cursor == 0
    }
}

/// Repository for orders.
///
/// Every operation takes a [`CallContext`] and returns
/// [`RepositoryError::Canceled`] if it is canceled before completing.
#[async_trait]
pub trait OrderRepository: Send + Sync + fmt::Debug {
    /// Inserts a new order and indexes it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::AlreadyExists` if the id has a live record;
    /// the index is left untouched in that case.
    async fn insert(&self, ctx: &CallContext, order: &Order) -> RepositoryResult<()>;

    /// Gets an order by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    async fn find_by_id(&self, ctx: &CallContext, id: OrderId) -> RepositoryResult<Order>;

    /// Replaces an existing order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist;
    /// nothing is created in that case.
    async fn update(&self, ctx: &CallContext, order: &Order) -> RepositoryResult<()>;

    /// Deletes an order and removes it from the index.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order did not exist.
    async fn delete_by_id(&self, ctx: &CallContext, id: OrderId) -> RepositoryResult<()>;

    /// Runs one step of a scan over all indexed orders.
    ///
    /// Results are best-effort across steps: orders inserted or deleted
    /// mid-scan may or may not appear.
    async fn find_all(&self, ctx: &CallContext, page: FindAllPage)
    -> RepositoryResult<FindResult>;
}
