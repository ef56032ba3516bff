//! # Persistence Layer
//!
//! The order repository port and its key-value implementation.
//!
//! ## Repository Traits (Ports)
//!
//! - [`OrderRepository`]: insert, find, update, delete and paginated scan
//!
//! ## Implementations
//!
//! - [`OrderStore`]: orders over any [`KeyValueBackend`](crate::infrastructure::kv::KeyValueBackend)
//!
//! ## Supporting Types
//!
//! - [`CallContext`]: cancellation and deadline for each call
//! - [`OrderCodec`], [`JsonCodec`]: record serialization
//! - [`stream_all`], [`drain_all`]: cursor-following full scans

pub mod codec;
pub mod context;
pub mod order_store;
pub mod pagination;
pub mod traits;

pub use codec::{CodecError, JsonCodec, OrderCodec};
pub use context::CallContext;
pub use order_store::{KeySpace, OrderStore};
pub use pagination::{drain_all, stream_all};
pub use traits::{FindAllPage, FindResult, OrderRepository, RepositoryError, RepositoryResult};
