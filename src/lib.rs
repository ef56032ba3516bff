//! # Order Store
//!
//! A transactional order repository over Redis.
//!
//! Each order is stored under its own key and listed in an index set so
//! the whole collection can be paged through with a cursor. Inserts and
//! deletes update both in one atomic step, gated on whether the record
//! was actually absent or present, so the index never references an order
//! that was not written by that insert and never keeps one that was deleted.
//!
//! ## Layers
//!
//! - [`domain`]: [`Order`](domain::entities::Order) and
//!   [`OrderId`](domain::value_objects::OrderId)
//! - [`infrastructure::kv`]: the key-value port with Redis and in-memory
//!   implementations
//! - [`infrastructure::persistence`]: [`OrderRepository`](infrastructure::persistence::OrderRepository)
//!   and [`OrderStore`](infrastructure::persistence::OrderStore)
//! - [`infrastructure::config`]: layered settings
//!
//! ## Quick Start
//!
//! ```ignore
//! use order_store::infrastructure::config::StoreConfig;
//! use order_store::infrastructure::kv::RedisBackend;
//! use order_store::infrastructure::persistence::{CallContext, OrderRepository, OrderStore};
//! use std::sync::Arc;
//!
//! let config = StoreConfig::from_env()?;
//! let backend = RedisBackend::connect(config.redis_url()).await?;
//! let store = OrderStore::from_config(Arc::new(backend), &config);
//!
//! let ctx = CallContext::background().with_timeout(config.operation_timeout());
//! let order = store.find_by_id(&ctx, 42.into()).await?;
//! ```

pub mod domain;
pub mod infrastructure;
