//! # Key-Value Backends
//!
//! The storage port and its implementations.
//!
//! ## Port
//!
//! - [`KeyValueBackend`]: get/set/mget/sscan plus atomic guarded batches
//!
//! ## Implementations
//!
//! - [`RedisBackend`]: Redis over a `ConnectionManager`
//! - [`InMemoryBackend`]: in-process fake for tests

pub mod error;
pub mod in_memory;
pub mod redis_backend;
pub mod traits;

pub use error::{BackendError, BackendResult};
pub use in_memory::InMemoryBackend;
pub use redis_backend::RedisBackend;
pub use traits::{AtomicBatch, Command, KeyValueBackend, ScanPage, SetCondition, WriteOutcome};
