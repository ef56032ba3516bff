//! # Order Store
//!
//! [`OrderRepository`] over any [`KeyValueBackend`].
//!
//! ## Layout
//!
//! - `order:<id>` holds the encoded order (the primary key).
//! - The set `orders` holds every live primary key (the index).
//!
//! A key is in the index exactly when its record exists. Insert and delete
//! keep this by submitting a guarded batch whose second write only runs
//! when the first one applied; update never touches the index.
//!
//! ## Pagination
//!
//! [`find_all`](OrderRepository::find_all) runs one `SSCAN` step over the
//! index and fetches the payloads with one `MGET`. `limit` is passed as the
//! scan `COUNT` hint, so pages are not exactly `limit` long and can be empty
//! before the scan ends. A key whose record disappeared between the scan
//! and the fetch is skipped.
//!
//! # Examples
//!
//! ```
//! use order_store::domain::entities::Order;
//! use order_store::domain::value_objects::OrderId;
//! use order_store::infrastructure::kv::InMemoryBackend;
//! use order_store::infrastructure::persistence::{CallContext, OrderRepository, OrderStore};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let store = OrderStore::new(Arc::new(InMemoryBackend::new()));
//! let ctx = CallContext::background();
//!
//! let order = Order::new(OrderId::new(1)).with_customer_id("c1");
//! store.insert(&ctx, &order).await?;
//! assert_eq!(store.find_by_id(&ctx, OrderId::new(1)).await?, order);
//! # Ok::<(), order_store::infrastructure::persistence::RepositoryError>(())
//! # }).unwrap();
//! ```

use crate::domain::entities::Order;
use crate::domain::value_objects::OrderId;
use crate::infrastructure::config::StoreConfig;
use crate::infrastructure::kv::{
    AtomicBatch, BackendError, Command, KeyValueBackend, SetCondition, WriteOutcome,
};
use crate::infrastructure::persistence::codec::{JsonCodec, OrderCodec};
use crate::infrastructure::persistence::context::CallContext;
use crate::infrastructure::persistence::traits::{
    FindAllPage, FindResult, OrderRepository, RepositoryError, RepositoryResult,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Default key prefix for order records.
pub const DEFAULT_KEY_PREFIX: &str = "order";

/// Default name of the index set.
pub const DEFAULT_INDEX_SET: &str = "orders";

/// Scan `COUNT` used when a page asks for `limit == 0`.
pub const DEFAULT_SCAN_COUNT: usize = 10;

/// Largest `COUNT` Redis accepts; bigger hints are clamped to it.
pub const MAX_SCAN_COUNT: u64 = i64::MAX.unsigned_abs();

/// Key naming for records and the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
    index_set: String,
}

impl KeySpace {
    /// Creates a key space.
    #[must_use]
    pub fn new(prefix: impl Into<String>, index_set: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            index_set: index_set.into(),
        }
    }

    /// Primary key of an order: `<prefix>:<id>`.
    #[must_use]
    pub fn primary_key(&self, id: OrderId) -> String {
        format!("{}:{}", self.prefix, id)
    }

    /// Name of the index set.
    #[must_use]
    pub fn index_set(&self) -> &str {
        &self.index_set
    }

    /// Pattern matching every primary key.
    #[must_use]
    pub fn scan_pattern(&self) -> String {
        format!("{}:*", self.prefix)
    }
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX, DEFAULT_INDEX_SET)
    }
}

/// Order repository over a key-value backend.
///
/// Stateless apart from its configuration; clones share the backend.
#[derive(Debug, Clone)]
pub struct OrderStore {
    backend: Arc<dyn KeyValueBackend>,
    codec: Arc<dyn OrderCodec>,
    keys: KeySpace,
    default_scan_count: usize,
}

impl OrderStore {
    /// Creates a store with the JSON codec and default key names.
    #[must_use]
    pub fn new(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self {
            backend,
            codec: Arc::new(JsonCodec),
            keys: KeySpace::default(),
            default_scan_count: DEFAULT_SCAN_COUNT,
        }
    }

    /// Creates a store using the key names and scan defaults from `config`.
    #[must_use]
    pub fn from_config(backend: Arc<dyn KeyValueBackend>, config: &StoreConfig) -> Self {
        Self::new(backend)
            .with_key_space(KeySpace::new(config.key_prefix(), config.index_set()))
            .with_default_scan_count(config.default_scan_count())
    }

    /// Replaces the codec.
    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn OrderCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Replaces the key naming.
    #[must_use]
    pub fn with_key_space(mut self, keys: KeySpace) -> Self {
        self.keys = keys;
        self
    }

    /// Sets the scan `COUNT` used for `limit == 0`. Zero is treated as one.
    #[must_use]
    pub fn with_default_scan_count(mut self, count: usize) -> Self {
        self.default_scan_count = count.max(1);
        self
    }

    /// The key naming in use.
    #[must_use]
    pub fn key_space(&self) -> &KeySpace {
        &self.keys
    }

    fn scan_count(&self, limit: u64) -> usize {
        if limit == 0 {
            self.default_scan_count
        } else {
            usize::try_from(limit.min(MAX_SCAN_COUNT)).unwrap_or(usize::MAX)
        }
    }

    fn encode(
        &self,
        operation: &'static str,
        key: &str,
        order: &Order,
    ) -> RepositoryResult<Vec<u8>> {
        self.codec
            .encode(order)
            .map_err(|e| RepositoryError::encoding(operation, key, e))
    }

    fn decode(
        &self,
        operation: &'static str,
        key: &str,
        bytes: &[u8],
    ) -> RepositoryResult<Order> {
        self.codec
            .decode(bytes)
            .map_err(|e| RepositoryError::encoding(operation, key, e))
    }

    /// Builds the guarded batch, discarding it if any command is rejected.
    fn batch(
        operation: &'static str,
        key: &str,
        guard: Command,
        dependent: Command,
    ) -> RepositoryResult<AtomicBatch> {
        AtomicBatch::guarded(guard)
            .and_then(|batch| batch.then(dependent))
            .map_err(|e| {
                tracing::warn!(operation, key, error = %e, "discarding batch before execute");
                RepositoryError::backend(operation, key, &e)
            })
    }

    async fn execute(
        &self,
        operation: &'static str,
        key: &str,
        batch: AtomicBatch,
    ) -> RepositoryResult<WriteOutcome> {
        self.backend
            .execute(batch)
            .await
            .map_err(|e| backend_error(operation, key, e))
    }
}

fn backend_error(operation: &'static str, key: &str, err: BackendError) -> RepositoryError {
    tracing::warn!(operation, key, error = %err, "backend call failed");
    RepositoryError::backend(operation, key, &err)
}

#[async_trait]
impl OrderRepository for OrderStore {
    #[tracing::instrument(skip_all, fields(order_id = %order.order_id))]
    async fn insert(&self, ctx: &CallContext, order: &Order) -> RepositoryResult<()> {
        const OP: &str = "insert";
        let key = self.keys.primary_key(order.order_id);
        let data = self.encode(OP, &key, order)?;
        let batch = Self::batch(
            OP,
            &key,
            Command::set(key.clone(), data, SetCondition::IfAbsent),
            Command::sadd(self.keys.index_set(), key.clone()),
        )?;

        let outcome = ctx.run(OP, self.execute(OP, &key, batch)).await?;
        if !outcome.applied {
            tracing::debug!(%key, "insert rejected: key exists");
            return Err(RepositoryError::already_exists(key));
        }
        tracing::debug!(%key, "order inserted");
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(order_id = %id))]
    async fn find_by_id(&self, ctx: &CallContext, id: OrderId) -> RepositoryResult<Order> {
        const OP: &str = "find_by_id";
        let key = self.keys.primary_key(id);
        let value = ctx
            .run(OP, async {
                self.backend
                    .get(&key)
                    .await
                    .map_err(|e| backend_error(OP, &key, e))
            })
            .await?;

        match value {
            Some(bytes) => self.decode(OP, &key, &bytes),
            None => Err(RepositoryError::not_found(key)),
        }
    }

    #[tracing::instrument(skip_all, fields(order_id = %order.order_id))]
    async fn update(&self, ctx: &CallContext, order: &Order) -> RepositoryResult<()> {
        const OP: &str = "update";
        let key = self.keys.primary_key(order.order_id);
        let data = self.encode(OP, &key, order)?;

        let outcome = ctx
            .run(OP, async {
                self.backend
                    .set(&key, &data, SetCondition::IfPresent)
                    .await
                    .map_err(|e| backend_error(OP, &key, e))
            })
            .await?;
        if !outcome.applied {
            tracing::debug!(%key, "update rejected: key missing");
            return Err(RepositoryError::not_found(key));
        }
        tracing::debug!(%key, "order updated");
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(order_id = %id))]
    async fn delete_by_id(&self, ctx: &CallContext, id: OrderId) -> RepositoryResult<()> {
        const OP: &str = "delete_by_id";
        let key = self.keys.primary_key(id);
        let batch = Self::batch(
            OP,
            &key,
            Command::del(key.clone()),
            Command::srem(self.keys.index_set(), key.clone()),
        )?;

        // The guard applies only if DEL removed a key.
        let outcome = ctx.run(OP, self.execute(OP, &key, batch)).await?;
        if !outcome.applied {
            tracing::debug!(%key, "delete rejected: key missing");
            return Err(RepositoryError::not_found(key));
        }
        tracing::debug!(%key, "order deleted");
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(cursor = page.cursor, limit = page.limit))]
    async fn find_all(
        &self,
        ctx: &CallContext,
        page: FindAllPage,
    ) -> RepositoryResult<FindResult> {
        const OP: &str = "find_all";
        let index = self.keys.index_set();
        let pattern = self.keys.scan_pattern();
        let count = self.scan_count(page.limit);

        ctx.run(OP, async {
            let scan = self
                .backend
                .sscan(index, page.cursor, &pattern, count)
                .await
                .map_err(|e| backend_error(OP, index, e))?;

            if scan.members.is_empty() {
                return Ok(FindResult {
                    orders: Vec::new(),
                    cursor: scan.cursor,
                });
            }

            let values = self
                .backend
                .mget(&scan.members)
                .await
                .map_err(|e| backend_error(OP, index, e))?;
            if values.len() != scan.members.len() {
                return Err(RepositoryError::backend(
                    OP,
                    index,
                    &BackendError::response(format!(
                        "MGET returned {} values for {} keys",
                        values.len(),
                        scan.members.len()
                    )),
                ));
            }

            let mut orders = Vec::with_capacity(values.len());
            for (key, value) in scan.members.iter().zip(values) {
                let Some(bytes) = value else {
                    tracing::debug!(%key, "indexed order missing at fetch; skipping");
                    continue;
                };
                orders.push(self.decode(OP, key, &bytes)?);
            }

            tracing::debug!(returned = orders.len(), next_cursor = scan.cursor, "page scanned");
            Ok(FindResult {
                orders,
                cursor: scan.cursor,
            })
        })
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::infrastructure::kv::InMemoryBackend;
    use crate::infrastructure::persistence::codec::CodecError;
    use std::time::Duration;

    fn setup() -> (OrderStore, InMemoryBackend, CallContext) {
        let backend = InMemoryBackend::new();
        let store = OrderStore::new(Arc::new(backend.clone()));
        (store, backend, CallContext::background())
    }

    fn order(id: u64) -> Order {
        Order::new(OrderId::new(id)).with_customer_id(format!("c{id}"))
    }

    #[test]
    fn key_space_defaults() {
        let keys = KeySpace::default();
        assert_eq!(keys.primary_key(OrderId::new(42)), "order:42");
        assert_eq!(keys.index_set(), "orders");
        assert_eq!(keys.scan_pattern(), "order:*");
    }

    #[tokio::test]
    async fn insert_writes_record_and_index() {
        let (store, backend, ctx) = setup();
        store.insert(&ctx, &order(1)).await.unwrap();

        assert!(backend.raw_get("order:1").await.is_some());
        assert_eq!(backend.members("orders").await, vec!["order:1".to_string()]);
    }

    #[tokio::test]
    async fn duplicate_insert_keeps_original_payload() {
        let (store, backend, ctx) = setup();
        store.insert(&ctx, &order(1)).await.unwrap();

        let replacement = Order::new(OrderId::new(1)).with_customer_id("someone-else");
        let err = store.insert(&ctx, &replacement).await.unwrap_err();
        assert!(err.is_already_exists());

        let stored = store.find_by_id(&ctx, OrderId::new(1)).await.unwrap();
        assert_eq!(stored.customer_id, "c1");
        assert_eq!(backend.members("orders").await.len(), 1);
    }

    #[tokio::test]
    async fn insert_over_unindexed_record_does_not_index_it() {
        let (store, backend, ctx) = setup();
        backend.raw_put("order:9", br#"{"OrderId":9}"#.to_vec()).await;

        let err = store.insert(&ctx, &order(9)).await.unwrap_err();
        assert!(err.is_already_exists());
        assert!(backend.members("orders").await.is_empty());
    }

    #[tokio::test]
    async fn find_missing_is_not_found() {
        let (store, _, ctx) = setup();
        let err = store.find_by_id(&ctx, OrderId::new(5)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { ref key } if key == "order:5"));
    }

    #[tokio::test]
    async fn corrupt_record_is_encoding_error() {
        let (store, backend, ctx) = setup();
        backend.raw_put("order:3", b"not json".to_vec()).await;

        let err = store.find_by_id(&ctx, OrderId::new(3)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Encoding { operation: "find_by_id", .. }));
    }

    #[tokio::test]
    async fn update_replaces_existing() {
        let (store, _, ctx) = setup();
        store.insert(&ctx, &order(2)).await.unwrap();

        let changed = order(2).with_customer_id("c2-renamed");
        store.update(&ctx, &changed).await.unwrap();
        assert_eq!(store.find_by_id(&ctx, OrderId::new(2)).await.unwrap(), changed);
    }

    #[tokio::test]
    async fn update_missing_creates_nothing() {
        let (store, backend, ctx) = setup();
        let err = store.update(&ctx, &order(4)).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_record_and_index_entry() {
        let (store, backend, ctx) = setup();
        store.insert(&ctx, &order(1)).await.unwrap();
        store.insert(&ctx, &order(2)).await.unwrap();

        store.delete_by_id(&ctx, OrderId::new(1)).await.unwrap();
        assert!(backend.raw_get("order:1").await.is_none());
        assert_eq!(backend.members("orders").await, vec!["order:2".to_string()]);
    }

    #[tokio::test]
    async fn delete_missing_is_not_found_and_leaves_index() {
        let (store, backend, ctx) = setup();
        backend.raw_add_member("orders", "order:8").await;

        let err = store.delete_by_id(&ctx, OrderId::new(8)).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(backend.members("orders").await, vec!["order:8".to_string()]);
    }

    #[tokio::test]
    async fn find_all_skips_record_deleted_after_scan() {
        let (store, backend, ctx) = setup();
        store.insert(&ctx, &order(1)).await.unwrap();
        store.insert(&ctx, &order(2)).await.unwrap();
        // Simulates a delete racing between SSCAN and MGET.
        backend.raw_remove("order:1").await;

        let result = store.find_all(&ctx, FindAllPage::first(100)).await.unwrap();
        assert!(result.is_last());
        assert_eq!(result.orders, vec![order(2)]);
    }

    #[tokio::test]
    async fn find_all_on_empty_store() {
        let (store, _, ctx) = setup();
        let result = store.find_all(&ctx, FindAllPage::first(10)).await.unwrap();
        assert!(result.orders.is_empty());
        assert!(result.is_last());
    }

    #[tokio::test]
    async fn find_all_zero_limit_uses_default_count() {
        let (store, _, ctx) = setup();
        for id in 1..=25 {
            store.insert(&ctx, &order(id)).await.unwrap();
        }
        let result = store.find_all(&ctx, FindAllPage::first(0)).await.unwrap();
        assert_eq!(result.orders.len(), DEFAULT_SCAN_COUNT);
        assert!(!result.is_last());
    }

    #[tokio::test]
    async fn find_all_huge_limit_is_clamped() {
        let (store, _, ctx) = setup();
        assert!(u64::try_from(store.scan_count(u64::MAX)).unwrap() <= MAX_SCAN_COUNT);
        assert_eq!(store.scan_count(7), 7);

        store.insert(&ctx, &order(1)).await.unwrap();
        let page = FindAllPage {
            limit: u64::MAX,
            cursor: 0,
        };
        let result = store.find_all(&ctx, page).await.unwrap();
        assert_eq!(result.orders.len(), 1);
        assert!(result.is_last());
    }

    #[tokio::test]
    async fn find_all_corrupt_payload_fails_page() {
        let (store, backend, ctx) = setup();
        store.insert(&ctx, &order(1)).await.unwrap();
        backend.raw_put("order:1", b"{".to_vec()).await;

        let err = store.find_all(&ctx, FindAllPage::first(10)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Encoding { ref key, .. } if key == "order:1"));
    }

    #[tokio::test]
    async fn backend_outage_is_backend_error() {
        let (store, backend, ctx) = setup();
        backend.set_available(false);

        let err = store.insert(&ctx, &order(1)).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(err, RepositoryError::Backend { operation: "insert", .. }));

        let err = store.find_all(&ctx, FindAllPage::first(10)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Backend { operation: "find_all", .. }));
    }

    #[tokio::test]
    async fn rejected_batch_is_not_retryable() {
        let backend = InMemoryBackend::new();
        let store = OrderStore::new(Arc::new(backend.clone()))
            .with_key_space(KeySpace::new("order", ""));
        let ctx = CallContext::background();

        let err = store.insert(&ctx, &order(1)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Backend { operation: "insert", .. }));
        assert!(!err.is_retryable());
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn wrong_type_reply_is_not_retryable() {
        let (store, backend, ctx) = setup();
        backend.raw_put("orders", b"not a set".to_vec()).await;

        let err = store.insert(&ctx, &order(1)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Backend { .. }));
        assert!(!err.is_retryable());
        assert!(backend.raw_get("order:1").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_cancels_without_writing() {
        let backend = InMemoryBackend::new().with_latency(Duration::from_secs(5));
        let store = OrderStore::new(Arc::new(backend.clone()));
        let ctx = CallContext::background().with_timeout(Duration::from_millis(100));

        let err = store.insert(&ctx, &order(1)).await.unwrap_err();
        assert!(err.is_canceled());
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn canceled_context_issues_no_calls() {
        let (store, backend, ctx) = setup();
        ctx.cancel();
        let err = store.insert(&ctx, &order(1)).await.unwrap_err();
        assert!(err.is_canceled());
        assert!(backend.is_empty());
    }

    #[derive(Debug)]
    struct FailingCodec;

    impl OrderCodec for FailingCodec {
        fn encode(&self, _order: &Order) -> Result<Vec<u8>, CodecError> {
            Err(CodecError::Encode("unsupported".to_string()))
        }

        fn decode(&self, _bytes: &[u8]) -> Result<Order, CodecError> {
            Err(CodecError::Decode("unsupported".to_string()))
        }
    }

    #[tokio::test]
    async fn encode_failure_writes_nothing() {
        let backend = InMemoryBackend::new();
        let store = OrderStore::new(Arc::new(backend.clone())).with_codec(Arc::new(FailingCodec));
        let ctx = CallContext::background();

        let err = store.insert(&ctx, &order(1)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Encoding { operation: "insert", .. }));
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn custom_key_space() {
        let backend = InMemoryBackend::new();
        let store = OrderStore::new(Arc::new(backend.clone()))
            .with_key_space(KeySpace::new("shop:order", "shop:orders"));
        let ctx = CallContext::background();

        store.insert(&ctx, &order(7)).await.unwrap();
        assert!(backend.raw_get("shop:order:7").await.is_some());
        assert_eq!(
            backend.members("shop:orders").await,
            vec!["shop:order:7".to_string()]
        );
        let result = store.find_all(&ctx, FindAllPage::first(10)).await.unwrap();
        assert_eq!(result.orders.len(), 1);
    }
}
