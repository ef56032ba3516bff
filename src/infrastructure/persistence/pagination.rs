//! # Scan Helpers
//!
//! Cursor-following traversal over [`OrderRepository::find_all`].
//!
//! Both helpers stop when the cursor returns to `0`, never on an empty
//! page: a sparse index can yield empty pages mid-scan.

use crate::domain::entities::Order;
use crate::infrastructure::persistence::context::CallContext;
use crate::infrastructure::persistence::traits::{
    FindAllPage, FindResult, OrderRepository, RepositoryError, RepositoryResult,
};
use futures::{Stream, TryStreamExt, stream};
use std::collections::HashSet;

/// Streams every page of a full scan.
///
/// `page_size` is the advisory `limit` of each step.
pub fn stream_all<'a, R>(
    repo: &'a R,
    ctx: &'a CallContext,
    page_size: u64,
) -> impl Stream<Item = RepositoryResult<FindResult>> + 'a
where
    R: OrderRepository + ?Sized,
{
    stream::try_unfold(Some(0u64), move |next| async move {
        let Some(cursor) = next else {
            return Ok::<_, RepositoryError>(None);
        };
        let result = repo
            .find_all(ctx, FindAllPage::first(page_size).next(cursor))
            .await?;
        let next = if result.is_last() {
            None
        } else {
            Some(result.cursor)
        };
        Ok(Some((result, next)))
    })
}

/// Collects every indexed order.
///
/// An incremental scan may report the same key more than once; duplicates
/// are dropped by id, keeping the first occurrence.
///
/// # Errors
///
/// Returns the first error from any page.
pub async fn drain_all<R>(
    repo: &R,
    ctx: &CallContext,
    page_size: u64,
) -> RepositoryResult<Vec<Order>>
where
    R: OrderRepository + ?Sized,
{
    let mut seen = HashSet::new();
    let mut orders = Vec::new();
    let mut pages = std::pin::pin!(stream_all(repo, ctx, page_size));
    while let Some(page) = pages.try_next().await? {
        for order in page.orders {
            if seen.insert(order.order_id) {
                orders.push(order);
            }
        }
    }
    tracing::debug!(count = orders.len(), "scan drained");
    Ok(orders)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::value_objects::OrderId;
    use crate::infrastructure::kv::InMemoryBackend;
    use crate::infrastructure::persistence::order_store::OrderStore;
    use futures::StreamExt;
    use std::sync::Arc;

    #[tokio::test]
    async fn stream_ends_after_last_page() {
        let store = OrderStore::new(Arc::new(InMemoryBackend::new()));
        let ctx = CallContext::background();
        for id in 0..12 {
            store.insert(&ctx, &Order::new(OrderId::new(id))).await.unwrap();
        }

        let pages: Vec<_> = stream_all(&store, &ctx, 5).collect().await;
        assert!(pages.len() >= 3);
        let last = pages.last().unwrap().as_ref().unwrap();
        assert!(last.is_last());
        let total: usize = pages.iter().map(|p| p.as_ref().unwrap().orders.len()).sum();
        assert_eq!(total, 12);
    }

    #[tokio::test]
    async fn empty_store_yields_one_empty_page() {
        let store = OrderStore::new(Arc::new(InMemoryBackend::new()));
        let ctx = CallContext::background();
        let pages: Vec<_> = stream_all(&store, &ctx, 5).collect().await;
        assert_eq!(pages.len(), 1);
        assert!(drain_all(&store, &ctx, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn drain_stops_on_error() {
        let backend = InMemoryBackend::new();
        let store = OrderStore::new(Arc::new(backend.clone()));
        let ctx = CallContext::background();
        store.insert(&ctx, &Order::new(OrderId::new(1))).await.unwrap();
        backend.set_available(false);

        let err = drain_all(&store, &ctx, 5).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn works_through_trait_object() {
        let store: Arc<dyn OrderRepository> =
            Arc::new(OrderStore::new(Arc::new(InMemoryBackend::new())));
        let ctx = CallContext::background();
        store.insert(&ctx, &Order::new(OrderId::new(3))).await.unwrap();
        let all = drain_all(store.as_ref(), &ctx, 1).await.unwrap();
        assert_eq!(all.len(), 1);
    }
}
