//! Order store against a real Redis server.
//!
//! Needs Docker; run with `cargo test -- --ignored`.

#![allow(clippy::unwrap_used)]

use order_store::domain::entities::Order;
use order_store::domain::value_objects::OrderId;
use order_store::infrastructure::kv::{
    AtomicBatch, Command, KeyValueBackend, RedisBackend, SetCondition,
};
use order_store::infrastructure::persistence::{
    CallContext, FindAllPage, OrderRepository, OrderStore, drain_all,
};
use std::collections::HashSet;
use std::sync::Arc;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage};

async fn start_redis() -> (ContainerAsync<GenericImage>, RedisBackend) {
    let container = GenericImage::new("redis", "7.2")
        .with_exposed_port(6379.tcp())
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"))
        .start()
        .await
        .unwrap();
    let host = container.get_host().await.unwrap();
    let port = container.get_host_port_ipv4(6379).await.unwrap();
    let backend = RedisBackend::connect(&format!("redis://{host}:{port}"))
        .await
        .unwrap();
    (container, backend)
}

#[tokio::test]
#[ignore = "requires docker"]
async fn guarded_batch_skips_dependents() {
    let (_container, backend) = start_redis().await;
    backend.ping().await.unwrap();

    let insert = |value: &[u8]| {
        AtomicBatch::guarded(Command::set("order:1", value.to_vec(), SetCondition::IfAbsent))
            .unwrap()
            .then(Command::sadd("orders", "order:1"))
            .unwrap()
    };
    assert!(backend.execute(insert(b"a")).await.unwrap().applied);

    let unindex = AtomicBatch::guarded(Command::srem("orders", "order:1")).unwrap();
    assert!(backend.execute(unindex).await.unwrap().applied);

    assert!(!backend.execute(insert(b"b")).await.unwrap().applied);
    let page = backend.sscan("orders", 0, "*", 10).await.unwrap();
    assert!(page.members.is_empty());
    assert_eq!(backend.get("order:1").await.unwrap(), Some(b"a".to_vec()));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn conditional_set_reports_outcome() {
    let (_container, backend) = start_redis().await;

    assert!(!backend.set("k", b"1", SetCondition::IfPresent).await.unwrap().applied);
    assert!(backend.set("k", b"1", SetCondition::IfAbsent).await.unwrap().applied);
    assert!(!backend.set("k", b"2", SetCondition::IfAbsent).await.unwrap().applied);
    assert!(backend.set("k", b"3", SetCondition::Always).await.unwrap().applied);

    let values = backend
        .mget(&["k".to_string(), "missing".to_string()])
        .await
        .unwrap();
    assert_eq!(values, vec![Some(b"3".to_vec()), None]);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn store_lifecycle_over_redis() {
    let (_container, backend) = start_redis().await;
    let store = OrderStore::new(Arc::new(backend));
    let ctx = CallContext::background();

    for id in 1..=150 {
        let order = Order::new(OrderId::new(id)).with_customer_id(format!("c{id}"));
        store.insert(&ctx, &order).await.unwrap();
    }
    assert!(
        store
            .insert(&ctx, &Order::new(OrderId::new(1)))
            .await
            .unwrap_err()
            .is_already_exists()
    );

    store
        .update(&ctx, &Order::new(OrderId::new(2)).with_customer_id("renamed"))
        .await
        .unwrap();
    assert_eq!(
        store.find_by_id(&ctx, OrderId::new(2)).await.unwrap().customer_id,
        "renamed"
    );

    store.delete_by_id(&ctx, OrderId::new(3)).await.unwrap();
    assert!(
        store
            .delete_by_id(&ctx, OrderId::new(3))
            .await
            .unwrap_err()
            .is_not_found()
    );

    let first = store.find_all(&ctx, FindAllPage::first(20)).await.unwrap();
    assert!(!first.is_last());

    let all = drain_all(&store, &ctx, 20).await.unwrap();
    let ids: HashSet<_> = all.iter().map(|o| o.order_id.get()).collect();
    assert_eq!(ids.len(), 149);
    assert!(!ids.contains(&3));
}
