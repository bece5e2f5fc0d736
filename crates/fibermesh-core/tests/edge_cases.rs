//! Lifecycle edge cases: restart, disposal, solo fibers

use std::time::Duration;

use serde_json::json;
use tokio::runtime::Handle;
use tokio::time::timeout;

use fibermesh_core::{FiberConfig, FiberError, FiberStatus, PeerAddr, PubSubFiber, SendOptions};

fn free_addr() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral");
    format!("127.0.0.1:{}", listener.local_addr().expect("local addr").port())
}

fn solo_config(publish: &str, monitor: bool) -> FiberConfig {
    let addrs = vec![PeerAddr::new(publish)];
    let refresh_addrs = addrs.clone();
    FiberConfig::builder()
        .publish_address(publish)
        .addresses(addrs)
        .refresh_addresses(move || {
            let addrs = refresh_addrs.clone();
            Box::pin(async move { Ok(addrs) })
        })
        .refresh_interval(Duration::from_secs(3600))
        .scheduler(Handle::current())
        .monitor_connections(monitor)
        .monitor_interval(Duration::from_millis(50))
        .build()
        .expect("valid config")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_then_start_restores_ready_state() {
    let addr = free_addr();
    let fiber = PubSubFiber::new(solo_config(&addr, false));

    fiber.start().await.expect("first start");
    let fresh = fiber.debug_info().await;
    assert!(fresh.publish_ready);
    assert!(fresh.subscribe_ready);

    fiber.stop().await;
    let stopped = fiber.debug_info().await;
    assert!(!stopped.publish_ready);
    assert!(!stopped.subscribe_ready);

    fiber.start().await.expect("restart");
    let restarted = fiber.debug_info().await;
    assert!(restarted.publish_ready);
    assert!(restarted.subscribe_ready);

    fiber.dispose().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_is_idempotent() {
    let addr = free_addr();
    let fiber = PubSubFiber::new(solo_config(&addr, false));

    fiber.start().await.expect("start");
    fiber.stop().await;
    fiber.stop().await;

    let info = fiber.debug_info().await;
    assert!(!info.publish_ready);
    assert!(!info.subscribe_ready);

    fiber.dispose().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_solo_fiber_confirms_immediately() {
    // A peer list containing only ourselves expects zero connections, so
    // the confirmation fires with an empty address list.
    let addr = free_addr();
    let fiber = PubSubFiber::new(solo_config(&addr, true));
    let mut status = fiber.status_channel();

    fiber.start().await.expect("start");

    let event = timeout(Duration::from_secs(5), status.recv())
        .await
        .expect("confirmation timed out")
        .expect("status stream open");
    assert_eq!(event, FiberStatus::SubsConnected { addresses: vec![] });

    fiber.dispose().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_send_while_stopped_is_dropped_not_queued() {
    let addr = free_addr();
    let fiber = PubSubFiber::new(solo_config(&addr, false));

    // Never started: egress has no ready publish side, so the envelope is
    // dropped. The send itself still succeeds and returns an id.
    let result = fiber.send(SendOptions::new("a", "remote", json!(1)));
    assert!(result.is_ok());

    // Starting afterwards must not replay the dropped envelope; nothing
    // here can observe it, which is the point: no queueing while unready.
    fiber.start().await.expect("start");
    fiber.dispose().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dispose_closes_mailboxes_and_denies_operations() {
    let addr = free_addr();
    let fiber = PubSubFiber::new(solo_config(&addr, false));
    let mut mailbox = fiber.register_entity("alice");

    fiber.start().await.expect("start");
    fiber.dispose().await;
    fiber.dispose().await;

    assert!(matches!(
        fiber.send(SendOptions::new("a", "alice", json!(1))),
        Err(FiberError::Disposed)
    ));
    assert!(matches!(fiber.start().await, Err(FiberError::Disposed)));

    // Registry was cleared, so the mailbox stream ends.
    let next = timeout(Duration::from_secs(1), mailbox.recv())
        .await
        .expect("mailbox should close promptly");
    assert!(next.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_bind_conflict_fails_start_and_can_retry_elsewhere() {
    let addr = free_addr();
    let holder = PubSubFiber::new(solo_config(&addr, false));
    holder.start().await.expect("holder start");

    // Second fiber on the same address: bind must fail and leave it
    // publish-unready.
    let contender = PubSubFiber::new(solo_config(&addr, false));
    let result = contender.start().await;
    assert!(matches!(result, Err(FiberError::Bind(_))));
    assert!(!contender.debug_info().await.publish_ready);
    contender.dispose().await;

    holder.dispose().await;
}
