//! Producer and consumer behavior against live brokers: delivery, in-band
//! error surfacing, reconnection, and shutdown.

use bytes::Bytes;
use rivulet::client::{
    BootstrapResolver, ClientError, ConsumerClient, ConsumerConfig, Producer, Record,
};
use rivulet::domain::{LogStore, Offset, PartitionId, TopicName};
use rivulet::infrastructure::persistence::MemoryLogStore;
use rivulet::infrastructure::protocol::{Request, Response};
use rivulet::infrastructure::server::{Broker, BrokerConfig, ShutdownHandle};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

async fn start_broker(store: Arc<MemoryLogStore>) -> (SocketAddr, ShutdownHandle) {
    start_broker_on(store, 0).await
}

async fn start_broker_on(store: Arc<MemoryLogStore>, port: u16) -> (SocketAddr, ShutdownHandle) {
    let config = BrokerConfig {
        host: "127.0.0.1".to_string(),
        port,
        pacing: Duration::ZERO,
    };
    let broker = Broker::bind(config, store).await.expect("bind broker");
    let addr = broker.local_addr();
    let shutdown = broker.shutdown_handle();
    tokio::spawn(broker.run());
    (addr, shutdown)
}

async fn preload(store: &MemoryLogStore, topic: &str, payloads: &[&'static [u8]]) {
    store.provision_topic(topic, 1).expect("provision");
    for payload in payloads {
        store
            .append(
                &TopicName::from(topic),
                PartitionId::new(0),
                Bytes::from_static(payload),
            )
            .await
            .expect("preload append");
    }
}

fn resolver_for(addr: SocketAddr) -> Arc<BootstrapResolver> {
    Arc::new(BootstrapResolver::new(vec![addr.to_string()]).expect("resolver"))
}

fn fast_config() -> ConsumerConfig {
    ConsumerConfig {
        poll_interval: Duration::from_millis(20),
        reconnect_delay: Duration::from_millis(100),
        reconnect_retries: 2,
    }
}

type Outcome = Result<Record, ClientError>;

fn capture() -> (
    impl Fn(Outcome) + Send + Sync + 'static,
    mpsc::UnboundedReceiver<Outcome>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        move |outcome| {
            let _ = tx.send(outcome);
        },
        rx,
    )
}

async fn recv(rx: &mut mpsc::UnboundedReceiver<Outcome>) -> Outcome {
    tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("timed out waiting for a handler call")
        .expect("handler channel closed")
}

/// Answers exactly one poll with offset 1, waits for the next poll, and
/// vanishes, taking the port down with it.
async fn serve_one_poll_then_vanish(listener: TcpListener, payload: &'static [u8]) {
    let (mut stream, _) = listener.accept().await.expect("accept");
    match Request::decode(&mut stream).await.expect("first poll") {
        Request::Read { .. } => {
            Response::Read {
                offset: Offset::new(1),
                payload: Bytes::from_static(payload),
            }
            .encode(&mut stream)
            .await
            .expect("respond");
        }
        other => panic!("unexpected request: {:?}", other),
    }
    let _ = Request::decode(&mut stream).await;
}

#[tokio::test]
async fn producer_receives_assigned_offsets() {
    let store = Arc::new(MemoryLogStore::new());
    store.provision_topic("orders", 1).expect("provision");
    let (addr, _shutdown) = start_broker(store).await;

    let producer = Producer::new(resolver_for(addr));
    let first = producer
        .send_message("orders", PartitionId::new(0), "one")
        .await
        .expect("first send");
    let second = producer
        .send_message("orders", PartitionId::new(0), "two")
        .await
        .expect("second send");

    assert_eq!(first, Offset::new(1));
    assert_eq!(second, Offset::new(2));
}

#[tokio::test]
async fn producer_surfaces_broker_error_text() {
    let store = Arc::new(MemoryLogStore::with_enforcement(true));
    let (addr, _shutdown) = start_broker(store).await;

    let producer = Producer::new(resolver_for(addr));
    let err = producer
        .send_message("ghost", PartitionId::new(0), "m")
        .await
        .unwrap_err();

    match err {
        ClientError::Broker(text) => assert_eq!(text, "unknown topic: ghost"),
        other => panic!("expected broker error, got {}", other),
    }
}

#[tokio::test]
async fn producer_flags_unexpected_responses() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        let _ = Request::decode(&mut stream).await.expect("request");
        Response::Metadata
            .encode(&mut stream)
            .await
            .expect("respond");
    });

    let producer = Producer::new(resolver_for(addr));
    let err = producer
        .send_message("orders", PartitionId::new(0), "m")
        .await
        .unwrap_err();

    match err {
        ClientError::UnexpectedResponse { expected, actual } => {
            assert_eq!(expected, "write");
            assert_eq!(actual, "metadata");
        }
        other => panic!("expected unexpected-response error, got {}", other),
    }
}

#[tokio::test]
async fn consumer_delivers_preloaded_message() {
    let store = Arc::new(MemoryLogStore::new());
    preload(&store, "orders", &[b"hello"]).await;
    let (addr, _shutdown) = start_broker(store).await;

    let mut client = ConsumerClient::with_config(resolver_for(addr), fast_config());
    let (handler, mut rx) = capture();
    client
        .add_consumer("orders", PartitionId::new(0), handler)
        .await
        .expect("add consumer");
    assert_eq!(client.consumer_count(), 1);

    let record = recv(&mut rx).await.expect("delivery");
    assert_eq!(
        record,
        Record {
            offset: Offset::new(1),
            payload: Bytes::from_static(b"hello"),
        }
    );

    client.shutdown().await;
}

#[tokio::test]
async fn consumer_tails_new_messages_in_order() {
    let store = Arc::new(MemoryLogStore::new());
    store.provision_topic("orders", 1).expect("provision");
    let (addr, _shutdown) = start_broker(store).await;

    let mut client = ConsumerClient::with_config(resolver_for(addr), fast_config());
    let (handler, mut rx) = capture();
    client
        .add_consumer("orders", PartitionId::new(0), handler)
        .await
        .expect("add consumer");

    // Let the poller reach the empty partition before anything is written
    tokio::time::sleep(Duration::from_millis(60)).await;

    let producer = Producer::new(resolver_for(addr));
    for payload in ["a", "b", "c"] {
        producer
            .send_message("orders", PartitionId::new(0), payload)
            .await
            .expect("send");
    }

    for (expected_offset, expected_payload) in [(1u64, "a"), (2, "b"), (3, "c")] {
        let record = recv(&mut rx).await.expect("delivery");
        assert_eq!(record.offset, Offset::new(expected_offset));
        assert_eq!(record.payload, Bytes::copy_from_slice(expected_payload.as_bytes()));
    }

    client.shutdown().await;
}

#[tokio::test]
async fn consumer_reports_in_band_errors_and_recovers() {
    let store = Arc::new(MemoryLogStore::new());
    let (addr, _shutdown) = start_broker(Arc::clone(&store)).await;

    let mut client = ConsumerClient::with_config(resolver_for(addr), fast_config());
    let (handler, mut rx) = capture();
    client
        .add_consumer("late", PartitionId::new(0), handler)
        .await
        .expect("add consumer");

    // Polling an unprovisioned topic surfaces the broker's message
    match recv(&mut rx).await {
        Err(ClientError::Broker(text)) => assert_eq!(text, "unknown topic: late"),
        other => panic!("expected broker error, got {:?}", other),
    }

    // Provision and write; the same session starts delivering
    store.provision_topic("late", 1).expect("provision");
    store
        .append(&TopicName::from("late"), PartitionId::new(0), Bytes::from_static(b"now"))
        .await
        .expect("append");

    let record = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match rx.recv().await.expect("handler channel closed") {
                Ok(record) => break record,
                Err(ClientError::Broker(_)) => continue,
                Err(other) => panic!("unexpected client error: {}", other),
            }
        }
    })
    .await
    .expect("no delivery after provisioning");

    assert_eq!(
        record,
        Record {
            offset: Offset::new(1),
            payload: Bytes::from_static(b"now"),
        }
    );

    client.shutdown().await;
}

#[tokio::test]
async fn consumer_shutdown_stops_deliveries() {
    let store = Arc::new(MemoryLogStore::new());
    preload(&store, "orders", &[b"a"]).await;
    let (addr, _shutdown) = start_broker(Arc::clone(&store)).await;

    let mut client = ConsumerClient::with_config(resolver_for(addr), fast_config());
    let (handler, mut rx) = capture();
    client
        .add_consumer("orders", PartitionId::new(0), handler)
        .await
        .expect("add consumer");

    recv(&mut rx).await.expect("first delivery");

    tokio::time::timeout(Duration::from_secs(5), client.shutdown())
        .await
        .expect("shutdown hung");

    // New data after shutdown goes nowhere
    store
        .append(&TopicName::from("orders"), PartitionId::new(0), Bytes::from_static(b"b"))
        .await
        .expect("append");
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(rx.try_recv().is_err(), "handler called after shutdown");
}

/// After an outage, the poller reconnects and resumes from its cursor
/// instead of replaying from the beginning.
#[tokio::test]
async fn consumer_resumes_at_cursor_after_reconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let first_phase = tokio::spawn(serve_one_poll_then_vanish(listener, b"a"));

    let config = ConsumerConfig {
        poll_interval: Duration::from_millis(20),
        reconnect_delay: Duration::from_millis(300),
        reconnect_retries: 10,
    };
    let mut client = ConsumerClient::with_config(resolver_for(addr), config);
    let (handler, mut rx) = capture();
    client
        .add_consumer("orders", PartitionId::new(0), handler)
        .await
        .expect("add consumer");

    let first = recv(&mut rx).await.expect("first delivery");
    assert_eq!(first.offset, Offset::new(1));

    tokio::time::timeout(Duration::from_secs(5), first_phase)
        .await
        .expect("first phase hung")
        .expect("first phase task");
    let severed = Instant::now();

    // Same port, now a real broker holding history the consumer has
    // partially seen
    let store = Arc::new(MemoryLogStore::new());
    preload(&store, "orders", &[b"a", b"b"]).await;
    let (_addr, _shutdown) = start_broker_on(store, addr.port()).await;

    let second = recv(&mut rx).await.expect("post-reconnect delivery");
    assert_eq!(
        second,
        Record {
            offset: Offset::new(2),
            payload: Bytes::from_static(b"b"),
        }
    );
    // The poller waited its configured delay before dialing again
    assert!(
        severed.elapsed() >= Duration::from_millis(250),
        "reconnected after only {:?}",
        severed.elapsed()
    );

    client.shutdown().await;
}

/// Once the reconnection budget is spent the poller stays silent, even if
/// the broker later returns.
#[tokio::test]
async fn consumer_gives_up_after_reconnect_budget() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let first_phase = tokio::spawn(serve_one_poll_then_vanish(listener, b"a"));

    let config = ConsumerConfig {
        poll_interval: Duration::from_millis(20),
        reconnect_delay: Duration::from_millis(150),
        reconnect_retries: 2,
    };
    let mut client = ConsumerClient::with_config(resolver_for(addr), config);
    let (handler, mut rx) = capture();
    client
        .add_consumer("orders", PartitionId::new(0), handler)
        .await
        .expect("add consumer");

    recv(&mut rx).await.expect("first delivery");
    tokio::time::timeout(Duration::from_secs(5), first_phase)
        .await
        .expect("first phase hung")
        .expect("first phase task");

    // Both attempts (at ~150ms and ~300ms) find nothing listening
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let store = Arc::new(MemoryLogStore::new());
    preload(&store, "orders", &[b"a", b"b"]).await;
    let (_addr, _shutdown) = start_broker_on(store, addr.port()).await;

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(
        rx.try_recv().is_err(),
        "poller reconnected after its budget was spent"
    );

    tokio::time::timeout(Duration::from_secs(2), client.shutdown())
        .await
        .expect("shutdown hung on a finished poller");
}

#[tokio::test]
async fn shutdown_interrupts_reconnect_wait() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let first_phase = tokio::spawn(serve_one_poll_then_vanish(listener, b"a"));

    let config = ConsumerConfig {
        poll_interval: Duration::from_millis(20),
        reconnect_delay: Duration::from_secs(30),
        reconnect_retries: 10,
    };
    let mut client = ConsumerClient::with_config(resolver_for(addr), config);
    let (handler, mut rx) = capture();
    client
        .add_consumer("orders", PartitionId::new(0), handler)
        .await
        .expect("add consumer");

    recv(&mut rx).await.expect("first delivery");
    tokio::time::timeout(Duration::from_secs(5), first_phase)
        .await
        .expect("first phase hung")
        .expect("first phase task");

    // The poller is now deep inside a 30 second reconnect pause
    tokio::time::sleep(Duration::from_millis(100)).await;
    tokio::time::timeout(Duration::from_secs(2), client.shutdown())
        .await
        .expect("shutdown did not interrupt the reconnect wait");
}

#[tokio::test]
async fn add_consumer_reports_initial_connect_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let mut client = ConsumerClient::with_config(resolver_for(addr), fast_config());
    let (handler, _rx) = capture();
    let err = client
        .add_consumer("orders", PartitionId::new(0), handler)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Io(_)));
    assert_eq!(client.consumer_count(), 0);
    client.shutdown().await;
}
