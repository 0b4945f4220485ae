use bytes::Bytes;
use log::{debug, error, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::domain::{Offset, PartitionId, TopicName, TopicPartition};
use crate::infrastructure::protocol::{Request, Response, WireError};

use super::errors::{ClientError, Result};
use super::resolver::Resolver;

/// A delivered message as handlers see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub offset: Offset,
    pub payload: Bytes,
}

/// Callback invoked by a polling task for every in-band outcome: a
/// delivered message, or an error frame the broker sent in response to a
/// poll. Transport trouble is handled by the task itself and never reaches
/// the handler.
pub type RecordHandler = dyn Fn(Result<Record>) + Send + Sync + 'static;

/// Polling cadence and reconnection budget for consumer tasks.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Sleep between polls that returned nothing new.
    pub poll_interval: Duration,
    /// Sleep before each reconnection attempt.
    pub reconnect_delay: Duration,
    /// Reconnection attempts before a task gives up.
    pub reconnect_retries: u32,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            reconnect_delay: Duration::from_secs(30),
            reconnect_retries: 10,
        }
    }
}

/// Registry of polling tasks, one per subscribed (topic, partition).
///
/// Each task tails its partition over a long-lived connection, tracking the
/// last delivered offset so reconnections resume without skipping or
/// repeating messages. Dropping the client without calling [`shutdown`]
/// also stops the tasks, at their next pause.
///
/// [`shutdown`]: ConsumerClient::shutdown
pub struct ConsumerClient {
    resolver: Arc<dyn Resolver>,
    config: ConsumerConfig,
    tasks: HashMap<TopicPartition, JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ConsumerClient {
    pub fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self::with_config(resolver, ConsumerConfig::default())
    }

    pub fn with_config(resolver: Arc<dyn Resolver>, config: ConsumerConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            resolver,
            config,
            tasks: HashMap::new(),
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn consumer_count(&self) -> usize {
        self.tasks.len()
    }

    /// Connect to the partition's broker and start polling it from the
    /// beginning, handing every outcome to `handler`. A failure to establish
    /// the initial connection is returned here; after that, the task owns
    /// the connection and its recovery.
    pub async fn add_consumer<F>(
        &mut self,
        topic: impl Into<TopicName>,
        partition: PartitionId,
        handler: F,
    ) -> Result<()>
    where
        F: Fn(Result<Record>) + Send + Sync + 'static,
    {
        let topic = topic.into();
        let tp = TopicPartition::new(topic.clone(), partition);
        let addr = self.resolver.resolve(&topic, partition);
        let stream = TcpStream::connect(&addr).await?;
        debug!("consumer for {} connected to {}", tp, addr);

        let task = PollTask {
            topic,
            partition,
            config: self.config.clone(),
            resolver: Arc::clone(&self.resolver),
            handler: Box::new(handler),
            shutdown: self.shutdown_rx.clone(),
        };
        let handle = tokio::spawn(task.run(stream));
        if let Some(displaced) = self.tasks.insert(tp, handle) {
            // Re-subscribing a partition replaces its poller.
            displaced.abort();
        }
        Ok(())
    }

    /// Stop every polling task and wait for them to finish. The tasks drop
    /// their connections as they exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for (tp, handle) in self.tasks {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    error!("poller for {} ended abnormally: {}", tp, e);
                }
            }
        }
    }
}

/// What one poll exchange produced.
enum PollOutcome {
    /// A message was handed to the handler; the cursor advances.
    Delivered(Offset),
    /// The broker reported nothing past the cursor.
    NothingNew,
    /// The broker answered the poll with an error frame; it went to the
    /// handler and the session is still usable.
    BrokerFault,
    /// The connection is no longer usable.
    ConnectionLost(ClientError),
    /// The broker sent a frame that makes no sense for a poll.
    ProtocolViolation(ClientError),
}

enum Reconnect {
    Connected(TcpStream),
    Shutdown,
    Exhausted,
}

struct PollTask {
    topic: TopicName,
    partition: PartitionId,
    config: ConsumerConfig,
    resolver: Arc<dyn Resolver>,
    handler: Box<RecordHandler>,
    shutdown: watch::Receiver<bool>,
}

impl PollTask {
    async fn run(self, stream: TcpStream) {
        let PollTask {
            topic,
            partition,
            config,
            resolver,
            handler,
            mut shutdown,
        } = self;
        let tp = TopicPartition::new(topic.clone(), partition);
        let mut stream = stream;
        let mut last_offset = Offset::ZERO;

        loop {
            let outcome = tokio::select! {
                outcome = poll_once(&mut stream, &topic, partition, last_offset, handler.as_ref()) => outcome,
                _ = shutdown.changed() => {
                    debug!("poller for {} stopping", tp);
                    return;
                }
            };

            match outcome {
                PollOutcome::Delivered(offset) => {
                    last_offset = offset;
                }
                PollOutcome::NothingNew | PollOutcome::BrokerFault => {
                    if !pause(&mut shutdown, config.poll_interval).await {
                        debug!("poller for {} stopping", tp);
                        return;
                    }
                }
                PollOutcome::ConnectionLost(e) => {
                    warn!("poller for {} lost its connection: {}", tp, e);
                    match reconnect(&resolver, &topic, partition, &config, &mut shutdown).await {
                        Reconnect::Connected(fresh) => stream = fresh,
                        Reconnect::Shutdown => {
                            debug!("poller for {} stopping", tp);
                            return;
                        }
                        Reconnect::Exhausted => {
                            error!(
                                "poller for {} gave up after {} reconnection attempts",
                                tp, config.reconnect_retries
                            );
                            return;
                        }
                    }
                }
                PollOutcome::ProtocolViolation(e) => {
                    error!("poller for {} terminating: {}", tp, e);
                    return;
                }
            }
        }
    }
}

async fn poll_once(
    stream: &mut TcpStream,
    topic: &TopicName,
    partition: PartitionId,
    last_offset: Offset,
    handler: &RecordHandler,
) -> PollOutcome {
    let request = Request::Read {
        topic: topic.clone(),
        partition,
        last_offset,
    };
    if let Err(e) = request.encode(stream).await {
        return match e {
            WireError::Io(io) => PollOutcome::ConnectionLost(ClientError::Io(io)),
            other => PollOutcome::ProtocolViolation(other.into()),
        };
    }

    match Response::decode(stream).await {
        Ok(Response::Read { offset, payload }) => {
            if offset == Offset::ZERO {
                PollOutcome::NothingNew
            } else {
                handler(Ok(Record { offset, payload }));
                PollOutcome::Delivered(offset)
            }
        }
        Ok(Response::Error { message }) => {
            handler(Err(ClientError::Broker(
                String::from_utf8_lossy(&message).into_owned(),
            )));
            PollOutcome::BrokerFault
        }
        Ok(other) => PollOutcome::ProtocolViolation(ClientError::UnexpectedResponse {
            expected: "read",
            actual: other.kind(),
        }),
        Err(WireError::Io(e)) => PollOutcome::ConnectionLost(ClientError::Io(e)),
        Err(e) => PollOutcome::ProtocolViolation(e.into()),
    }
}

async fn reconnect(
    resolver: &Arc<dyn Resolver>,
    topic: &TopicName,
    partition: PartitionId,
    config: &ConsumerConfig,
    shutdown: &mut watch::Receiver<bool>,
) -> Reconnect {
    for attempt in 1..=config.reconnect_retries {
        if !pause(shutdown, config.reconnect_delay).await {
            return Reconnect::Shutdown;
        }
        let addr = resolver.resolve(topic, partition);
        match TcpStream::connect(&addr).await {
            Ok(stream) => {
                debug!(
                    "reconnected to {} for {}:{} on attempt {}",
                    addr, topic, partition, attempt
                );
                return Reconnect::Connected(stream);
            }
            Err(e) => {
                warn!(
                    "reconnection attempt {}/{} to {} failed: {}",
                    attempt, config.reconnect_retries, addr, e
                );
            }
        }
    }
    Reconnect::Exhausted
}

/// Sleep that ends early on shutdown. False means stop polling.
async fn pause(shutdown: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = shutdown.changed() => false,
    }
}
