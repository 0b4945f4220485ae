use bytes::Bytes;
use log::{debug, error, info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

use crate::domain::{errors::StoreError, store::LogStore, value_objects::Offset};
use crate::infrastructure::protocol::{Request, Response};

pub const DEFAULT_PORT: u16 = 8080;

/// Broker listener settings.
///
/// `pacing` is the delay inserted after each exchange on a kept-alive
/// connection, throttling reader polls; `Duration::ZERO` disables it.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub pacing: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            pacing: Duration::from_secs(1),
        }
    }
}

/// Cloneable trigger that stops the broker's accept loop.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    trigger: broadcast::Sender<()>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        // Nothing to do if the accept loop is already gone.
        let _ = self.trigger.send(());
    }
}

/// TCP front of the log: accepts connections and serves each one on its own
/// task against the shared store.
pub struct Broker {
    listener: TcpListener,
    local_addr: SocketAddr,
    store: Arc<dyn LogStore>,
    pacing: Duration,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl Broker {
    /// Bind the listener eagerly. Port 0 picks an ephemeral port, reported
    /// by `local_addr`.
    pub async fn bind(config: BrokerConfig, store: Arc<dyn LogStore>) -> io::Result<Self> {
        let listener = TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        Ok(Self {
            listener,
            local_addr,
            store,
            pacing: config.pacing,
            shutdown_tx,
            shutdown_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            trigger: self.shutdown_tx.clone(),
        }
    }

    /// Accept connections until the shutdown handle fires. Sessions already
    /// spawned are not cancelled; they drain on their own terms.
    pub async fn run(self) -> io::Result<()> {
        let mut shutdown_rx = self.shutdown_rx;
        info!("listening on {}", self.local_addr);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            info!("new connection from {}", addr);
                            let session =
                                Session::new(stream, addr, Arc::clone(&self.store), self.pacing);
                            tokio::spawn(session.run());
                        }
                        Err(e) => {
                            error!("failed to accept connection: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("shutdown requested, closing listener");
                    return Ok(());
                }
            }
        }
    }
}

/// One client connection. The session stays active across read polls and
/// closes after a metadata or write exchange, on any decode or send failure,
/// and when the peer disconnects.
struct Session {
    stream: TcpStream,
    peer: SocketAddr,
    store: Arc<dyn LogStore>,
    pacing: Duration,
}

impl Session {
    fn new(stream: TcpStream, peer: SocketAddr, store: Arc<dyn LogStore>, pacing: Duration) -> Self {
        Self {
            stream,
            peer,
            store,
            pacing,
        }
    }

    async fn run(mut self) {
        loop {
            let request = match Request::decode_opt(&mut self.stream).await {
                Ok(Some(request)) => request,
                Ok(None) => {
                    debug!("{} disconnected", self.peer);
                    return;
                }
                Err(e) => {
                    warn!("{}: dropping connection, invalid request: {}", self.peer, e);
                    return;
                }
            };
            debug!("{}: {} request", self.peer, request.kind());

            let keep_alive = request.keep_alive();
            let response = self.dispatch(request).await;

            if let Err(e) = response.encode(&mut self.stream).await {
                warn!(
                    "{}: failed to send {} response: {}",
                    self.peer,
                    response.kind(),
                    e
                );
                return;
            }

            // A failed read still keeps the session alive: the error went out
            // as a response and the keep-alive rule of the request applies.
            if !keep_alive {
                debug!("{}: closing after one-shot exchange", self.peer);
                return;
            }
            if !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
        }
    }

    async fn dispatch(&self, request: Request) -> Response {
        match request {
            Request::Metadata => Response::Metadata,
            Request::Read {
                topic,
                partition,
                last_offset,
            } => match self.store.read_after(&topic, partition, last_offset).await {
                Ok(Some(message)) => Response::Read {
                    offset: message.offset,
                    payload: message.payload,
                },
                Ok(None) => Response::Read {
                    offset: Offset::ZERO,
                    payload: Bytes::new(),
                },
                Err(e) => {
                    warn!(
                        "{}: read from {}:{} after {} failed: {}",
                        self.peer, topic, partition, last_offset, e
                    );
                    error_response(&e)
                }
            },
            Request::Write {
                topic,
                partition,
                payload,
            } => match self.store.append(&topic, partition, payload).await {
                Ok(offset) => {
                    debug!(
                        "{}: appended to {}:{} at offset {}",
                        self.peer, topic, partition, offset
                    );
                    Response::Write { offset }
                }
                Err(e) => {
                    warn!("{}: write to {}:{} failed: {}", self.peer, topic, partition, e);
                    error_response(&e)
                }
            },
        }
    }
}

fn error_response(err: &StoreError) -> Response {
    Response::Error {
        message: Bytes::from(err.to_string().into_bytes()),
    }
}
