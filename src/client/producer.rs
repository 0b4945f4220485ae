use bytes::Bytes;
use log::debug;
use std::sync::Arc;
use tokio::net::TcpStream;

use crate::domain::{Offset, PartitionId, TopicName};
use crate::infrastructure::protocol::{Request, Response};

use super::errors::{ClientError, Result};
use super::resolver::Resolver;

/// One-shot message sender.
///
/// Every send opens a fresh connection, performs a single write exchange and
/// drops the connection, successful or not. There are no retries; the caller
/// decides what a failed send is worth.
pub struct Producer {
    resolver: Arc<dyn Resolver>,
}

impl Producer {
    pub fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self { resolver }
    }

    /// Send one payload and return the offset the broker assigned.
    pub async fn send_message(
        &self,
        topic: impl Into<TopicName>,
        partition: PartitionId,
        payload: impl Into<Bytes>,
    ) -> Result<Offset> {
        let topic = topic.into();
        let addr = self.resolver.resolve(&topic, partition);
        debug!("sending to {}:{} via {}", topic, partition, addr);

        let mut stream = TcpStream::connect(&addr).await?;
        let request = Request::Write {
            topic,
            partition,
            payload: payload.into(),
        };
        request.encode(&mut stream).await?;

        match Response::decode(&mut stream).await? {
            Response::Write { offset } => Ok(offset),
            Response::Error { message } => Err(ClientError::Broker(
                String::from_utf8_lossy(&message).into_owned(),
            )),
            other => Err(ClientError::UnexpectedResponse {
                expected: "write",
                actual: other.kind(),
            }),
        }
    }
}
