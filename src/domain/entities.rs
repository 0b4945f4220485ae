use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::value_objects::*;

/// A message stored in a partition: the unit of data the broker moves.
///
/// The offset is assigned by the log store at append time and identifies the
/// message within its partition. Payloads are opaque bytes; the broker never
/// inspects them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub offset: Offset,
    pub topic: TopicName,
    pub partition: PartitionId,
    pub payload: Bytes,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(
        offset: Offset,
        topic: TopicName,
        partition: PartitionId,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            offset,
            topic,
            partition,
            payload: payload.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn topic_partition(&self) -> TopicPartition {
        TopicPartition::new(self.topic.clone(), self.partition)
    }

    /// Payload size in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}
