use async_trait::async_trait;
use bytes::Bytes;

use super::{entities::*, errors::Result, value_objects::*};

/// Storage abstraction for partitioned append-only logs.
///
/// The broker owns one `LogStore` and every connection shares it. Offsets are
/// assigned here, per partition, starting at 1 with no gaps. Implementations
/// must keep offset assignment atomic with the append itself so concurrent
/// writers on one partition never observe duplicate or missing offsets.
///
/// Provisioning (creating topics and partitions) is deliberately not part of
/// this contract; it belongs to the administrative layer around a concrete
/// store. The broker only reads and appends.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// True if the topic has been provisioned.
    async fn topic_exists(&self, topic: &TopicName) -> Result<bool>;

    /// True if the topic has been provisioned and owns this partition.
    async fn partition_exists(&self, topic: &TopicName, partition: PartitionId) -> Result<bool>;

    /// Append a payload to the partition and return the assigned offset.
    async fn append(
        &self,
        topic: &TopicName,
        partition: PartitionId,
        payload: Bytes,
    ) -> Result<Offset>;

    /// The oldest message with an offset strictly greater than `last`, or
    /// `None` when the partition holds nothing newer. Fails for topics and
    /// partitions that were never provisioned.
    async fn read_after(
        &self,
        topic: &TopicName,
        partition: PartitionId,
        last: Offset,
    ) -> Result<Option<Message>>;

    /// The most recently appended message, or `None` for an empty partition.
    /// Fails for topics and partitions that were never provisioned.
    async fn latest(&self, topic: &TopicName, partition: PartitionId) -> Result<Option<Message>>;
}
