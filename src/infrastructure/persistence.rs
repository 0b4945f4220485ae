use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::collections::HashSet;

use crate::domain::{
    entities::Message,
    errors::{Result, StoreError},
    store::LogStore,
    value_objects::*,
};

/// One partition's log: messages in append order plus the next offset to
/// hand out. Offsets are dense and start at 1, so the message at offset `o`
/// lives at index `o - 1`.
struct PartitionLog {
    messages: Vec<Message>,
    next_offset: u64,
}

impl PartitionLog {
    fn new() -> Self {
        Self {
            messages: Vec::new(),
            next_offset: 1,
        }
    }
}

/// In-memory `LogStore` keyed by topic and partition.
///
/// The provisioned topology (which topics exist and which partitions they
/// own) is tracked separately from the logs themselves. With
/// `enforce_existence` off (the default) an append to an unprovisioned pair
/// still runs the existence checks but ignores their result and lazily
/// materializes a log, while reads from that pair keep failing because the
/// pair was never provisioned. Turning the flag on makes appends fail the
/// same way reads do.
pub struct MemoryLogStore {
    topics: DashMap<TopicName, HashSet<PartitionId>>,
    logs: DashMap<TopicPartition, PartitionLog>,
    enforce_existence: bool,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::with_enforcement(false)
    }

    pub fn with_enforcement(enforce_existence: bool) -> Self {
        Self {
            topics: DashMap::new(),
            logs: DashMap::new(),
            enforce_existence,
        }
    }

    /// Create a topic with partitions `0..partitions`. Provisioning an
    /// existing topic widens it to at least that many partitions.
    pub fn provision_topic(&self, topic: impl Into<TopicName>, partitions: u32) -> Result<()> {
        let topic = topic.into();
        if topic.is_empty() {
            return Err(StoreError::InvalidTopic(
                "topic name must not be empty".to_string(),
            ));
        }
        let mut owned = self.topics.entry(topic).or_default();
        for id in 0..partitions {
            owned.insert(PartitionId::new(id));
        }
        Ok(())
    }

    fn require_provisioned(&self, topic: &TopicName, partition: PartitionId) -> Result<()> {
        match self.topics.get(topic) {
            None => Err(StoreError::UnknownTopic(topic.clone())),
            Some(owned) if !owned.contains(&partition) => Err(StoreError::UnknownPartition {
                topic: topic.clone(),
                partition,
            }),
            Some(_) => Ok(()),
        }
    }
}

impl Default for MemoryLogStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn topic_exists(&self, topic: &TopicName) -> Result<bool> {
        Ok(self.topics.contains_key(topic))
    }

    async fn partition_exists(&self, topic: &TopicName, partition: PartitionId) -> Result<bool> {
        Ok(self
            .topics
            .get(topic)
            .map(|owned| owned.contains(&partition))
            .unwrap_or(false))
    }

    async fn append(
        &self,
        topic: &TopicName,
        partition: PartitionId,
        payload: Bytes,
    ) -> Result<Offset> {
        let topic_known = self.topic_exists(topic).await?;
        let partition_known = self.partition_exists(topic, partition).await?;
        if self.enforce_existence {
            if !topic_known {
                return Err(StoreError::UnknownTopic(topic.clone()));
            }
            if !partition_known {
                return Err(StoreError::UnknownPartition {
                    topic: topic.clone(),
                    partition,
                });
            }
        }

        let tp = TopicPartition::new(topic.clone(), partition);
        // The entry guard serializes appends per partition, keeping offset
        // assignment atomic with the push.
        let mut log = self.logs.entry(tp).or_insert_with(PartitionLog::new);
        let offset = Offset::new(log.next_offset);
        log.next_offset += 1;
        log.messages
            .push(Message::new(offset, topic.clone(), partition, payload));
        Ok(offset)
    }

    async fn read_after(
        &self,
        topic: &TopicName,
        partition: PartitionId,
        last: Offset,
    ) -> Result<Option<Message>> {
        self.require_provisioned(topic, partition)?;
        let tp = TopicPartition::new(topic.clone(), partition);
        Ok(self.logs.get(&tp).and_then(|log| {
            // Dense offsets: the first message past `last` sits at index `last`.
            usize::try_from(last.value())
                .ok()
                .and_then(|idx| log.messages.get(idx))
                .cloned()
        }))
    }

    async fn latest(&self, topic: &TopicName, partition: PartitionId) -> Result<Option<Message>> {
        self.require_provisioned(topic, partition)?;
        let tp = TopicPartition::new(topic.clone(), partition);
        Ok(self
            .logs
            .get(&tp)
            .and_then(|log| log.messages.last().cloned()))
    }
}
