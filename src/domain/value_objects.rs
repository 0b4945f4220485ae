use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A topic name as carried on the wire: raw bytes, no encoding validation.
///
/// The protocol transmits topic names without inspecting them, so any byte
/// sequence (including non-UTF-8) is a valid identifier. Display output is
/// lossy and intended for logs only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicName(pub Bytes);

impl TopicName {
    pub fn new(name: impl Into<Bytes>) -> Self {
        TopicName(name.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for TopicName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl From<Bytes> for TopicName {
    fn from(name: Bytes) -> Self {
        TopicName(name)
    }
}

impl From<Vec<u8>> for TopicName {
    fn from(name: Vec<u8>) -> Self {
        TopicName(Bytes::from(name))
    }
}

impl From<&[u8]> for TopicName {
    fn from(name: &[u8]) -> Self {
        TopicName(Bytes::copy_from_slice(name))
    }
}

impl From<String> for TopicName {
    fn from(name: String) -> Self {
        TopicName(Bytes::from(name.into_bytes()))
    }
}

impl From<&str> for TopicName {
    fn from(name: &str) -> Self {
        TopicName(Bytes::copy_from_slice(name.as_bytes()))
    }
}

/// Identifier of a partition within a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionId(pub u32);

impl PartitionId {
    pub fn new(id: u32) -> Self {
        PartitionId(id)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PartitionId {
    fn from(id: u32) -> Self {
        PartitionId(id)
    }
}

/// Position of a message within a partition.
///
/// Offsets are assigned by the log store, start at 1, and increase by one
/// per append. `Offset::ZERO` is the sentinel for "no offset yet": consumers
/// poll with it to read from the beginning, and the broker answers with it
/// when a partition holds nothing newer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Offset(pub u64);

impl Offset {
    pub const ZERO: Offset = Offset(0);

    pub fn new(value: u64) -> Self {
        Offset(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Self {
        Offset(self.0 + 1)
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Offset {
    fn from(value: u64) -> Self {
        Offset(value)
    }
}

/// A (topic, partition) pair: the unit of ordering and offset assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicPartition {
    pub topic: TopicName,
    pub partition: PartitionId,
}

impl TopicPartition {
    pub fn new(topic: TopicName, partition: PartitionId) -> Self {
        Self { topic, partition }
    }
}

impl fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.topic, self.partition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_name_accepts_arbitrary_bytes() {
        let raw: &[u8] = &[0xff, 0xfe, 0x00, 0x41];
        let topic = TopicName::from(raw);
        assert_eq!(topic.as_bytes(), raw);
        assert_eq!(topic.len(), 4);
    }

    #[test]
    fn topic_name_display_is_lossy() {
        let topic = TopicName::from("orders");
        assert_eq!(topic.to_string(), "orders");

        let invalid = TopicName::from(&[0xff, 0xff][..]);
        assert_eq!(invalid.to_string(), "\u{fffd}\u{fffd}");
    }

    #[test]
    fn offset_next_increments() {
        assert_eq!(Offset::ZERO.next(), Offset::new(1));
        assert_eq!(Offset::new(41).next().value(), 42);
    }

    #[test]
    fn topic_partition_display() {
        let tp = TopicPartition::new(TopicName::from("events"), PartitionId::new(3));
        assert_eq!(tp.to_string(), "events:3");
    }
}
