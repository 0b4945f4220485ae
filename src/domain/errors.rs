use thiserror::Error;

use super::value_objects::*;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by log store operations.
///
/// These become the text payload of an error reply on the wire, so Display
/// strings are the messages clients see.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown topic: {0}")]
    UnknownTopic(TopicName),

    #[error("unknown partition {partition} for topic {topic}")]
    UnknownPartition {
        topic: TopicName,
        partition: PartitionId,
    },

    #[error("invalid topic: {0}")]
    InvalidTopic(String),

    #[error("storage error: {0}")]
    Storage(String),
}
