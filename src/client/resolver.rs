use crate::domain::{PartitionId, TopicName};

use super::errors::{ClientError, Result};

/// Maps a topic and partition to the address of the broker serving it.
///
/// Producers and consumers resolve before every connection attempt, so an
/// implementation backed by live cluster metadata can move partitions
/// between brokers without client restarts.
pub trait Resolver: Send + Sync {
    fn resolve(&self, topic: &TopicName, partition: PartitionId) -> String;
}

/// Resolver over a static bootstrap list: every lookup answers with the
/// first address.
pub struct BootstrapResolver {
    brokers: Vec<String>,
}

impl BootstrapResolver {
    pub fn new(brokers: Vec<String>) -> Result<Self> {
        if brokers.is_empty() {
            return Err(ClientError::EmptyBootstrapList);
        }
        Ok(Self { brokers })
    }
}

impl Resolver for BootstrapResolver {
    fn resolve(&self, _topic: &TopicName, _partition: PartitionId) -> String {
        self.brokers[0].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bootstrap_list_is_rejected() {
        let err = BootstrapResolver::new(Vec::new()).err();
        assert!(matches!(err, Some(ClientError::EmptyBootstrapList)));
    }

    #[test]
    fn resolves_to_first_broker() {
        let resolver =
            BootstrapResolver::new(vec!["10.0.0.1:8080".to_string(), "10.0.0.2:8080".to_string()])
                .expect("non-empty list");
        let addr = resolver.resolve(&TopicName::from("orders"), PartitionId::new(4));
        assert_eq!(addr, "10.0.0.1:8080");
    }
}
