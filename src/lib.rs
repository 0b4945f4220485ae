//! # Rivulet
//!
//! A minimal partitioned log broker speaking a length-prefixed binary
//! protocol, together with the client layer that talks to it.
//!
//! ## Architecture
//!
//! The crate splits into three layers:
//! - **Domain**: topics, partitions, offsets, messages, and the `LogStore`
//!   contract that any storage engine can stand behind
//! - **Infrastructure**: the wire codec, the in-memory store, and the TCP
//!   broker that serves each connection on its own task
//! - **Client**: producer and consumer resiliency on top of the same codec,
//!   with broker address resolution behind a trait
//!
//! ## Usage
//!
//! ```rust
//! use rivulet::client::{BootstrapResolver, Producer};
//! use rivulet::domain::PartitionId;
//! use rivulet::infrastructure::persistence::MemoryLogStore;
//! use rivulet::infrastructure::server::{Broker, BrokerConfig};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provision a topic and serve it on an ephemeral port
//!     let store = Arc::new(MemoryLogStore::new());
//!     store.provision_topic("greetings", 1)?;
//!
//!     let config = BrokerConfig {
//!         host: "127.0.0.1".to_string(),
//!         port: 0,
//!         pacing: Duration::ZERO,
//!     };
//!     let broker = Broker::bind(config, store).await?;
//!     let addr = broker.local_addr();
//!     let shutdown = broker.shutdown_handle();
//!     tokio::spawn(broker.run());
//!
//!     // Produce one message
//!     let resolver = Arc::new(BootstrapResolver::new(vec![addr.to_string()])?);
//!     let producer = Producer::new(resolver);
//!     let offset = producer
//!         .send_message("greetings", PartitionId::new(0), "hello")
//!         .await?;
//!     println!("stored at offset {}", offset);
//!
//!     shutdown.shutdown();
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod domain;
pub mod infrastructure;

// Re-export the types most callers need
pub use client::{
    BootstrapResolver, ClientError, ConsumerClient, ConsumerConfig, Producer, Record, Resolver,
};
pub use domain::entities::Message;
pub use domain::errors::StoreError;
pub use domain::store::LogStore;
pub use domain::value_objects::{Offset, PartitionId, TopicName, TopicPartition};
pub use infrastructure::persistence::MemoryLogStore;
pub use infrastructure::protocol::{Request, Response, WireError};
pub use infrastructure::server::{Broker, BrokerConfig, ShutdownHandle};
