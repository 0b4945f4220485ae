use clap::Parser;
use log::info;
use std::sync::Arc;
use std::time::Duration;

use rivulet::infrastructure::persistence::MemoryLogStore;
use rivulet::infrastructure::server::{Broker, BrokerConfig, DEFAULT_PORT};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host to bind the broker to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind the broker to
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Topic to provision at startup, repeatable
    #[arg(short, long = "topic", value_name = "NAME[:PARTITIONS]", value_parser = parse_topic_spec)]
    topics: Vec<TopicSpec>,

    /// Reject writes to topics and partitions that were never provisioned
    #[arg(long)]
    enforce_existence: bool,

    /// Delay between exchanges on a kept-alive connection, 0 to disable
    #[arg(long, default_value_t = 1000)]
    pacing_ms: u64,
}

#[derive(Debug, Clone)]
struct TopicSpec {
    name: String,
    partitions: u32,
}

fn parse_topic_spec(spec: &str) -> Result<TopicSpec, String> {
    let (name, partitions) = match spec.rsplit_once(':') {
        Some((name, count)) => {
            let partitions = count
                .parse::<u32>()
                .map_err(|_| format!("invalid partition count '{}'", count))?;
            (name, partitions)
        }
        None => (spec, 1),
    };
    if name.is_empty() {
        return Err("topic name must not be empty".to_string());
    }
    Ok(TopicSpec {
        name: name.to_string(),
        partitions,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();

    let store = Arc::new(MemoryLogStore::with_enforcement(args.enforce_existence));
    for spec in &args.topics {
        store.provision_topic(spec.name.as_str(), spec.partitions)?;
        info!(
            "provisioned topic {} with {} partitions",
            spec.name, spec.partitions
        );
    }

    let config = BrokerConfig {
        host: args.host,
        port: args.port,
        pacing: Duration::from_millis(args.pacing_ms),
    };
    let broker = Broker::bind(config, store).await?;
    info!("broker ready on {}", broker.local_addr());

    let shutdown = broker.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            shutdown.shutdown();
        }
    });

    broker.run().await?;
    Ok(())
}
