use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

use rivulet::client::{BootstrapResolver, ConsumerClient, ConsumerConfig, Producer};
use rivulet::domain::PartitionId;
use rivulet::infrastructure::protocol::{Request, Response};

#[derive(Parser)]
#[command(author, version, about = "Talk to a rivulet broker", long_about = None)]
struct Cli {
    /// Broker address
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    broker: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send one message and print the assigned offset
    Send {
        topic: String,

        #[arg(short, long, default_value_t = 0)]
        partition: u32,

        #[arg(short, long)]
        message: String,
    },
    /// Tail a partition, printing records until interrupted
    Listen {
        topic: String,

        #[arg(short, long, default_value_t = 0)]
        partition: u32,

        /// Print records as JSON lines
        #[arg(long)]
        json: bool,

        /// Poll interval in milliseconds
        #[arg(long, default_value_t = 1000)]
        poll_ms: u64,
    },
    /// Check broker liveness with a metadata exchange
    Ping,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Send {
            topic,
            partition,
            message,
        } => {
            let resolver = Arc::new(BootstrapResolver::new(vec![cli.broker])?);
            let producer = Producer::new(resolver);
            let offset = producer
                .send_message(topic, PartitionId::new(partition), message.into_bytes())
                .await?;
            println!("{}", offset);
        }
        Command::Listen {
            topic,
            partition,
            json,
            poll_ms,
        } => {
            let resolver = Arc::new(BootstrapResolver::new(vec![cli.broker])?);
            let config = ConsumerConfig {
                poll_interval: Duration::from_millis(poll_ms),
                ..ConsumerConfig::default()
            };
            let mut client = ConsumerClient::with_config(resolver, config);
            client
                .add_consumer(topic, PartitionId::new(partition), move |outcome| {
                    match outcome {
                        Ok(record) => {
                            if json {
                                let line = serde_json::json!({
                                    "offset": record.offset,
                                    "payload": String::from_utf8_lossy(&record.payload),
                                });
                                println!("{}", line);
                            } else {
                                println!(
                                    "{} {}",
                                    record.offset,
                                    String::from_utf8_lossy(&record.payload)
                                );
                            }
                        }
                        Err(e) => eprintln!("error: {}", e),
                    }
                })
                .await?;
            tokio::signal::ctrl_c().await?;
            client.shutdown().await;
        }
        Command::Ping => {
            let mut stream = TcpStream::connect(&cli.broker).await?;
            Request::Metadata.encode(&mut stream).await?;
            match Response::decode(&mut stream).await? {
                Response::Metadata => println!("ok"),
                other => anyhow::bail!("unexpected {} response to a metadata probe", other.kind()),
            }
        }
    }

    Ok(())
}
