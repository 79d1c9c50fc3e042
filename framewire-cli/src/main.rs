//! framewire-cli - Command-line interface for framewire
//!
//! Provides both a REPL and one-shot command execution.

mod commands;
mod repl;

use clap::{Parser, Subcommand};
use colored::Colorize;
use framewire_client::{Client, ConnectionConfig};
use framewire_protocol::SerializerAlgorithm;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "framewire-cli")]
#[command(about = "Command-line interface for framewire servers")]
#[command(version)]
struct Cli {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:8080", env = "FRAMEWIRE_SERVER")]
    server: SocketAddr,

    /// Payload serializer (binary or json)
    #[arg(long, default_value = "binary", env = "FRAMEWIRE_SERIALIZER")]
    serializer: SerializerAlgorithm,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive REPL
    Repl,

    /// Ping the server and print the round-trip time
    Ping {
        /// Number of pings to send
        #[arg(short, long, default_value = "1")]
        count: u32,
    },

    /// Greet the server
    Hello {
        /// Name to greet with
        #[arg(short, long)]
        name: String,

        /// Greeting text
        #[arg(short, long, default_value = "hello")]
        body: String,
    },

    /// Open concurrent connections that each send a stream of pings
    Load {
        /// Number of concurrent connections
        #[arg(short, long, default_value = "4")]
        connections: usize,

        /// Pings sent per connection
        #[arg(short, long, default_value = "1000")]
        requests: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = ConnectionConfig::new(cli.server).with_serializer(cli.serializer);

    match cli.command {
        Some(Commands::Repl) | None => {
            repl::run(Client::new(config)).await?;
        }
        Some(Commands::Load {
            connections,
            requests,
        }) => {
            let report = commands::load(config, connections, requests).await?;
            println!("{}", report);
        }
        Some(cmd) => {
            let client = Client::new(config);
            client.connect_and_listen().await.map_err(|e| {
                eprintln!("{}: {}", "Connection failed".red(), e);
                e
            })?;

            match commands::execute(&client, cmd).await {
                Ok(output) => println!("{}", output),
                Err(e) => {
                    eprintln!("{}: {}", "Error".red(), e);
                    std::process::exit(1);
                }
            }

            client.close().await?;
        }
    }

    Ok(())
}
