//! Queue Tester CLI Tool
//!
//! Command-line tool for exercising a running waypoint service over HTTP.
//!
//! Usage:
//!   cargo run --bin queue-tester -- --help
//!   cargo run --bin queue-tester join --uuid p1 --mode duel --lobby-server 10.0.0.2:7001
//!   cargo run --bin queue-tester fill --mode duel --count 8
//!   cargo run --bin queue-tester referrals --server lobby-1

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reqwest::Client;
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "queue-tester")]
#[command(about = "Drive a running waypoint matchmaking service over HTTP")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Base URL of the waypoint HTTP API
    #[arg(long, default_value = "http://localhost:8080")]
    url: String,

    /// Request timeout in milliseconds
    #[arg(long, default_value = "5000")]
    timeout_ms: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Join a player to a mode queue
    Join {
        #[arg(short, long)]
        uuid: String,
        #[arg(short, long)]
        mode: String,
        /// Server the player is queuing from
        #[arg(short, long, default_value = "")]
        lobby_server: String,
    },
    /// Remove a player from a mode queue
    Leave {
        #[arg(short, long)]
        uuid: String,
        #[arg(short, long)]
        mode: String,
    },
    /// Show a mode's queue size
    Size {
        #[arg(short, long)]
        mode: String,
    },
    /// Register a player's address and server
    Register {
        #[arg(short, long)]
        uuid: String,
        #[arg(short, long)]
        ip: String,
        #[arg(short, long)]
        server: String,
    },
    /// Drain the referral inbox of a server
    Referrals {
        #[arg(short, long)]
        server: String,
    },
    /// Register and join `count` synthetic players
    Fill {
        #[arg(short, long)]
        mode: String,
        #[arg(short, long, default_value = "2")]
        count: usize,
        /// Server the synthetic players are on
        #[arg(short, long, default_value = "lobby-1")]
        server: String,
        #[arg(long, default_value = "tester")]
        prefix: String,
    },
    /// Show service health
    Health,
}

struct QueueTester {
    client: Client,
    base_url: String,
}

impl QueueTester {
    fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .send()
            .await
            .with_context(|| format!("GET {} failed", path))?;
        Self::read(response).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {} failed", path))?;
        Self::read(response).await
    }

    async fn read(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body: Value = response.json().await.context("Response was not JSON")?;
        if !status.is_success() {
            anyhow::bail!("{}: {}", status, body);
        }
        Ok(body)
    }

    async fn join(&self, uuid: &str, mode: &str, lobby_server: &str) -> Result<Value> {
        self.post(
            "/queue/join",
            json!({ "uuid": uuid, "mode": mode, "lobbyServer": lobby_server }),
        )
        .await
    }

    async fn register(&self, uuid: &str, ip: &str, server: &str) -> Result<Value> {
        self.post(
            "/players/register",
            json!({ "player_uuid": uuid, "player_ip": ip, "server_id": server }),
        )
        .await
    }
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(_) => println!("{}", value),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let tester = QueueTester::new(&cli.url, Duration::from_millis(cli.timeout_ms))?;

    println!("🔌 Talking to waypoint at: {}", cli.url);

    match cli.command {
        Commands::Join {
            uuid,
            mode,
            lobby_server,
        } => {
            let response = tester.join(&uuid, &mode, &lobby_server).await?;
            println!("✅ {} queued for '{}'", uuid, mode);
            print_json(&response);
        }
        Commands::Leave { uuid, mode } => {
            let response = tester
                .post("/queue/leave", json!({ "uuid": uuid, "mode": mode }))
                .await?;
            if response["removed"] == json!(true) {
                println!("✅ {} left '{}'", uuid, mode);
            } else {
                println!("⚠️  {} was not waiting in '{}'", uuid, mode);
            }
        }
        Commands::Size { mode } => {
            let response = tester.get(&format!("/queue/{}/size", mode), &[]).await?;
            println!("📊 '{}' has {} waiting", mode, response["size"]);
        }
        Commands::Register { uuid, ip, server } => {
            tester.register(&uuid, &ip, &server).await?;
            println!("✅ Registered {} ({}) on {}", uuid, ip, server);
        }
        Commands::Referrals { server } => {
            let response = tester.get("/referrals", &[("server", server.as_str())]).await?;
            let count = response.as_array().map(Vec::len).unwrap_or(0);
            println!("📬 {} referrals for {}", count, server);
            print_json(&response);
        }
        Commands::Fill {
            mode,
            count,
            server,
            prefix,
        } => {
            for i in 0..count {
                let uuid = format!("{}-{}", prefix, i + 1);
                let ip = format!("10.99.{}.{}", i / 250, i % 250 + 1);
                tester.register(&uuid, &ip, &server).await?;
                let response = tester.join(&uuid, &mode, &server).await?;
                println!("  {} queued at position {}", uuid, response["position"]);
            }
            println!("✅ Queued {} players for '{}'", count, mode);
        }
        Commands::Health => {
            let response = tester.get("/health", &[]).await?;
            print_json(&response);
        }
    }

    Ok(())
}
