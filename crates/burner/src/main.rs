use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reqwest::{Client, Response};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

// ── CLI definition ─────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "burner", about = "Burner: secrets that burn after one read", version)]
struct Cli {
    /// Burner server URL (default: http://localhost:8080 or $BURNER_SERVER)
    #[arg(long, env = "BURNER_SERVER", default_value = "http://localhost:8080")]
    server: String,

    /// Admin bearer token for delete and count ($BURNER_TOKEN)
    #[arg(long, env = "BURNER_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Burner HTTP server
    Serve {
        /// Port to listen on (default: $BURNER_PORT or 8080)
        #[arg(long, env = "BURNER_PORT", default_value = "8080")]
        port: u16,
        /// Host to bind (default: $BURNER_HOST or 0.0.0.0)
        #[arg(long, env = "BURNER_HOST", default_value = "0.0.0.0")]
        host: String,
    },
    /// Store a secret and print its one-time code
    Create {
        /// The secret text
        secret: String,
        /// Passphrase required to read it back
        #[arg(long, env = "BURNER_PASSPHRASE", default_value = "")]
        passphrase: String,
        /// How long the secret stays readable, e.g. 5m, 1h, 7d
        #[arg(long, default_value = "5m")]
        ttl: String,
    },
    /// Show a secret's metadata without reading it
    Info {
        /// Secret code
        id: String,
    },
    /// Read a secret, destroying it
    Read {
        /// Secret code
        id: String,
        /// Passphrase the secret was created with
        #[arg(long, env = "BURNER_PASSPHRASE", default_value = "")]
        passphrase: String,
    },
    /// Delete a secret without reading it
    Delete {
        /// Secret code
        id: String,
    },
    /// Print how many secrets are stored
    Count,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.command {
        Commands::Serve { .. } => "info",
        _ => "warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("BURNER_LOG_LEVEL")
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let base = cli.server.trim_end_matches('/');
    let client = Client::new();

    match cli.command {
        Commands::Serve { port, host } => cmd_serve(host, port).await,

        Commands::Create {
            secret,
            passphrase,
            ttl,
        } => cmd_create(&client, base, &secret, &passphrase, &ttl).await,

        Commands::Info { id } => cmd_info(&client, base, &id).await,

        Commands::Read { id, passphrase } => cmd_read(&client, base, &id, &passphrase).await,

        Commands::Delete { id } => {
            let token = require_token(&cli.token)?;
            cmd_delete(&client, base, &token, &id).await
        }

        Commands::Count => {
            let token = require_token(&cli.token)?;
            cmd_count(&client, base, &token).await
        }
    }
}

// ── Command implementations ───────────────────────────────────────────────────

async fn cmd_serve(host: String, port: u16) -> Result<()> {
    let cfg = burner_server::ServerConfig {
        host,
        port,
        ..Default::default()
    };
    burner_server::run(cfg).await
}

async fn cmd_create(
    client: &Client,
    base: &str,
    secret: &str,
    passphrase: &str,
    ttl: &str,
) -> Result<()> {
    let ttl = parse_duration(ttl)?;
    let resp = client
        .post(format!("{base}/secrets"))
        .json(&json!({"secret": secret, "passphrase": passphrase, "ttl": ttl}))
        .send()
        .await
        .context("HTTP request failed")?;

    let json = expect_success(resp).await?;
    println!("{}", json["code"].as_str().unwrap_or_default());
    println!(
        "expires at {}",
        json["expires_at"].as_str().unwrap_or("unknown")
    );
    Ok(())
}

async fn cmd_info(client: &Client, base: &str, id: &str) -> Result<()> {
    let resp = client
        .get(format!("{base}/secrets/{id}"))
        .send()
        .await
        .context("HTTP request failed")?;

    let json = expect_success(resp).await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

async fn cmd_read(client: &Client, base: &str, id: &str, passphrase: &str) -> Result<()> {
    let resp = client
        .post(format!("{base}/secrets/{id}"))
        .json(&json!({"passphrase": passphrase}))
        .send()
        .await
        .context("HTTP request failed")?;

    let json = expect_success(resp).await?;
    match json["message"].as_str() {
        Some(message) => {
            println!("{message}");
            Ok(())
        }
        None => anyhow::bail!("{}", json["error"].as_str().unwrap_or("secret unavailable")),
    }
}

async fn cmd_delete(client: &Client, base: &str, token: &str, id: &str) -> Result<()> {
    let resp = client
        .delete(format!("{base}/secrets/{id}"))
        .bearer_auth(token)
        .send()
        .await
        .context("HTTP request failed")?;

    expect_success(resp).await?;
    println!("✓ deleted {id}");
    Ok(())
}

async fn cmd_count(client: &Client, base: &str, token: &str) -> Result<()> {
    let resp = client
        .get(format!("{base}/stats"))
        .bearer_auth(token)
        .send()
        .await
        .context("HTTP request failed")?;

    let json = expect_success(resp).await?;
    println!("{}", json["count"].as_u64().unwrap_or(0));
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn require_token(token: &Option<String>) -> Result<String> {
    token
        .clone()
        .context("--token / BURNER_TOKEN is required for this command")
}

/// Parse human duration strings like "5m", "1h", "7d" into seconds.
fn parse_duration(s: &str) -> Result<u64> {
    let d: humantime::Duration = s
        .parse()
        .with_context(|| format!("invalid duration: {s}"))?;
    Ok(d.as_secs())
}

async fn expect_success(resp: Response) -> Result<Value> {
    let status = resp.status();
    let json: Value = resp.json().await.unwrap_or_default();
    if !status.is_success() {
        anyhow::bail!(
            "server returned {status}: {}",
            json["error"].as_str().unwrap_or("")
        );
    }
    Ok(json)
}
