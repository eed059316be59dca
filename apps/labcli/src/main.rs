use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use client_core::{
    ApiClient, CacheKey, CredentialProvider, EntityKind, FilterParams, MissingCredentialProvider,
    StaticCredential,
};
use model::domain::{ProtocolId, RunId};

mod config;

use config::load_settings;

#[derive(Parser, Debug)]
#[command(name = "labcli", about = "Command-line client for the labflow API")]
struct Cli {
    /// API base URL; overrides labflow.toml and LABFLOW_API_URL.
    #[arg(long)]
    api_url: Option<String>,
    /// Bearer credential; overrides labflow.toml and LABFLOW_TOKEN.
    #[arg(long)]
    token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe the server's unauthenticated health endpoint.
    Health,
    /// List protocols, one page at a time.
    Protocols {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Show one protocol as JSON.
    Protocol { id: i64 },
    /// List runs, one page at a time.
    Runs {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Show one run as JSON.
    Run { id: i64 },
    /// Instantiate a new run from a protocol and submit it.
    CreateRun {
        #[arg(long)]
        protocol_id: i64,
    },
    /// Delete (archive) a run.
    DeleteRun { id: i64 },
}

fn page_filters(page: u32) -> FilterParams {
    let mut filters = FilterParams::new();
    filters.insert("page".to_string(), page.to_string());
    filters
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();
    let settings = load_settings();

    let api_url = cli.api_url.unwrap_or(settings.api_url);
    let credentials: Arc<dyn CredentialProvider> = match cli.token.or(settings.token) {
        Some(token) => Arc::new(StaticCredential::new(token)),
        None => Arc::new(MissingCredentialProvider),
    };
    let client = ApiClient::new(api_url, credentials);

    match cli.command {
        Command::Health => {
            let health = client.health().await?;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
        Command::Protocols { page } => {
            let result = client.protocols(&page_filters(page)).await?;
            for protocol in &result.protocols {
                let id = protocol.id.map(|id| id.0).unwrap_or_default();
                println!("{id}\t{}", protocol.name.as_deref().unwrap_or("(unnamed)"));
            }
            if let Some(page_count) = result.page_count {
                println!("page {page} of {page_count}");
            }
        }
        Command::Protocol { id } => match client.protocol(ProtocolId(id)).await? {
            Some(protocol) => println!("{}", serde_json::to_string_pretty(&protocol)?),
            None => println!("protocol {id} not found"),
        },
        Command::Runs { page } => {
            let result = client.runs(&page_filters(page)).await?;
            for run in &result.runs {
                let id = run.id.map(|id| id.0).unwrap_or_default();
                let status = run
                    .status
                    .map(|status| serde_json::to_string(&status).unwrap_or_default())
                    .unwrap_or_else(|| "unknown".to_string());
                println!("{id}\t{}", status.trim_matches('"'));
            }
            if let Some(page_count) = result.page_count {
                println!("page {page} of {page_count}");
            }
        }
        Command::Run { id } => match client.run(RunId(id)).await? {
            Some(run) => println!("{}", serde_json::to_string_pretty(&run)?),
            None => println!("run {id} not found"),
        },
        Command::CreateRun { protocol_id } => {
            let Some(protocol) = client.protocol(ProtocolId(protocol_id)).await? else {
                bail!("protocol {protocol_id} not found");
            };
            let created = client.create_run(&protocol).await?;
            client.invalidate(&CacheKey::lists(EntityKind::Run)).await;
            match created.id {
                Some(id) => println!("created run {}", id.0),
                None => println!("run created, but the server returned no id"),
            }
        }
        Command::DeleteRun { id } => {
            client.delete_run(RunId(id)).await?;
            client.invalidate(&CacheKey::entity(EntityKind::Run, id.to_string())).await;
            client.invalidate(&CacheKey::lists(EntityKind::Run)).await;
            println!("deleted run {id}");
        }
    }

    Ok(())
}
