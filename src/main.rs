//! Provider registry CLI.
//!
//! Operates on an in-process document store persisted as a JSON snapshot.
//!
//! # Architecture Overview
//!
//! ```text
//!   CLI command
//!       │
//!       ▼
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │                          Services                             │
//!   │                                                               │
//!   │  ┌──────────────┐   ┌───────────────────┐   ┌──────────────┐  │
//!   │  │  credentials │──▶│     registry      │◀──│   defaults   │  │
//!   │  │  lifecycle   │   │ cache + feed task │   │  resolution  │  │
//!   │  └──────┬───────┘   └─────────┬─────────┘   └──────┬───────┘  │
//!   │         │                     │                    │          │
//!   │  ┌──────▼───────┐             │             ┌──────▼───────┐  │
//!   │  │    probes    │             │             │    audit     │  │
//!   │  │ + resilience │             │             │    sinks     │  │
//!   │  └──────────────┘             │             └──────────────┘  │
//!   └───────────────────────────────┼───────────────────────────────┘
//!                                   ▼
//!                          DocumentStore (snapshot)
//! ```

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use provider_registry::config::{load_config, RegistryConfig};
use provider_registry::credentials::{NewProvider, ProviderUpdate};
use provider_registry::observability::{logging, metrics};
use provider_registry::registry::parse_provider_type;
use provider_registry::store::MemoryStore;
use provider_registry::Services;

const DEFAULT_SNAPSHOT: &str = "providers.json";

#[derive(Parser)]
#[command(name = "provider-registry")]
#[command(about = "Manage external API provider credentials", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "PROVIDER_REGISTRY_CONFIG")]
    config: Option<PathBuf>,

    /// Store snapshot file. Overrides `store.snapshot_path`.
    #[arg(short, long, env = "PROVIDER_REGISTRY_STORE")]
    store: Option<PathBuf>,

    /// Actor recorded in audit events and metadata.
    #[arg(short, long, env = "PROVIDER_REGISTRY_ACTOR", default_value = "cli")]
    actor: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List cached active providers
    List {
        /// Restrict to one provider type (e.g. LLM)
        #[arg(long = "type")]
        provider_type: Option<String>,
    },
    /// Show one provider (key redacted)
    Show { id: String },
    /// Register a new provider
    Create {
        #[arg(long)]
        name: String,
        #[arg(long = "type")]
        provider_type: String,
        #[arg(long)]
        subtype: Option<String>,
        #[arg(long, env = "PROVIDER_API_KEY")]
        key: String,
        #[arg(long)]
        description: Option<String>,
        /// RFC 3339 timestamp or YYYY-MM-DD
        #[arg(long)]
        expiry: Option<String>,
        #[arg(long)]
        inactive: bool,
    },
    /// Update provider fields
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        subtype: Option<String>,
        #[arg(long)]
        key: Option<String>,
        #[arg(long)]
        active: Option<bool>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, conflicts_with = "clear_expiry")]
        expiry: Option<String>,
        #[arg(long)]
        clear_expiry: bool,
    },
    /// Rotate a provider's key, keeping the old one as previousKey
    Rotate {
        id: String,
        #[arg(long, env = "PROVIDER_API_KEY")]
        key: String,
    },
    /// Test a provider's key
    Test { id: String },
    /// Set or clear the default provider for a type
    SetDefault {
        #[arg(long = "type")]
        provider_type: String,
        #[arg(long)]
        subtype: Option<String>,
        /// Provider id; omit to clear the mapping
        #[arg(long)]
        provider: Option<String>,
    },
    /// Resolve the default provider for a type
    GetDefault {
        #[arg(long = "type")]
        provider_type: String,
        #[arg(long)]
        subtype: Option<String>,
    },
    /// Validate the configuration and print the effective settings
    CheckConfig,
}

impl Commands {
    fn mutates(&self) -> bool {
        matches!(
            self,
            Commands::Create { .. }
                | Commands::Update { .. }
                | Commands::Rotate { .. }
                | Commands::Test { .. }
                | Commands::SetDefault { .. }
        )
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RegistryConfig::default(),
    };
    logging::init(&config.observability);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    if let Commands::CheckConfig = cli.command {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let snapshot = cli
        .store
        .clone()
        .or_else(|| config.store.snapshot_path.clone().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT));
    let store = MemoryStore::load_from_file(&snapshot)?;
    let services = Services::build(&config, Arc::new(store.clone()));
    services.registry.initialize().await?;

    let result = run(&cli, &services).await;

    services.credentials.flush_access_log().await;
    services.registry.cleanup().await;
    if cli.command.mutates() {
        store.save_to_file()?;
    }
    result
}

async fn run(cli: &Cli, services: &Services) -> Result<(), Box<dyn std::error::Error>> {
    let actor = cli.actor.as_str();
    match &cli.command {
        Commands::List { provider_type } => {
            let filter = provider_type.as_deref().map(parse_provider_type).transpose()?;
            print_json(&services.registry.list_providers(filter))?;
        }
        Commands::Show { id } => {
            print_json(&services.registry.get_provider(id).await?)?;
        }
        Commands::Create {
            name,
            provider_type,
            subtype,
            key,
            description,
            expiry,
            inactive,
        } => {
            let input = NewProvider {
                name: Some(name.clone()),
                provider_type: Some(provider_type.clone()),
                subtype: subtype.clone(),
                key: Some(key.clone()),
                is_active: Some(!inactive),
                description: description.clone(),
                expiry_date: expiry.clone(),
            };
            print_json(&services.credentials.create_provider(input, actor).await?)?;
        }
        Commands::Update {
            id,
            name,
            subtype,
            key,
            active,
            description,
            expiry,
            clear_expiry,
        } => {
            let update = ProviderUpdate {
                name: name.clone(),
                subtype: subtype.clone(),
                key: key.clone(),
                is_active: *active,
                description: description.clone(),
                expiry_date: expiry.clone(),
                clear_expiry: *clear_expiry,
            };
            print_json(&services.credentials.update_provider(id, update, actor).await?)?;
        }
        Commands::Rotate { id, key } => {
            print_json(&services.credentials.rotate_api_key(id, key, actor).await?)?;
        }
        Commands::Test { id } => {
            print_json(&services.tester.test_api_key(id).await)?;
        }
        Commands::SetDefault {
            provider_type,
            subtype,
            provider,
        } => {
            services
                .defaults
                .set_default_provider(provider_type, provider.as_deref(), subtype.as_deref(), actor)
                .await?;
            println!("ok");
        }
        Commands::GetDefault {
            provider_type,
            subtype,
        } => {
            let view = services
                .defaults
                .get_default_provider(provider_type, subtype.as_deref())
                .await?;
            print_json(&view)?;
        }
        Commands::CheckConfig => {}
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
