//! ngsild CLI: talk to an NGSI-LD context broker.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use ngsild_client::api::{Client, EntityQuery, OnConflict};
use ngsild_client::config::ClientConfig;
use ngsild_client::model::Entity;

#[derive(Parser)]
#[command(name = "ngsild", version, about = "NGSI-LD context broker client")]
struct Cli {
    /// Client config file (default: $XDG_CONFIG_HOME/ngsild/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Broker root URL, overrides the config file.
    #[arg(long, global = true)]
    url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch an entity by id.
    Get {
        id: String,

        /// JSON-LD context URL sent as a Link header.
        #[arg(long)]
        ctx: Option<String>,

        /// Print the broker's document without decoding it as an entity.
        #[arg(long)]
        raw: bool,
    },

    /// Check whether an entity exists.
    Exists { id: String },

    /// Delete an entity.
    Delete { id: String },

    /// List entities by type and/or query expression.
    Query {
        #[arg(long = "type")]
        entity_type: Option<String>,

        /// NGSI-LD query expression, e.g. "temperature>20".
        #[arg(long)]
        q: Option<String>,

        #[arg(long)]
        ctx: Option<String>,

        #[arg(long, default_value = "0")]
        limit: usize,

        #[arg(long, default_value = "0")]
        offset: usize,
    },

    /// Count entities by type and/or query expression.
    Count {
        #[arg(long = "type")]
        entity_type: Option<String>,

        #[arg(long)]
        q: Option<String>,
    },

    /// Create an entity from a JSON-LD file.
    Create {
        file: PathBuf,

        /// Do nothing if the entity already exists.
        #[arg(long)]
        skip: bool,

        /// Replace the entity if it already exists.
        #[arg(long)]
        overwrite: bool,
    },

    /// Create an entity, replacing any existing one.
    Upsert { file: PathBuf },

    /// Replace an existing entity; does nothing if it does not exist.
    Update { file: PathBuf },
}

fn load_config(path: Option<&Path>, url: Option<String>) -> Result<ClientConfig> {
    let mut config = match path {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::load_or_default(&ClientConfig::default_path()?)?,
    };
    if let Some(url) = url {
        config.url = url;
    }
    Ok(config)
}

fn print_outcome(verb: &str, entity: Option<&Entity>) {
    match entity {
        Some(e) => println!("{verb} {}", e.id()),
        None => println!("nothing {verb}"),
    }
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.url)?;
    let client = Client::new(config);
    let entities = client.entities();

    match cli.command {
        Commands::Get { id, ctx, raw } => {
            let json = if raw {
                let value = entities.get_raw(id.as_str(), ctx.as_deref())?;
                serde_json::to_string_pretty(&value).into_diagnostic()?
            } else {
                entities.get(id.as_str(), ctx.as_deref())?.to_json_pretty()
            };
            println!("{json}");
        }

        Commands::Exists { id } => {
            let exists = entities.exists(id.as_str())?;
            println!("{exists}");
            if !exists {
                std::process::exit(1);
            }
        }

        Commands::Delete { id } => {
            entities.delete(id.as_str())?;
            println!("deleted {id}");
        }

        Commands::Query {
            entity_type,
            q,
            ctx,
            limit,
            offset,
        } => {
            let query = EntityQuery {
                entity_type,
                q,
                ctx,
                limit,
                offset,
            };
            let found = entities.query(&query)?;
            let values: Vec<_> = found.iter().map(|e| e.document().to_value()).collect();
            println!("{}", serde_json::to_string_pretty(&values).into_diagnostic()?);
        }

        Commands::Count { entity_type, q } => {
            let query = EntityQuery {
                entity_type,
                q,
                ..Default::default()
            };
            println!("{}", entities.count(&query)?);
        }

        Commands::Create {
            file,
            skip,
            overwrite,
        } => {
            let entity = Entity::load(&file)?;
            let on_conflict = if skip {
                OnConflict::Skip
            } else if overwrite {
                OnConflict::Overwrite
            } else {
                OnConflict::Fail
            };
            print_outcome("created", entities.create_with(&entity, on_conflict)?);
        }

        Commands::Upsert { file } => {
            let entity = Entity::load(&file)?;
            print_outcome("upserted", entities.upsert(&entity)?);
        }

        Commands::Update { file } => {
            let entity = Entity::load(&file)?;
            print_outcome("updated", entities.update(&entity, true)?);
        }
    }

    Ok(())
}
