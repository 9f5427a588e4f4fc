use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use docscope::{
    CollectionMethod, Invocation, MemoryClient, RequiredFilter, Scope, ScopeConfig, ScopedDatabase, Value,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docscope")]
#[command(about = "Run scoped queries against a JSON document collection")]
struct Cli {
    /// JSON file holding an array of documents
    #[arg(long)]
    data: PathBuf,

    #[arg(long, default_value = "local")]
    database: String,

    #[arg(long, default_value = "documents")]
    collection: String,

    /// Required filter as a JSON document; overrides the config file
    #[arg(long)]
    scope: Option<String>,

    /// Scope configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bypass scoping and retry for this call
    #[arg(long)]
    unscoped: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Count {
        #[arg(long)]
        filter: Option<String>,
    },
    Find {
        #[arg(long)]
        filter: Option<String>,
        #[arg(long)]
        projection: Option<String>,
        #[arg(long)]
        limit: Option<u64>,
    },
    Distinct {
        #[arg(long)]
        key: String,
        #[arg(long)]
        filter: Option<String>,
    },
    Aggregate {
        #[arg(long)]
        pipeline: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output = run(&cli)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run(cli: &Cli) -> Result<Value> {
    let config = load_config(cli.config.as_deref(), cli.scope.as_deref())?;

    let client = MemoryClient::new();
    let raw = client.database(&cli.database).collection(&cli.collection)?;
    let loaded = raw.insert_documents(load_documents(&cli.data)?)?;
    info!(documents = loaded.len(), collection = %raw.full_name(), "loaded documents");

    let db = ScopedDatabase::new(client.database(&cli.database), Scope::from_config(&config)?);
    let collection = db.collection(&cli.collection)?;

    let (method, invocation) = match &cli.command {
        Command::Count { filter } => (
            CollectionMethod::Count,
            Invocation::new().arg(parse_json_opt("filter", filter.as_deref())?),
        ),
        Command::Find {
            filter,
            projection,
            limit,
        } => {
            let mut invocation = Invocation::new()
                .arg(parse_json_opt("filter", filter.as_deref())?)
                .arg(parse_json_opt("projection", projection.as_deref())?);
            if let Some(limit) = limit {
                invocation = invocation.kwarg("limit", *limit);
            }
            (CollectionMethod::Find, invocation)
        }
        Command::Distinct { key, filter } => (
            CollectionMethod::Distinct,
            Invocation::new()
                .arg(key.as_str())
                .arg(parse_json_opt("filter", filter.as_deref())?),
        ),
        Command::Aggregate { pipeline } => (
            CollectionMethod::Aggregate,
            Invocation::new().arg(parse_json("pipeline", pipeline)?),
        ),
    };

    let invocation = if cli.unscoped {
        invocation.escaped()
    } else {
        invocation
    };
    collection
        .invoke(method, invocation)
        .with_context(|| format!("{} failed", method.as_str()))
}

fn load_config(path: Option<&Path>, scope: Option<&str>) -> Result<ScopeConfig> {
    let mut config = match path {
        Some(path) => ScopeConfig::from_path(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ScopeConfig::default(),
    };
    if let Some(scope) = scope {
        config.required_filter = RequiredFilter::from_value(parse_json("scope", scope)?)?;
    }
    Ok(config)
}

fn load_documents(path: &Path) -> Result<Vec<Value>> {
    let input = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    match serde_json::from_str(&input)
        .with_context(|| format!("Failed to parse {}", path.display()))?
    {
        Value::Array(documents) => Ok(documents),
        other => Err(anyhow!(
            "{} must hold a JSON array of documents, found {}",
            path.display(),
            docscope::core::type_name(&other)
        )),
    }
}

fn parse_json(name: &str, input: &str) -> Result<Value> {
    serde_json::from_str(input).with_context(|| format!("--{} is not valid JSON", name))
}

fn parse_json_opt(name: &str, input: Option<&str>) -> Result<Value> {
    input
        .map(|input| parse_json(name, input))
        .transpose()
        .map(|value| value.unwrap_or(Value::Null))
}
