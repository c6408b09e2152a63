//! refdata CLI - people and product-type reference data as JSON
//!
//! Reads from Postgres and prints the shaped objects to stdout:
//! - `people <category>`: people of one category with their dynamic attributes
//! - `product-types`: every product type with its attribute names

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use refdata_core::{get_people, get_product_types, PgExecutor, RefdataConfig};
use serde::Serialize;
use tracing::info;

mod tracing_setup;

use tracing_setup::TracingConfig;

#[derive(Parser, Debug)]
#[command(
    name = "refdata",
    author,
    version,
    about = "Query people and product-type reference data as JSON"
)]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(long, global = true)]
    debug: bool,

    /// Config file (default: ~/.refdata/config.toml)
    #[arg(long, global = true, value_name = "PATH", env = "REFDATA_CONFIG")]
    config: Option<PathBuf>,

    /// Database URL, overriding config file and DATABASE_URL
    #[arg(long, global = true, value_name = "URL")]
    database_url: Option<String>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List people in a category with their attributes
    People {
        /// Category name, matched exactly (e.g. "customer")
        category: String,
    },
    /// List product types with their attribute names
    ProductTypes,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_setup::init(&TracingConfig { debug: cli.debug })?;

    let mut config = RefdataConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.database_url {
        config.database.url = Some(url);
    }

    let pool = config
        .database
        .connect()
        .await
        .context("Failed to connect to database")?;
    let executor = PgExecutor::new(pool);

    match cli.command {
        Commands::People { category } => {
            let people = get_people(&executor, &category).await?;
            info!(category = %category, count = people.len(), "fetched people");
            print_json(&people, cli.pretty)?;
        }
        Commands::ProductTypes => {
            let types = get_product_types(&executor).await?;
            info!(count = types.len(), "fetched product types");
            print_json(&types, cli.pretty)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}
