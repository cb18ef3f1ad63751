use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use rowforge_core::{Error as CoreError, SchemaSource, population_order};
use rowforge_populate::{Orchestrator, PopulateOptions};
use rowforge_postgres::{PostgresDestination, PostgresSource};

#[derive(Debug, Error)]
enum CliError {
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("report error: {0}")]
    Report(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Parser, Debug)]
#[command(name = "rowforge", version, about = "Schema-driven synthetic data generator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Populate every table with synthetic rows.
    Populate(PopulateArgs),
    /// Print the catalog and the population order.
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
struct ConnectionArgs {
    /// Database connection string; falls back to DATABASE_URL.
    #[arg(long, value_name = "CONNECTION_STRING")]
    conn: Option<String>,
    /// Schema to introspect and populate.
    #[arg(long, default_value = "public")]
    schema: String,
}

#[derive(Args, Debug)]
struct PopulateArgs {
    #[command(flatten)]
    connection: ConnectionArgs,
    /// Rows to synthesize per table.
    #[arg(long, default_value_t = 10)]
    rows: u64,
    /// Run seed for reproducible value streams.
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Only populate the named table(s).
    #[arg(long = "table", value_name = "TABLE")]
    tables: Vec<String>,
    /// Directory for the run report.
    #[arg(long, default_value = "runs")]
    run_dir: PathBuf,
}

#[derive(Args, Debug)]
struct InspectArgs {
    #[command(flatten)]
    connection: ConnectionArgs,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Populate(args) => run_populate(args).await,
        Command::Inspect(args) => run_inspect(args).await,
    }
}

async fn run_populate(args: PopulateArgs) -> Result<(), CliError> {
    let pool = connect(&args.connection).await?;
    let source = PostgresSource::with_schema(pool.clone(), &args.connection.schema);
    let destination = PostgresDestination::with_schema(pool, &args.connection.schema);

    let options = PopulateOptions {
        rows_per_table: args.rows,
        seed: args.seed,
        tables: if args.tables.is_empty() {
            None
        } else {
            Some(args.tables)
        },
        ..PopulateOptions::default()
    };

    let report = Orchestrator::new(&source, &destination, options).run().await?;

    std::fs::create_dir_all(&args.run_dir)?;
    let path = args.run_dir.join("run_report.json");
    std::fs::write(&path, serde_json::to_vec_pretty(&report)?)?;
    tracing::info!(path = %path.display(), "run report written");

    Ok(())
}

async fn run_inspect(args: InspectArgs) -> Result<(), CliError> {
    let pool = connect(&args.connection).await?;
    let source = PostgresSource::with_schema(pool, &args.connection.schema);
    let tables = source.fetch_tables().await?;

    for table in &tables {
        println!("{} ({} columns)", table.name, table.columns.len());
        if !table.primary_key.is_empty() {
            println!("  primary key: {}", table.primary_key.join(", "));
        }
        for fk in &table.foreign_keys {
            println!(
                "  {} -> {}.{}",
                fk.column, fk.referenced_table, fk.referenced_column
            );
        }
    }

    let order = population_order(&tables);
    if order.is_deferred() {
        println!("population order (declaration order, cycle detected):");
    } else {
        println!("population order:");
    }
    for name in order.tables() {
        println!("  {name}");
    }

    Ok(())
}

async fn connect(args: &ConnectionArgs) -> Result<PgPool, CliError> {
    let conn = match &args.conn {
        Some(value) => value.clone(),
        None => std::env::var("DATABASE_URL").map_err(|_| {
            CliError::InvalidConfig("pass --conn or set DATABASE_URL".to_string())
        })?,
    };
    if !conn.starts_with("postgres://") && !conn.starts_with("postgresql://") {
        return Err(CliError::InvalidConfig(format!(
            "unsupported connection string: {conn}"
        )));
    }

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&conn)
        .await?;
    Ok(pool)
}
