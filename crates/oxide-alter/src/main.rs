//! oxide-alter CLI
//!
//! Command-line tool for altering SQLite tables.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_alter::{AlterDialect, SqliteCatalog};
use oxide_alter_core::prelude::*;

/// Alter table definitions while preserving their data.
#[derive(Parser)]
#[command(name = "oxide-alter")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (SQLite path or connection string).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the definition of a table.
    Describe {
        /// Table name.
        table: String,
    },

    /// Simplify a script and show its requirements without executing it.
    Plan {
        /// Table name.
        table: String,

        /// JSON alter script.
        #[arg(short, long)]
        script: PathBuf,
    },

    /// Apply an alter script.
    Apply {
        /// Table name.
        table: String,

        /// JSON alter script.
        #[arg(short, long)]
        script: PathBuf,

        /// Compute the new definition without touching the database.
        #[arg(long)]
        simulate: bool,
    },

    /// Print the rows of a table.
    Rows {
        /// Table name.
        table: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut catalog = SqliteCatalog::connect(&cli.database)?;

    match cli.command {
        Commands::Describe { table } => {
            let schema = catalog.table_schema(&table)?;
            println!(
                "\nTable {:?} ({} fields, {}):",
                schema.name,
                schema.fields.len(),
                catalog.dialect().name()
            );
            println!("{:-<60}", "");
            for (position, field) in schema.fields.iter().enumerate() {
                println!(" {position:>3}: {field}");
            }
            println!();
        }

        Commands::Plan { table, script } => {
            let script = load_script(&script)?;
            let options = script.options.clone().only_compute_requirements(true);
            let report = run_script(&mut catalog, &table, &script, &options)?;
            print!("{}", report.trace);
        }

        Commands::Apply {
            table,
            script,
            simulate,
        } => {
            let script = load_script(&script)?;
            let simulate = simulate || script.options.simulate;
            let options = script.options.clone().simulate(simulate);
            if simulate {
                info!("Simulation mode - the database will not be modified.");
            }
            let report = run_script(&mut catalog, &table, &script, &options)?;
            print!("{}", report.trace);

            match &report.outcome {
                Outcome::Success => info!(
                    table = %table,
                    rows = report.rows_copied,
                    conversion_failures = report.conversion_failures,
                    "Table altered"
                ),
                Outcome::Failed(message) => bail!("Alteration of {table} failed: {message}"),
                Outcome::Cancelled(stage) => bail!("Alteration of {table} cancelled at {stage}"),
            }
        }

        Commands::Rows { table } => {
            let schema = catalog.table_schema(&table)?;
            let header: Vec<&str> = schema.field_names().collect();
            println!("{}", header.join(" | "));
            println!("{:-<60}", "");
            for row in catalog.rows(&table)? {
                let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
                println!("{}", cells.join(" | "));
            }
        }
    }

    Ok(())
}

fn load_script(path: &Path) -> anyhow::Result<AlterScript> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script {}", path.display()))?;
    Ok(AlterScript::from_json(&json)?)
}

fn run_script(
    catalog: &mut SqliteCatalog,
    table: &str,
    script: &AlterScript,
    options: &AlterOptions,
) -> anyhow::Result<AlterReport> {
    let schema = catalog.table_schema(table)?;
    let batch = script.resolve(&schema, catalog)?;
    info!(table = %table, actions = batch.len(), "Running alter script");
    let mut handler = AlterTableHandler::with_batch(batch);
    Ok(handler.execute(catalog, table, options))
}
