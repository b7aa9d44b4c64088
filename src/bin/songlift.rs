use std::path::PathBuf;

use clap::{Parser, Subcommand};
use songlift::{Pipeline, WarehouseConfig, catalog, loader, transform};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "songlift", version, about = "Songlift warehouse ELT")]
struct Cli {
    /// Path to the warehouse configuration file.
    #[arg(long, default_value = "songlift.toml")]
    config: PathBuf,

    /// Connection string override. Falls back to DATABASE_URL, then to the
    /// [cluster] section of the config file.
    #[arg(long)]
    database_url: Option<String>,

    /// Target schema (default: public)
    #[arg(long, default_value = "public")]
    schema: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drop and recreate every pipeline table
    Setup,

    /// Bulk-load the staging tables and populate the star schema
    Run,

    /// Print every statement the setup and run paths would execute
    Plan,
}

#[tokio::main]
async fn main() -> songlift::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = WarehouseConfig::from_path(&cli.config)?;

    if let Commands::Plan = cli.command {
        print_plan(&cli.schema, &config);
        return Ok(());
    }

    let url = cli
        .database_url
        .clone()
        .or_else(|| std::env::var("DATABASE_URL").ok());
    let pipeline = match url {
        Some(url) => Pipeline::connect(&url).await?,
        None => Pipeline::connect_with(&config).await?,
    }
    .with_schema(&cli.schema);

    let outcome = match cli.command {
        Commands::Setup => {
            // Schema setup is log-and-return: failures are reported but the
            // process still exits cleanly after releasing the connection.
            match pipeline.setup_schema().await {
                Ok(()) => {
                    info!("schema setup complete");
                    Ok(())
                }
                Err(err) => {
                    error!(error = %err, "schema setup failed");
                    Ok(())
                }
            }
        }
        Commands::Run => {
            let outcome = pipeline.run(&config).await;
            if outcome.is_ok() {
                info!("pipeline run complete");
            }
            outcome
        }
        Commands::Plan => unreachable!("handled before connecting"),
    };

    pipeline.close().await;
    outcome
}

fn print_plan(schema: &str, config: &WarehouseConfig) {
    let mut actions = Vec::new();
    actions.extend(catalog::drop_actions(schema));
    actions.extend(catalog::create_actions(schema));
    actions.extend(loader::copy_actions(schema, config));
    actions.extend(transform::transform_actions(schema));

    println!("Pipeline statements ({}):", actions.len());
    for (i, action) in actions.iter().enumerate() {
        println!("{}. {}", i + 1, action.description());
        println!("{}\n", action.sql());
    }
}
