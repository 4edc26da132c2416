use clap::{Parser, Subcommand};
use std::path::Path;

use ig_assistant_core::pipeline;
use ig_assistant_core::publish;

#[derive(Parser)]
#[command(name = "ig-assistant")]
#[command(about = "Keep FHIR implementation guide resources canonical and consistent")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Canonicalize all resources and reconcile the guide manifest
    Canonicalize {
        /// Package root directory (contains ig.json and resources/)
        #[arg(default_value = ".")]
        dir: String,
    },

    /// Update publish-box banners across a published-site directory
    PrepareRelease {
        /// Published-site root directory (contains package-list.json)
        #[arg(default_value = ".")]
        dir: String,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let result = match &cli.command {
        Commands::Canonicalize { dir } => run_canonicalize(dir, cli.json),
        Commands::PrepareRelease { dir } => run_prepare_release(dir),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run_canonicalize(dir: &str, json: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if !json {
        println!("Processing the implementation guide in {}", dir);
    }
    let summary = pipeline::canonicalize(Path::new(dir))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Processed {} resources ({} updated{})",
            summary.resources_processed,
            summary.files_updated,
            if summary.guide_updated {
                ", guide updated"
            } else {
                ""
            }
        );
    }
    Ok(())
}

fn run_prepare_release(dir: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    publish::prepare_release(Path::new(dir))?;
    Ok(())
}
