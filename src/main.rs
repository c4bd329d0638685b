mod batch;
mod config;
mod mesh;
mod parser;
mod wiki;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "meteor_survey",
    about = "Asteroid/comet infobox scraper and GLB mesh measurer"
)]
struct Cli {
    /// Settings file (default: ./survey.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch Wikipedia infoboxes and print size/mass fields as JSON
    Infobox {
        /// Subjects to look up (default: configured list)
        subjects: Vec<String>,
        /// Max concurrent page fetches
        #[arg(short, long)]
        concurrency: Option<usize>,
        /// Stop at the first failed subject and print nothing
        #[arg(long)]
        fail_fast: bool,
        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print bounding-box dimensions of every .glb file in a folder
    Measure {
        /// Folder to scan (default: configured meteors_dir)
        dir: Option<PathBuf>,
    },
    /// List the configured subjects
    Subjects,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Infobox {
            subjects,
            concurrency,
            fail_fast,
            output,
        } => {
            let subjects = if subjects.is_empty() {
                settings.subjects.clone()
            } else {
                subjects
            };
            let opts = batch::BatchOptions {
                base_url: settings.wiki_base_url.clone(),
                concurrency: resolve_concurrency(concurrency, settings.concurrency)?,
                fail_fast,
            };
            info!(
                "Fetching {} subjects ({} at a time)",
                subjects.len(),
                opts.concurrency
            );

            let client = Arc::new(wiki::WikiClient::new(&settings)?);
            let outcomes = batch::collect_records(client, &subjects, &opts).await?;
            let json = batch::render_json(&outcomes)?;

            match output {
                Some(path) => {
                    std::fs::write(&path, format!("{}\n", json))
                        .with_context(|| format!("Failed to write {:?}", path))?;
                    info!("Wrote {} records to {:?}", outcomes.len(), path);
                }
                None => println!("{}", json),
            }

            let failed = outcomes.iter().filter(|o| o.is_failed()).count();
            if failed > 0 {
                Err(anyhow::anyhow!(
                    "{} of {} subjects could not be fetched",
                    failed,
                    outcomes.len()
                ))
            } else {
                Ok(())
            }
        }
        Commands::Measure { dir } => {
            let dir = dir.unwrap_or_else(|| settings.meteors_dir.clone());
            info!("Measuring meshes in {:?}", dir);
            let started = Instant::now();
            let reports = mesh::measure_dir(&dir)?;
            if reports.is_empty() {
                info!("No {} files in {:?}", mesh::MESH_EXTENSION, dir);
            }
            for report in &reports {
                println!("{}", report);
            }
            let failed = reports.iter().filter(|r| r.result.is_err()).count();
            info!(
                "Measured {} files ({} errors) in {:.1}s",
                reports.len(),
                failed,
                started.elapsed().as_secs_f64()
            );
            Ok(())
        }
        Commands::Subjects => {
            for (i, s) in settings.subjects.iter().enumerate() {
                println!("{:>3}  {}", i + 1, s);
            }
            Ok(())
        }
    }
}

/// `-c` wins over the config file; zero is rejected either way.
fn resolve_concurrency(flag: Option<usize>, configured: usize) -> anyhow::Result<usize> {
    match flag.unwrap_or(configured) {
        0 => anyhow::bail!("concurrency must be at least 1"),
        n => Ok(n),
    }
}
