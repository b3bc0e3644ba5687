pub mod types;
pub mod config;
pub mod data;
pub mod topo;
pub mod scale;
pub mod render;
pub mod server;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the datasets and generate the choropleth page
    Generate {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Fetch the datasets and serve the rendered map
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Generate { config } => {
            println!("Generating map with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(config)?;

            // 1. Load both datasets (sequential fetches)
            let (shapes, education) = data::load_datasets(&app_config).await?;

            // 2. Build the FIPS join index
            let index = data::build_education_index(education);

            // 3. Render the page
            let page = render::render_page(&shapes, &index)?;
            if page.unmatched > 0 {
                eprintln!(
                    "{} counties had no matching education record and were rendered without data",
                    page.unmatched
                );
            }

            // 4. Write it out
            if let Some(parent) = app_config.output.page.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
                }
            }
            std::fs::write(&app_config.output.page, &page.html)
                .with_context(|| format!("Failed to write page: {:?}", app_config.output.page))?;

            println!("Generation complete: {:?}", app_config.output.page);
        }
        Commands::Serve { config } => {
            println!("Serving map with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(config)?;

            // Render in memory so the server never depends on a previous
            // generate run.
            let (shapes, education) = data::load_datasets(&app_config).await?;
            let index = data::build_education_index(education);
            let page = render::render_page(&shapes, &index)?;
            if page.unmatched > 0 {
                eprintln!("{} counties have no matching education record", page.unmatched);
            }

            server::start_server(app_config, page, index).await?;
        }
    }

    Ok(())
}
