//! # bookgen CLI
//!
//! - `bookgen serve [--config PATH]` runs the HTTP service.
//! - `bookgen generate --title TITLE [--config PATH]` runs one pipeline and
//!   prints where the PDF was written.
//!
//! [`run`] is the testable entrypoint; `main` only loads `.env`, installs the
//! tracing subscriber and calls it. All generation logic lives in `bookgen-core`.

use std::path::PathBuf;

use anyhow::Result;
use bookgen_core::run_pipeline;
use clap::{Parser, Subcommand};

use crate::load_config::resolve_config;
use crate::server::{self, AppState};

/// Generate whole books from a title with an LLM.
#[derive(Parser)]
#[clap(
    name = "bookgen",
    version,
    about = "Turn a book title into an LLM-written PDF book"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP service
    Serve {
        /// Path to the YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
    },
    /// Generate one book and exit
    Generate {
        /// Title of the book to write
        #[clap(long)]
        title: String,

        /// Path to the YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
    },
}

pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Serve { config } => {
            let config = resolve_config(config.as_deref())?;
            tracing::info!(command = "serve", address = %config.bind_address(), "Starting service");
            server::serve(&config).await
        }
        Commands::Generate { title, config } => {
            let config = resolve_config(config.as_deref())?;
            tracing::info!(command = "generate", %title, "Starting generation");
            let state = AppState::from_config(&config).await?;
            match run_pipeline(
                state.client.as_ref(),
                state.renderer.clone(),
                state.store.as_ref(),
                &state.pipeline,
                &title,
            )
            .await
            {
                Ok(artifact) => {
                    let path = config.storage.output_dir.join(artifact.download_path());
                    tracing::info!(
                        command = "generate",
                        chapters = artifact.chapters,
                        subchapters = artifact.subchapters_generated,
                        "Generation complete"
                    );
                    println!("{}", path.display());
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "generate", error = %e, "Generation failed");
                    Err(anyhow::Error::new(e))
                }
            }
        }
    }
}
