use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use hearthdash::api::{self, AppState, DynPersistence};
use hearthdash::config::LoggingConfig;
use hearthdash::{format_diagnostics, Config};
use hearthdash_overlay::overlay::{validate_import, ExportScope, ImportError, ImportMode};
use hearthdash_overlay::resolve::{resolve_page, resolve_view};
use hearthdash_overlay::storage::{FileStorage, KeyValuePersistence};
use hearthdash_overlay::{Catalog, OverlayStore};
use tracing_subscriber::prelude::*;

#[derive(Debug, Parser)]
#[command(name = "hearthdash", version, about = "Dashboard configuration service")]
struct Cli {
    /// Config file; may be given several times, earlier files win
    #[arg(long = "config", short, global = true, default_value = "hearthdash.toml")]
    config: Vec<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API
    Serve,
    /// Print the effective section and panel order of a page
    Resolve { page: String },
    /// Print the complete resolved view
    View,
    /// Write the overlay as a backup document
    Export {
        #[arg(long, default_value = "all")]
        scope: ExportScope,
        /// Output file (stdout when omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Restore the overlay from a backup document
    Import {
        file: PathBuf,
        #[arg(long, default_value = "replace")]
        mode: ImportMode,
    },
    /// Check a backup document without importing it
    Validate { file: PathBuf },
    /// Drop the custom order of a page
    ResetOrder { page: String },
}

fn init_logging(logging: &LoggingConfig) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(logging.targets())
        .init();
}

fn open_store(config: &Config, catalog: &Catalog) -> anyhow::Result<OverlayStore<DynPersistence>> {
    let persistence: DynPersistence = Box::new(KeyValuePersistence::new(FileStorage::new(
        &config.storage.path,
    )));
    OverlayStore::open(persistence, catalog).with_context(|| {
        format!(
            "Failed to open overlay in '{}'",
            config.storage.path.display()
        )
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Validating a document needs neither config nor catalog
    if let Command::Validate { file } = &cli.command {
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read '{}'", file.display()))?;
        let errors = match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(document) => ImportError::Invalid(validate_import(&document)).messages(),
            Err(e) => ImportError::InvalidFormat(e).messages(),
        };
        if !errors.is_empty() {
            bail!("{}", errors.join("\n"));
        }
        println!("{} is a valid backup document", file.display());
        return Ok(());
    }

    let (config, diagnostics) = Config::from_files(&cli.config)?;
    init_logging(&config.logging);
    if !diagnostics.is_empty() {
        tracing::warn!("{}", format_diagnostics(&diagnostics));
    }

    let catalog = Catalog::from_file(&config.catalog.path)
        .with_context(|| format!("Failed to load catalog '{}'", config.catalog.path.display()))?;
    let mut store = open_store(&config, &catalog)?;

    match cli.command {
        Command::Serve => {
            tracing::info!("hearthdash starting");
            let state = Arc::new(AppState::new(catalog, store));
            let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => tracing::info!("Received shutdown signal"),
                    Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
                }
                shutdown_tx.send(()).ok();
            });

            api::serve(&config.api, state, shutdown_rx).await?;
            tracing::info!("hearthdash shutdown complete");
        }
        Command::Resolve { page } => {
            if catalog.page(&page).is_none() {
                bail!("Unknown page '{}'", page);
            }
            print_json(&resolve_page(&catalog, &page, store.overlay()))?;
        }
        Command::View => print_json(&resolve_view(&catalog, store.overlay()))?,
        Command::Export { scope, output } => {
            let document = serde_json::to_string_pretty(&store.export(scope))?;
            match output {
                Some(path) => std::fs::write(&path, document)
                    .with_context(|| format!("Failed to write '{}'", path.display()))?,
                None => println!("{}", document),
            }
        }
        Command::Import { file, mode } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read '{}'", file.display()))?;
            let summary = store.import_str(&text, mode)?;
            println!(
                "Imported {} devices, {} panels, {} links and {} page orders",
                summary.devices, summary.panels, summary.links, summary.pages
            );
        }
        Command::ResetOrder { page } => store.reset_order(&page)?,
        Command::Validate { .. } => {}
    }

    Ok(())
}
