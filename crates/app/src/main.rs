use std::path::PathBuf;

use clap::{Parser, Subcommand};
use harmonic_engine_core::{aggregate, load_table, EngineConfig, HarmonicEngine, Placement};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

fn main() -> harmonic_engine_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let engine = build_engine(cli.config.as_ref(), cli.mappings.as_ref())?;

    match cli.command {
        Commands::Resolve { query } => print_json(&engine.resolve(&query)?),
        Commands::Modes => print_json(engine.registry().all_modes()),
        Commands::Family { id } => print_json(&engine.registry().modes_in_family(&id)?),
        Commands::LegacyMap { table } => match table {
            Some(file_name) => print_json(&load_table(engine.registry(), &file_name)?),
            None => print_json(&engine.load_map()),
        },
        Commands::Chart { placements } => {
            let placements = placements
                .iter()
                .map(|raw| raw.parse::<Placement>())
                .collect::<harmonic_engine_core::Result<Vec<_>>>()?;
            print_json(&aggregate(engine.registry(), &placements))
        }
        Commands::Report => print_json(engine.registry().report()),
    }
}

fn build_engine(
    config: Option<&PathBuf>,
    mappings: Option<&PathBuf>,
) -> harmonic_engine_core::Result<HarmonicEngine> {
    let config = match (mappings, config) {
        (Some(dir), _) => EngineConfig::with_mappings_dir(dir),
        (None, Some(path)) => EngineConfig::from_file(path)?,
        (None, None) => EngineConfig::default(),
    };
    tracing::debug!(?config, "loading mode cosmology");
    HarmonicEngine::from_config(&config)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> harmonic_engine_core::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Canonical mode cosmology lookups", long_about = None)]
struct Cli {
    /// Directory holding modes.csv, modal_families_index.csv and element_timbres.csv.
    #[arg(short, long, global = true)]
    mappings: Option<PathBuf>,
    /// JSON engine configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve a mode id or alias to its family, element and timbre.
    Resolve {
        query: String,
    },
    /// List every canonical mode.
    Modes,
    /// List the members of a modal family.
    Family {
        id: String,
    },
    /// Print the pre-1.3.0 mapping.
    LegacyMap {
        /// Legacy table file name, e.g. `pentatonic_modes.csv`.
        #[arg(short, long)]
        table: Option<String>,
    },
    /// Aggregate `Body=Sign` placements into primary modes.
    Chart {
        #[arg(required = true)]
        placements: Vec<String>,
    },
    /// Show the load report.
    Report,
}
