//! Command-line interface for wasm-corpus.
//!
//! Provides commands for building the full index, filtering it, reporting
//! per-source counts, probing a single binary and showing configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::Toolchain;
use crate::config::{self, paths, ResolvedConfig};
use crate::core::{
    CollectionStats, Enricher, FeatureProber, FilterPipeline, FilterReport, PathSummarizer,
};
use crate::corpus::{CorpusIndex, CorpusStore};
use crate::domain::Validity;
use crate::ingest::{annotate_siblings, ProvenanceScanner};

/// wasm-corpus - Content-addressed WebAssembly corpus index
#[derive(Parser, Debug)]
#[command(name = "wasm-corpus")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: discover .wasm-corpus/config.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan sources, deduplicate, enrich and write the full index
    Index {
        /// Scan again even if a full index already exists
        #[arg(long)]
        rescan: bool,
    },

    /// Apply the filter steps to the full index
    Filter,

    /// Index, then filter
    Run {
        /// Scan again even if a full index already exists
        #[arg(long)]
        rescan: bool,
    },

    /// Per-collection-method counts
    Stats {
        /// Count the filtered index instead of the full one
        #[arg(long)]
        filtered: bool,
    },

    /// Validate one binary and probe its required features
    Probe {
        /// Path to the binary
        file: PathBuf,
    },

    /// Show resolved configuration
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let cfg = match &self.config {
            Some(path) => config::load_config(Some(path))?,
            None => config::config()?.clone(),
        };

        match self.command {
            Commands::Index { rescan } => {
                let store = CorpusStore::open(&cfg.output_dir).await?;
                let _lock = store.lock()?;
                build_index(&cfg, &store, rescan).await.map(|_| ())
            }
            Commands::Filter => {
                let store = CorpusStore::open(&cfg.output_dir).await?;
                let _lock = store.lock()?;
                let index = store.load_index(paths::ALL).await?;
                filter_index(&cfg, &store, index).await
            }
            Commands::Run { rescan } => {
                let store = CorpusStore::open(&cfg.output_dir).await?;
                let _lock = store.lock()?;
                let index = build_index(&cfg, &store, rescan).await?;
                filter_index(&cfg, &store, index).await
            }
            Commands::Stats { filtered } => show_stats(&cfg, filtered).await,
            Commands::Probe { file } => probe_file(&cfg, &file).await,
            Commands::Config => show_config(&cfg),
        }
    }
}

/// Scan every configured source into a fresh index
fn scan_sources(cfg: &ResolvedConfig) -> Result<CorpusIndex> {
    if cfg.sources.is_empty() {
        anyhow::bail!("No sources configured");
    }

    let scanner = ProvenanceScanner::new(&cfg.artifact_glob)?;
    let mut index = CorpusIndex::new();

    eprintln!("Scanning sources...");
    for source in &cfg.sources {
        eprintln!("  {}...", source.label);
        let mut scan = scanner.scan(source)?;
        for pair in scan.by_ref() {
            let (identity, occurrence) = pair?;
            index.insert(identity, occurrence);
        }
        if scan.stats().skipped > 0 {
            tracing::warn!(
                source = %source.label,
                skipped = scan.stats().skipped,
                "Some files could not be read"
            );
        }
        tracing::info!(source = %source.label, matched = scan.stats().matched, "Source scanned");
    }

    eprintln!("  total:  {}", index.total_occurrences());
    eprintln!("  unique: {}", index.len());
    Ok(index)
}

/// Build (or resume) the full index and persist it
async fn build_index(cfg: &ResolvedConfig, store: &CorpusStore, rescan: bool) -> Result<CorpusIndex> {
    let mut index = if store.has_index(paths::ALL) && !rescan {
        eprintln!("Resuming from existing {} index", paths::ALL);
        store.load_index(paths::ALL).await?
    } else {
        let mut index = scan_sources(cfg)?;

        let failures = annotate_siblings(&mut index);
        if failures > 0 {
            tracing::warn!(failures, "Sibling extensions missing for some occurrences");
        }

        eprintln!("Copying unique binaries...");
        for (identity, record) in index.iter() {
            let primary = record
                .primary()
                .with_context(|| format!("Record {} has no occurrences", identity))?;
            store
                .materialize(paths::ALL, identity, Path::new(&primary.absolute_path))
                .await?;
        }

        // Unenriched checkpoint
        store.save_index(paths::ALL, &index).await?;
        index
    };

    eprintln!("Gathering metadata for unique binaries...");
    let enricher = Enricher::new(Toolchain::from_settings(&cfg.tools));
    let stats = enricher
        .enrich_index(&mut index, |identity| store.artifact_path(paths::ALL, identity))
        .await?;

    eprintln!(
        "  valid: {}, invalid: {}, already enriched: {}, timed out: {}, uncounted: {}",
        stats.valid, stats.invalid, stats.skipped, stats.failed, stats.uncounted
    );

    eprintln!("Writing metadata files...");
    store.save_index(paths::ALL, &index).await?;
    Ok(index)
}

/// Run the filter pipeline and write the filtered outputs
async fn filter_index(cfg: &ResolvedConfig, store: &CorpusStore, mut index: CorpusIndex) -> Result<()> {
    let pipeline = FilterPipeline::default_steps(&cfg.filter)?;

    eprintln!("Filtering out non-representative binaries...");
    let report = pipeline.run(&mut index);
    print_report(&report);

    eprintln!("Copying filtered binaries...");
    store
        .copy_collection(paths::ALL, paths::FILTERED, &index)
        .await?;

    eprintln!("Writing filtered metadata files...");
    store.save_index(paths::FILTERED, &index).await?;

    let summarizer =
        PathSummarizer::from_settings(cfg.tools.path_summary.as_deref(), cfg.tools.timeout());
    let summary = summarizer
        .summarize(&paths::file_listing(store.root(), paths::FILTERED))
        .await?;
    store
        .write_file(&paths::path_summary(store.root(), paths::FILTERED), &summary)
        .await?;

    let report_json = serde_json::to_string_pretty(&report).context("Failed to serialize filter report")?;
    store
        .write_file(&paths::filter_report(store.root()), &report_json)
        .await?;

    Ok(())
}

fn print_report(report: &FilterReport) {
    for step in &report.steps {
        eprintln!(
            "  {:<24} {:>8} {:>8}",
            step.step, step.occurrences_removed, step.records_removed
        );
    }
    eprintln!("  total:  {}", report.after.occurrences);
    eprintln!("  unique: {}", report.after.records);
}

async fn show_stats(cfg: &ResolvedConfig, filtered: bool) -> Result<()> {
    let store = CorpusStore::open(&cfg.output_dir).await?;
    let name = if filtered { paths::FILTERED } else { paths::ALL };
    let index = store.load_index(name).await?;

    print!("{}", CollectionStats::from_index(&index).render());
    Ok(())
}

async fn probe_file(cfg: &ResolvedConfig, file: &Path) -> Result<()> {
    if !file.is_file() {
        anyhow::bail!("Not a file: {}", file.display());
    }

    let tools = Toolchain::from_settings(&cfg.tools);
    let prober = FeatureProber::new(tools.validator);
    let result = prober.probe(file, &file.display().to_string()).await?;

    match &result.validity {
        Validity::Valid => println!("valid: true"),
        Validity::Invalid(report) => println!("valid: false\n{}", report.trim()),
    }
    if let Some(default_validity) = &result.default_validity {
        println!("valid with defaults: {}", default_validity.is_valid());
    }
    match &result.features {
        Some(features) => {
            let names: Vec<_> = features.iter().map(|f| f.as_str()).collect();
            println!("required features: {}", names.join(", "));
        }
        None if result.validity.is_valid() => println!("required features: (none)"),
        None => {}
    }

    Ok(())
}

fn show_config(cfg: &ResolvedConfig) -> Result<()> {
    println!("wasm-corpus configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!("Output:      {}", cfg.output_dir.display());
    println!("Artifacts:   {}", cfg.artifact_glob);
    println!();
    println!("Sources:");
    if cfg.sources.is_empty() {
        println!("  (none)");
    }
    for source in &cfg.sources {
        println!(
            "  {:<24} {:<16} {:<10} {}",
            source.label,
            source.kind.as_str(),
            format!("{:?}", source.layout),
            source.root.display()
        );
        if let Some(popularity) = &source.popularity {
            println!("  {:<24} popularity: {}", "", popularity.display());
        }
    }
    println!();
    println!("Tools:");
    println!("  wasm-validate:   {}", cfg.tools.wasm_validate);
    println!("  wasm-objdump:    {}", cfg.tools.wasm_objdump);
    println!("  wasm-opcodecnt:  {}", cfg.tools.wasm_opcodecnt);
    println!("  parse-producers: {}", cfg.tools.parse_producers);
    println!(
        "  path summary:    {}",
        cfg.tools
            .path_summary
            .as_ref()
            .map(|command| format!("{:?}", command))
            .unwrap_or_else(|| "(built-in)".to_string())
    );
    println!("  Timeout:         {}s", cfg.tools.timeout_seconds);
    println!();
    println!("Filter:");
    println!("  Min instructions: {}", cfg.filter.min_instructions);
    if !cfg.filter.disabled_steps.is_empty() {
        println!("  Disabled steps:   {}", cfg.filter.disabled_steps.join(", "));
    }

    Ok(())
}
