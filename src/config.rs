//! Configuration for wasm-corpus.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (WASM_CORPUS_OUTPUT)
//! 2. Config file (.wasm-corpus/config.yaml, or an explicit `--config` path)
//! 3. Defaults (./corpus output, standard WABT tool names)
//!
//! Config file discovery:
//! - Searches current directory and parents for .wasm-corpus/config.yaml
//! - Falls back to the user config directory (e.g. ~/.config/wasm-corpus/config.yaml)
//! - Paths in config file are relative to the project root (parent of .wasm-corpus/)

pub mod paths;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::SourceKind;
use crate::ingest::{SourceLayout, SourceSpec};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Environment variable overriding the output directory
pub const OUTPUT_ENV: &str = "WASM_CORPUS_OUTPUT";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    /// Output directory (relative to project root)
    pub output_dir: Option<String>,
    /// File-name glob selecting artifacts during scans
    pub artifact_glob: Option<String>,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub tools: Option<ToolsConfig>,
    #[serde(default)]
    pub filter: Option<FilterConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// Collection method label; defaults to the kind name
    pub label: Option<String>,
    pub root: String,
    pub layout: Option<SourceLayout>,
    /// JSON map of repository URL to popularity score
    pub popularity: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolsConfig {
    pub wasm_validate: Option<String>,
    pub wasm_objdump: Option<String>,
    pub wasm_opcodecnt: Option<String>,
    pub parse_producers: Option<String>,
    pub timeout_seconds: Option<u64>,
    /// External hierarchical path-summary command: program, then arguments
    pub path_summary: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterConfig {
    pub min_instructions: Option<u64>,
    #[serde(default)]
    pub disabled_steps: Vec<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Directory receiving indexes and materialized artifacts
    pub output_dir: PathBuf,
    /// File-name glob selecting artifacts
    pub artifact_glob: String,
    /// Sources in scan order
    pub sources: Vec<SourceSpec>,
    /// External tool settings
    pub tools: ToolSettings,
    /// Filter pipeline settings
    pub filter: FilterSettings,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ToolSettings {
    pub wasm_validate: String,
    pub wasm_objdump: String,
    pub wasm_opcodecnt: String,
    pub parse_producers: String,
    pub timeout_seconds: u64,
    /// Program and arguments; the listing file is appended
    pub path_summary: Option<Vec<String>>,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            wasm_validate: "wasm-validate".to_string(),
            wasm_objdump: "wasm-objdump".to_string(),
            wasm_opcodecnt: "wasm-opcodecnt".to_string(),
            parse_producers: "parse-producers".to_string(),
            timeout_seconds: 120,
            path_summary: None,
        }
    }
}

impl ToolSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone)]
pub struct FilterSettings {
    pub min_instructions: u64,
    pub disabled_steps: Vec<String>,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            min_instructions: 10,
            disabled_steps: Vec::new(),
        }
    }
}

/// Default artifact glob
pub const DEFAULT_ARTIFACT_GLOB: &str = "*.wasm";

/// Find config file by searching current directory and parents, then the user config dir
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".wasm-corpus").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    // User-level fallback
    let user_config = dirs::config_dir()?.join("wasm-corpus").join("config.yaml");
    user_config.exists().then_some(user_config)
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Project root for a config file: the parent of `.wasm-corpus/`
fn project_root(config_path: &Path) -> PathBuf {
    let parent = config_path.parent().unwrap_or(Path::new("."));
    if parent.file_name().is_some_and(|n| n == ".wasm-corpus") {
        parent.parent().unwrap_or(Path::new(".")).to_path_buf()
    } else {
        parent.to_path_buf()
    }
}

fn resolve_sources(base: &Path, sources: Vec<SourceConfig>) -> Result<Vec<SourceSpec>> {
    sources
        .into_iter()
        .map(|source| {
            let layout = source
                .layout
                .unwrap_or_else(|| SourceLayout::default_for(source.kind));
            if !layout.applies_to(source.kind) {
                anyhow::bail!(
                    "Layout {:?} cannot be used for {} source {}",
                    layout,
                    source.kind,
                    source.root
                );
            }

            Ok(SourceSpec {
                kind: source.kind,
                label: source
                    .label
                    .unwrap_or_else(|| source.kind.as_str().to_string()),
                root: resolve_path(base, &source.root),
                layout,
                popularity: source.popularity.map(|p| resolve_path(base, &p)),
            })
        })
        .collect()
}

/// Build the resolved configuration from a parsed file
fn resolve_file(config_path: &Path, config: ConfigFile) -> Result<ResolvedConfig> {
    let base_dir = project_root(config_path);

    let output_dir = if let Ok(env_out) = std::env::var(OUTPUT_ENV) {
        PathBuf::from(env_out)
    } else if let Some(ref out) = config.output_dir {
        resolve_path(&base_dir, out)
    } else {
        base_dir.join("corpus")
    };

    let defaults = ToolSettings::default();
    let tools = config.tools.unwrap_or_default();
    if tools.path_summary.as_ref().is_some_and(Vec::is_empty) {
        anyhow::bail!(
            "tools.path_summary in {} must name a program",
            config_path.display()
        );
    }
    let tools = ToolSettings {
        wasm_validate: tools.wasm_validate.unwrap_or(defaults.wasm_validate),
        wasm_objdump: tools.wasm_objdump.unwrap_or(defaults.wasm_objdump),
        wasm_opcodecnt: tools.wasm_opcodecnt.unwrap_or(defaults.wasm_opcodecnt),
        parse_producers: tools.parse_producers.unwrap_or(defaults.parse_producers),
        timeout_seconds: tools.timeout_seconds.unwrap_or(defaults.timeout_seconds),
        path_summary: tools.path_summary,
    };

    let filter = config.filter.unwrap_or_default();
    let filter = FilterSettings {
        min_instructions: filter
            .min_instructions
            .unwrap_or(FilterSettings::default().min_instructions),
        disabled_steps: filter.disabled_steps,
    };

    Ok(ResolvedConfig {
        output_dir,
        artifact_glob: config
            .artifact_glob
            .unwrap_or_else(|| DEFAULT_ARTIFACT_GLOB.to_string()),
        sources: resolve_sources(&base_dir, config.sources)?,
        tools,
        filter,
        config_file: Some(config_path.to_path_buf()),
    })
}

/// Load configuration from an explicit file, or discover one
pub fn load_config(explicit: Option<&Path>) -> Result<ResolvedConfig> {
    let config_file = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file(),
    };

    if let Some(ref config_path) = config_file {
        let config = load_config_file(config_path)?;
        return resolve_file(config_path, config);
    }

    // No config file - use env vars or defaults
    let output_dir = std::env::var(OUTPUT_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("corpus"));

    Ok(ResolvedConfig {
        output_dir,
        artifact_glob: DEFAULT_ARTIFACT_GLOB.to_string(),
        sources: Vec::new(),
        tools: ToolSettings::default(),
        filter: FilterSettings::default(),
        config_file: None,
    })
}

/// Get the discovered configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config(None).map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}
