//! Adapter interfaces for external analysis tools.
//!
//! The enricher and the feature prober only see these traits; the WABT and
//! `parse-producers` subprocess implementations live in the submodules and
//! tests substitute in-process fakes.

pub mod producers;
pub mod wabt;

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::ToolSettings;
use crate::domain::{FeatureConfig, Producers, Validity};

pub use producers::ParseProducers;
pub use wabt::{WasmObjdump, WasmOpcodecnt, WasmValidate};

/// Failure to obtain a result from an external tool
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("{program} exited with code {code}: {stderr}")]
    Rejected {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("Unexpected output from {program}: {message}")]
    Output { program: String, message: String },
}

impl ToolError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ToolError::Timeout { .. })
    }
}

/// Captured result of one subprocess run
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub program: String,
    /// Exit code (-1 when terminated by a signal)
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Stdout of a successful run, or `Rejected`
    pub fn into_stdout(self) -> Result<String, ToolError> {
        if self.success() {
            Ok(self.stdout)
        } else {
            Err(ToolError::Rejected {
                program: self.program,
                code: self.code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Run `program args...` to completion, bounded by `limit`.
///
/// A non-zero exit is not an error here; callers decide what it means.
pub async fn run_tool<S: AsRef<str>>(
    program: &str,
    args: &[S],
    limit: Duration,
) -> Result<ToolOutput, ToolError> {
    let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
    tracing::debug!("Running {} {}", program, args.join(" "));

    let child = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ToolError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let output = timeout(limit, child.wait_with_output())
        .await
        .map_err(|_| ToolError::Timeout {
            program: program.to_string(),
            timeout: limit,
        })?
        .map_err(|source| ToolError::Spawn {
            program: program.to_string(),
            source,
        })?;

    Ok(ToolOutput {
        program: program.to_string(),
        code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Validator accepting explicit feature flags
#[async_trait]
pub trait Validator: Send + Sync {
    /// Validate under `features`. Rejection is data (`Validity::Invalid`), not an error.
    async fn validate(&self, artifact: &Path, features: &FeatureConfig)
        -> Result<Validity, ToolError>;
}

/// Lister of embedded custom sections
#[async_trait]
pub trait SectionLister: Send + Sync {
    async fn custom_sections(&self, artifact: &Path) -> Result<Vec<String>, ToolError>;
}

/// Parser of the `producers` custom section
#[async_trait]
pub trait ProducersParser: Send + Sync {
    async fn producers(&self, artifact: &Path) -> Result<Producers, ToolError>;
}

/// Counter of instructions in code bodies
#[async_trait]
pub trait InstructionCounter: Send + Sync {
    async fn count_instructions(&self, artifact: &Path) -> Result<u64, ToolError>;
}

/// The set of tools used for enrichment
#[derive(Clone)]
pub struct Toolchain {
    pub validator: Arc<dyn Validator>,
    pub sections: Arc<dyn SectionLister>,
    pub producers: Arc<dyn ProducersParser>,
    pub counter: Arc<dyn InstructionCounter>,
}

impl Toolchain {
    /// Subprocess-backed tools as configured
    pub fn from_settings(settings: &ToolSettings) -> Self {
        let limit = settings.timeout();
        Self {
            validator: Arc::new(WasmValidate::new(&settings.wasm_validate, limit)),
            sections: Arc::new(WasmObjdump::new(&settings.wasm_objdump, limit)),
            producers: Arc::new(ParseProducers::new(&settings.parse_producers, limit)),
            counter: Arc::new(WasmOpcodecnt::new(&settings.wasm_opcodecnt, limit)),
        }
    }
}
