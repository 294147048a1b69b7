//! WABT command-line tools: `wasm-validate`, `wasm-objdump`, `wasm-opcodecnt`.

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use super::{run_tool, InstructionCounter, SectionLister, ToolError, Validator};
use crate::domain::{Feature, FeatureConfig, Validity};

/// Always passed to the validator; broken custom sections are not a validity issue
pub const IGNORE_CUSTOM_SECTION_ERRORS: &str = "--ignore-custom-section-errors";

/// Render validator flags for a feature configuration, relative to the
/// validator's defaults.
pub fn feature_flags(features: &FeatureConfig) -> Vec<String> {
    match features {
        FeatureConfig::All => vec!["--enable-all".to_string()],
        FeatureConfig::Enabled(_) => Feature::all()
            .filter_map(|feature| {
                match (feature.enabled_by_default(), features.is_enabled(feature)) {
                    (true, false) => Some(format!("--disable-{}", feature)),
                    (false, true) => Some(format!("--enable-{}", feature)),
                    _ => None,
                }
            })
            .collect(),
    }
}

fn path_arg(artifact: &Path) -> String {
    artifact.to_string_lossy().into_owned()
}

/// `wasm-validate`
#[derive(Debug, Clone)]
pub struct WasmValidate {
    program: String,
    timeout: Duration,
}

impl WasmValidate {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Validator for WasmValidate {
    async fn validate(
        &self,
        artifact: &Path,
        features: &FeatureConfig,
    ) -> Result<Validity, ToolError> {
        let mut args = vec![IGNORE_CUSTOM_SECTION_ERRORS.to_string()];
        args.extend(feature_flags(features));
        args.push(path_arg(artifact));

        let output = run_tool(&self.program, &args, self.timeout).await?;
        if output.success() {
            Ok(Validity::Valid)
        } else if output.stderr.trim().is_empty() {
            Ok(Validity::Invalid(output.stdout))
        } else {
            Ok(Validity::Invalid(output.stderr))
        }
    }
}

/// `wasm-objdump -h`, used for its section headers
#[derive(Debug, Clone)]
pub struct WasmObjdump {
    program: String,
    timeout: Duration,
}

impl WasmObjdump {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

/// Names of custom sections in `wasm-objdump -h` output
pub fn parse_section_headers(output: &str) -> Vec<String> {
    static CUSTOM: OnceLock<Regex> = OnceLock::new();
    let re = CUSTOM.get_or_init(|| Regex::new(r#"Custom .*"(.*)""#).expect("literal regex"));

    re.captures_iter(output)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

#[async_trait]
impl SectionLister for WasmObjdump {
    async fn custom_sections(&self, artifact: &Path) -> Result<Vec<String>, ToolError> {
        let stdout = run_tool(&self.program, &["-h".to_string(), path_arg(artifact)], self.timeout)
            .await?
            .into_stdout()?;
        Ok(parse_section_headers(&stdout))
    }
}

/// `wasm-opcodecnt --enable-all`
#[derive(Debug, Clone)]
pub struct WasmOpcodecnt {
    program: String,
    timeout: Duration,
}

impl WasmOpcodecnt {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

/// Value of the `Total opcodes: N` line
pub fn parse_opcode_total(output: &str) -> Option<u64> {
    static TOTAL: OnceLock<Regex> = OnceLock::new();
    let re = TOTAL.get_or_init(|| Regex::new(r"Total opcodes: (\d+)").expect("literal regex"));

    re.captures(output)?.get(1)?.as_str().parse().ok()
}

#[async_trait]
impl InstructionCounter for WasmOpcodecnt {
    async fn count_instructions(&self, artifact: &Path) -> Result<u64, ToolError> {
        let stdout = run_tool(
            &self.program,
            &["--enable-all".to_string(), path_arg(artifact)],
            self.timeout,
        )
        .await?
        .into_stdout()?;

        parse_opcode_total(&stdout).ok_or_else(|| ToolError::Output {
            program: self.program.clone(),
            message: "missing 'Total opcodes' line".to_string(),
        })
    }
}
