//! `parse-producers`: dumps the `producers` custom section as JSON.
//!
//! Output shape: `{"language": {"Rust": ""}, "processed-by": {"rustc": "1.47.0"}}`

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use super::{run_tool, ProducersParser, ToolError};
use crate::domain::Producers;

/// Name of the custom section this parser reads
pub const PRODUCERS_SECTION: &str = "producers";

#[derive(Debug, Clone)]
pub struct ParseProducers {
    program: String,
    timeout: Duration,
}

impl ParseProducers {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

/// Decode the parser's JSON output
pub fn parse_producers_json(program: &str, stdout: &str) -> Result<Producers, ToolError> {
    serde_json::from_str(stdout.trim()).map_err(|e| ToolError::Output {
        program: program.to_string(),
        message: format!("invalid producers JSON: {}", e),
    })
}

#[async_trait]
impl ProducersParser for ParseProducers {
    async fn producers(&self, artifact: &Path) -> Result<Producers, ToolError> {
        let stdout = run_tool(
            &self.program,
            &[artifact.to_string_lossy()],
            self.timeout,
        )
        .await?
        .into_stdout()?;

        parse_producers_json(&self.program, &stdout)
    }
}
