use std::path::Path;

use async_trait::async_trait;
use serde_json::json;

use crate::agent::claude::ToolDefinition;
use crate::agent::tools::{is_secret_env_file, require_param, verified_path, Tool, ToolOutput};
use crate::error::Result;
use crate::project::env_files;

/// Reads project files for the agent. Env files come back with their
/// values masked so credentials never reach the model.
pub struct ReadFileTool {
    max_file_size: usize,
}

impl ReadFileTool {
    pub fn new(max_file_size: usize) -> Self {
        Self { max_file_size }
    }
}

fn redact_env(contents: &str) -> String {
    let keys: Vec<String> = env_files::parse(contents)
        .into_iter()
        .map(|(key, _)| format!("{key}=<set>"))
        .collect();
    if keys.is_empty() {
        return "# env file with no variables".to_string();
    }
    format!("# values hidden\n{}", keys.join("\n"))
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "read_file".to_string(),
            description: "Read a file in the project. Use this to understand the app's entry points, routing and existing auth code before changing anything. For env files (.env, .env.local) only the variable names are returned.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Path relative to the project root"
                    }
                },
                "required": ["path"]
            }),
        }
    }

    async fn execute(&self, project_root: &Path, input: serde_json::Value) -> Result<ToolOutput> {
        let path_str = require_param!(input, "path");

        let full_path = match verified_path(project_root, path_str) {
            Ok(p) => p,
            Err(e) => return Ok(e),
        };

        let metadata = match tokio::fs::metadata(&full_path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ToolOutput::Error(format!("File not found: {path_str}")));
            }
            Err(e) => return Ok(ToolOutput::Error(format!("Cannot read {path_str}: {e}"))),
        };
        if !metadata.is_file() {
            return Ok(ToolOutput::Error(format!(
                "{path_str} is a directory; use list_directory"
            )));
        }
        if metadata.len() > self.max_file_size as u64 {
            return Ok(ToolOutput::Error(format!(
                "{path_str} is too large ({} bytes, limit {} bytes)",
                metadata.len(),
                self.max_file_size
            )));
        }

        let contents = match tokio::fs::read(&full_path).await {
            Ok(bytes) => bytes,
            Err(e) => return Ok(ToolOutput::Error(format!("Failed to read {path_str}: {e}"))),
        };
        let Ok(text) = String::from_utf8(contents) else {
            return Ok(ToolOutput::Error(format!("{path_str} is not a text file")));
        };

        let is_env = full_path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(is_secret_env_file);
        if is_env {
            tracing::debug!(path = %path_str, "Returning env file with values hidden");
            return Ok(ToolOutput::Success(redact_env(&text)));
        }
        Ok(ToolOutput::Success(text))
    }
}
