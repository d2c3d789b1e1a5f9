use std::path::Path;

use async_trait::async_trait;
use serde_json::json;

use crate::agent::claude::ToolDefinition;
use crate::agent::tools::{require_param, verified_path, Tool, ToolOutput};
use crate::error::Result;

/// Create or overwrite a file, creating parent directories as needed.
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "write_file".to_string(),
            description: "Write a file in the project, creating it (and any missing directories) if needed or replacing its full content otherwise.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Path relative to the project root"
                    },
                    "content": {
                        "type": "string",
                        "description": "The complete new content for the file"
                    }
                },
                "required": ["path", "content"]
            }),
        }
    }

    async fn execute(&self, project_root: &Path, input: serde_json::Value) -> Result<ToolOutput> {
        let path_str = require_param!(input, "path");
        let content = require_param!(input, "content");

        let full_path = match verified_path(project_root, path_str) {
            Ok(p) => p,
            Err(e) => return Ok(e),
        };

        if full_path.is_dir() {
            return Ok(ToolOutput::Error(format!("{path_str} is a directory")));
        }

        let created = !full_path.exists();
        if let Some(parent) = full_path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return Ok(ToolOutput::Error(format!("Failed to create directory: {e}")));
            }
        }

        match tokio::fs::write(&full_path, content).await {
            Ok(()) if created => Ok(ToolOutput::Success(format!("Created {path_str}"))),
            Ok(()) => Ok(ToolOutput::Success(format!("Updated {path_str}"))),
            Err(e) => Ok(ToolOutput::Error(format!("Failed to write file: {e}"))),
        }
    }
}
