use std::path::Path;

use async_trait::async_trait;
use serde_json::json;

use crate::agent::claude::ToolDefinition;
use crate::agent::tools::{is_secret_env_file, require_param, verified_path, Tool, ToolOutput};
use crate::error::Result;

/// Dependency and build output directories, never worth showing the agent.
const SKIPPED: &[&str] = &[
    ".git",
    ".next",
    ".venv",
    "node_modules",
    "target",
    "dist",
    "build",
    "__pycache__",
    "vendor",
];
const MAX_ENTRIES: usize = 200;

pub struct ListDirectoryTool;

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "list_directory".to_string(),
            description: "List one directory of the project. Directories end in `/` and come first. Dependency and build folders are left out. Env files holding credentials are marked `(env)`.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Path relative to the project root; '.' for the root"
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

        let mut read_dir = match tokio::fs::read_dir(&full_path).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ToolOutput::Error(format!("Directory not found: {path_str}")));
            }
            Err(_) if full_path.is_file() => {
                return Ok(ToolOutput::Error(format!(
                    "{path_str} is a file; use read_file"
                )));
            }
            Err(e) => return Ok(ToolOutput::Error(format!("Cannot list {path_str}: {e}"))),
        };

        let mut dirs = Vec::new();
        let mut files = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if SKIPPED.contains(&name.as_str()) {
                continue;
            }
            if entry.file_type().await?.is_dir() {
                dirs.push(format!("{name}/"));
            } else if is_secret_env_file(&name) {
                files.push(format!("{name} (env)"));
            } else {
                files.push(name);
            }
        }
        dirs.sort();
        files.sort();

        let total = dirs.len() + files.len();
        if total == 0 {
            return Ok(ToolOutput::Success(format!("{path_str} is empty")));
        }
        let mut listing: Vec<String> = dirs.into_iter().chain(files).take(MAX_ENTRIES).collect();
        if total > MAX_ENTRIES {
            listing.push(format!("... {} more entries not shown", total - MAX_ENTRIES));
        }
        Ok(ToolOutput::Success(listing.join("\n")))
    }
}
