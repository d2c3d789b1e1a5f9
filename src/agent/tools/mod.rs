pub mod list_directory;
pub mod read_file;
pub mod write_file;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::agent::claude::ToolDefinition;
use crate::error::Result;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn definition(&self) -> ToolDefinition;
    async fn execute(&self, project_root: &Path, input: serde_json::Value) -> Result<ToolOutput>;
}

#[derive(Debug, PartialEq, Eq)]
pub enum ToolOutput {
    /// Normal text result returned to Claude.
    Success(String),
    /// Error result returned to Claude (the agent can recover).
    Error(String),
}

/// Pull a required string parameter out of a tool input, or return a
/// recoverable tool error from the enclosing function.
macro_rules! require_param {
    ($input:expr, $name:literal) => {
        match $input[$name].as_str() {
            Some(value) => value,
            None => {
                return Ok($crate::agent::tools::ToolOutput::Error(format!(
                    "Missing '{}' parameter",
                    $name
                )))
            }
        }
    };
}
pub(crate) use require_param;

/// Env files that hold real values (`.env`, `.env.local`, ...). Committed
/// templates such as `.env.example` are ordinary files.
pub(crate) fn is_secret_env_file(name: &str) -> bool {
    const TEMPLATES: &[&str] = &[".env.example", ".env.sample", ".env.template"];
    (name == ".env" || name.starts_with(".env.")) && !TEMPLATES.contains(&name)
}

/// Resolve a tool path inside the project; a bad path becomes a tool error.
pub(crate) fn verified_path(
    project_root: &Path,
    requested: &str,
) -> std::result::Result<PathBuf, ToolOutput> {
    crate::workspace::verify_path(project_root, Path::new(requested))
        .map_err(|e| ToolOutput::Error(format!("Invalid path: {e}")))
}

pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new(max_file_size: usize) -> Self {
        let tools: Vec<Box<dyn Tool>> = vec![
            Box::new(read_file::ReadFileTool::new(max_file_size)),
            Box::new(list_directory::ListDirectoryTool),
            Box::new(write_file::WriteFileTool),
        ];

        Self { tools }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.iter().find(|t| t.name() == name).map(|t| t.as_ref())
    }
}
