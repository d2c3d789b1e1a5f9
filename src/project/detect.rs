use std::path::Path;

use serde_json::Value;

use crate::error::{AppError, Result};
use crate::workflow::context::Integration;

const NODE_SERVER_FRAMEWORKS: &[&str] = &["express", "fastify", "koa", "hono", "@hapi/hapi"];

/// Work out which integration fits the project in `dir`.
///
/// `package.json` wins over `go.mod`, which wins over Python manifests.
pub async fn detect(dir: &Path) -> Result<Option<Integration>> {
    let package_json = dir.join("package.json");
    if package_json.is_file() {
        let raw = tokio::fs::read_to_string(&package_json).await?;
        let manifest: Value = serde_json::from_str(&raw).map_err(|e| {
            AppError::Detection(format!("package.json is not valid JSON: {e}"))
        })?;
        let has_index_html = dir.join("index.html").is_file();
        return Ok(Some(from_package_json(&manifest, has_index_html)));
    }

    if dir.join("go.mod").is_file() {
        return Ok(Some(Integration::Go));
    }

    if ["pyproject.toml", "requirements.txt", "setup.py"]
        .iter()
        .any(|name| dir.join(name).is_file())
    {
        return Ok(Some(Integration::Python));
    }

    Ok(None)
}

fn from_package_json(manifest: &Value, has_index_html: bool) -> Integration {
    let has = |name: &str| {
        ["dependencies", "devDependencies"]
            .iter()
            .any(|section| manifest[*section].get(name).is_some())
    };

    if has("next") {
        Integration::Nextjs
    } else if has("@tanstack/react-start") || has("@tanstack/start") {
        Integration::TanstackStart
    } else if has("@react-router/dev") || has("react-router") {
        Integration::ReactRouter
    } else if has("react") {
        Integration::React
    } else if NODE_SERVER_FRAMEWORKS.iter().any(|name| has(name)) {
        Integration::Node
    } else if has_index_html {
        Integration::VanillaJs
    } else {
        Integration::Node
    }
}
