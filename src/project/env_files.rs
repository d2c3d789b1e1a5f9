use std::path::Path;

use crate::collaborators::types::{EnvFileProbe, EnvScan};
use crate::config::CredentialsConfig;
use crate::error::Result;

/// Which of the configured env files exist. Contents are not read.
pub fn probe(dir: &Path, names: &[String]) -> EnvFileProbe {
    let files: Vec<String> = names
        .iter()
        .filter(|name| dir.join(name).is_file())
        .cloned()
        .collect();
    EnvFileProbe {
        exists: !files.is_empty(),
        files,
    }
}

/// Parse `KEY=VALUE` lines. Handles comments, `export ` and quoting.
pub fn parse(contents: &str) -> Vec<(String, String)> {
    contents.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }

    let value = value.trim();
    let value = match value.chars().next() {
        Some(quote @ ('"' | '\'')) => {
            let inner = &value[1..];
            match inner.find(quote) {
                Some(end) => &inner[..end],
                None => inner,
            }
        }
        _ => match value.find(" #") {
            Some(comment) => value[..comment].trim_end(),
            None => value,
        },
    };
    Some((key.to_string(), value.to_string()))
}

fn lookup<'a>(
    pairs: &'a [(String, String)],
    keys: &[String],
    prefix: &str,
) -> Option<&'a str> {
    keys.iter().find_map(|key| {
        pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| v.starts_with(prefix) && v.len() > prefix.len())
    })
}

/// Look for a usable credential pair in the configured env files.
///
/// A file with both a client id and an API key beats one that only has a
/// client id; among equals, configuration order decides.
pub async fn scan(dir: &Path, config: &CredentialsConfig) -> Result<EnvScan> {
    let mut partial: Option<EnvScan> = None;

    for name in &config.env_files {
        let path = dir.join(name);
        if !path.is_file() {
            continue;
        }
        let contents = tokio::fs::read_to_string(&path).await?;
        let pairs = parse(&contents);

        let Some(client_id) = lookup(&pairs, &config.client_id_keys, &config.client_id_prefix)
        else {
            continue;
        };
        let api_key = lookup(&pairs, &config.api_key_keys, &config.api_key_prefix);
        let scan = EnvScan {
            found: true,
            client_id: Some(client_id.to_string()),
            api_key: api_key.map(str::to_string),
            source_path: Some(name.clone()),
        };

        if scan.api_key.is_some() {
            tracing::debug!(file = %name, "Found credential pair in env file");
            return Ok(scan);
        }
        partial.get_or_insert(scan);
    }

    Ok(partial.unwrap_or_default())
}

/// Set `entries` in the env file at `path`, replacing existing assignments
/// and appending the rest. Other lines are left untouched.
pub async fn upsert(path: &Path, entries: &[(&str, &str)]) -> Result<()> {
    let existing = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    let mut remaining: Vec<(&str, &str)> = entries.to_vec();
    let mut lines: Vec<String> = Vec::new();
    for line in existing.lines() {
        let replaced = parse_line(line).and_then(|(key, _)| {
            let index = remaining.iter().position(|(k, _)| *k == key)?;
            let (k, v) = remaining.remove(index);
            Some(format!("{k}={}", quote(v)))
        });
        lines.push(replaced.unwrap_or_else(|| line.to_string()));
    }
    for (key, value) in remaining {
        lines.push(format!("{key}={}", quote(value)));
    }

    let mut body = lines.join("\n");
    body.push('\n');
    tokio::fs::write(path, body).await?;
    Ok(())
}

fn quote(value: &str) -> String {
    if value.contains(char::is_whitespace) || value.contains('#') {
        format!("\"{value}\"")
    } else {
        value.to_string()
    }
}
