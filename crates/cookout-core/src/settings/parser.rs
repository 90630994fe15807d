//! Settings file parser with helpful error messages

use std::path::Path;

use super::{RawSettings, Settings};
use crate::error::{DeployError, Result};

/// On-disk format of a settings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsFormat {
    Yaml,
    Toml,
}

impl SettingsFormat {
    /// `.toml` files are TOML; everything else is read as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Yaml,
        }
    }
}

/// Read and validate the settings file at `path`.
pub fn load_settings(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| DeployError::config(path, format!("can't read settings file: {}", e)))?;

    parse_settings_str(&content, SettingsFormat::from_path(path), path)
}

/// Parse settings content. `path` is only used in error messages.
pub fn parse_settings_str(content: &str, format: SettingsFormat, path: &Path) -> Result<Settings> {
    let raw: RawSettings = match format {
        SettingsFormat::Yaml => parse_yaml(content, path)?,
        SettingsFormat::Toml => toml::from_str(content)
            .map_err(|e| DeployError::config(path, enhance_toml_error(e, content)))?,
    };

    raw.validate(path)
}

fn parse_yaml(content: &str, path: &Path) -> Result<RawSettings> {
    // An empty document deserializes to unit, not a map.
    if content.trim().is_empty() {
        return Ok(RawSettings::default());
    }
    serde_yaml::from_str(content).map_err(|e| {
        let message = match e.location() {
            Some(loc) => format!(
                "YAML parsing error at line {}:\n{}\n\nError: {}",
                loc.line(),
                get_line_context(content, loc.line()),
                e
            ),
            None => format!("YAML parsing error: {}", e),
        };
        DeployError::config(path, message)
    })
}

/// Enhance TOML parsing errors with the offending lines
fn enhance_toml_error(error: toml::de::Error, content: &str) -> String {
    let error_msg = error.to_string();

    let line_hint = error.span().map(|span| {
        content[..span.start.min(content.len())]
            .bytes()
            .filter(|b| *b == b'\n')
            .count()
            + 1
    });

    match line_hint {
        Some(line_num) => format!(
            "TOML parsing error at line {}:\n{}\n\nError: {}",
            line_num,
            get_line_context(content, line_num),
            error_msg
        ),
        None => format!("TOML parsing error: {}", error_msg),
    }
}

/// Get context lines around an error
fn get_line_context(content: &str, line_num: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let start = line_num.saturating_sub(2).min(lines.len());
    let end = (line_num + 1).min(lines.len());

    lines[start..end]
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let num = start + i + 1;
            let marker = if num == line_num { ">>>" } else { "   " };
            format!("{} {:4} | {}", marker, num, line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
