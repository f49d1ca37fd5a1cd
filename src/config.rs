use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::Result;

/// Application configuration, read from `config.toml` when present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub ingest: IngestConfig,
    pub charts: ChartsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path of the SQLite database file.
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Raw CSV export to ingest.
    pub input: String,
    /// Where the cleaned CSV artifact is written.
    pub cleaned_output: String,
    /// Where the per-row rejection report is written.
    pub rejects_output: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChartsConfig {
    /// Directory chart images are written into.
    pub output_dir: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "prescriptions.db".to_string(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            input: "prescriptions.csv".to_string(),
            cleaned_output: "cleaned_prescriptions.csv".to_string(),
            rejects_output: "rejected_rows.json".to_string(),
        }
    }
}

impl Default for ChartsConfig {
    fn default() -> Self {
        Self {
            output_dir: "charts".to_string(),
        }
    }
}

impl Config {
    /// Loads `config.toml` from the working directory, falling back to
    /// defaults when the file does not exist.
    pub fn load() -> Result<Self> {
        let config_path = Path::new("config.toml");
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let config_content = fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&config_content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_section() {
        let config = Config::default();
        assert_eq!(config.database.path, "prescriptions.db");
        assert_eq!(config.ingest.input, "prescriptions.csv");
        assert_eq!(config.charts.output_dir, "charts");
    }

    #[test]
    fn partial_toml_fills_missing_sections() {
        let config: Config = toml::from_str("[database]\npath = \"other.db\"\n").unwrap();
        assert_eq!(config.database.path, "other.db");
        assert_eq!(config.ingest.cleaned_output, "cleaned_prescriptions.csv");
    }
}
