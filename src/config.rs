//! Pipeline configuration, layered the way the reference engine layers its
//! own storage/runtime configuration: a `config.toml`, an optional
//! `config.local.toml` override, then environment variables.

use std::path::PathBuf;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

fn default_workshop_version() -> String {
    "1.0.0".to_string()
}

fn default_hash_algorithm() -> String {
    "sha256".to_string()
}

fn default_schema_root() -> PathBuf {
    PathBuf::from("schema")
}

fn default_fixture_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig { level: default_log_level(), format: default_log_format() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_workshop_version")]
    pub workshop_version: String,
    #[serde(default = "default_hash_algorithm")]
    pub hash_algorithm: String,
    #[serde(default = "default_schema_root")]
    pub schema_root: PathBuf,
    #[serde(default = "default_fixture_root")]
    pub fixture_root: PathBuf,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            workshop_version: default_workshop_version(),
            hash_algorithm: default_hash_algorithm(),
            schema_root: default_schema_root(),
            fixture_root: default_fixture_root(),
            logging: LoggingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Merges `config.toml`, an optional `config.local.toml`, and
    /// `ADAPTIVE_`-prefixed environment variables (nested keys separated by
    /// `__`), falling back to defaults for anything left unset.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("config.toml"))
            .merge(Toml::file("config.local.toml"))
            .merge(Env::prefixed("ADAPTIVE_").split("__"))
            .extract()
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, figment::Error> {
        Figment::new().merge(Toml::file(path.as_ref())).extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.workshop_version, "1.0.0");
        assert_eq!(cfg.hash_algorithm, "sha256");
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.logging.format, "text");
    }

    #[test]
    fn config_serialization_round_trips() {
        let cfg = PipelineConfig::default();
        let text = toml::to_string(&cfg).expect("serialize");
        let parsed: PipelineConfig = toml::from_str(&text).expect("deserialize");
        assert_eq!(parsed.workshop_version, cfg.workshop_version);
        assert_eq!(parsed.schema_root, cfg.schema_root);
    }
}
