use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mode: OperationMode,
    pub concurrency: ConcurrencyConfig,
    pub association: AssociationConfig,
    pub cache: CacheConfig,
    pub lexicon: LexiconConfig,
    pub logging: LoggingConfig,
    pub server: ServerConfig,
}

/// Which passages of a document are mined.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    Text,
    Tables,
    Both,
}

impl OperationMode {
    pub fn mines_text(&self) -> bool {
        matches!(self, OperationMode::Text | OperationMode::Both)
    }

    pub fn mines_tables(&self) -> bool {
        matches!(self, OperationMode::Tables | OperationMode::Both)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    pub max_concurrent_documents: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssociationConfig {
    /// Longest dependency path accepted between associated entities.
    pub max_distance: usize,
    /// Drop associations above this p-value. Unparseable values are kept.
    pub max_p_value: Option<f64>,
    /// Percentage of rows a cell category must exceed to confirm a column role.
    pub column_threshold: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: usize,
}

/// TSV term lists for the rule-based recognizer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LexiconConfig {
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset.
    pub filter: String,
    pub json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: OperationMode::Both,
            concurrency: ConcurrencyConfig::default(),
            association: AssociationConfig::default(),
            cache: CacheConfig::default(),
            lexicon: LexiconConfig::default(),
            logging: LoggingConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_documents: 4,
        }
    }
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            max_distance: extract::MAX_SDP_DISTANCE,
            max_p_value: None,
            column_threshold: tables::DOMINANCE_THRESHOLD,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 10000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

impl AppConfig {
    /// Read a JSON config; missing sections and fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {:?}", path))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {:?}", path))?;
        Ok(config)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Genome-wide significance only, text and tables.
    pub fn genome_wide() -> Self {
        Self {
            association: AssociationConfig {
                max_p_value: Some(5e-8),
                ..AssociationConfig::default()
            },
            ..Self::default()
        }
    }

    pub fn tables_only() -> Self {
        Self {
            mode: OperationMode::Tables,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.mode, OperationMode::Both);
        assert_eq!(config.association.max_distance, 4);
        assert_eq!(config.association.column_threshold, 80);
        assert_eq!(config.association.max_p_value, None);
        assert!(config.cache.enabled);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"mode": "text", "association": {{"max_p_value": 1e-5}}, "logging": {{"json": true}}}}"#
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.mode, OperationMode::Text);
        assert!(!config.mode.mines_tables());
        assert_eq!(config.association.max_p_value, Some(1e-5));
        assert_eq!(config.association.max_distance, 4);
        assert!(config.logging.json);
        assert_eq!(config.logging.filter, "info");
        assert_eq!(config.concurrency.max_concurrent_documents, 4);
    }

    #[test]
    fn test_bad_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "mode = text").unwrap();
        assert!(AppConfig::load(file.path()).is_err());
        assert!(AppConfig::load(Path::new("/nonexistent/config.json")).is_err());
    }

    #[test]
    fn test_presets() {
        assert_eq!(AppConfig::genome_wide().association.max_p_value, Some(5e-8));
        assert!(!AppConfig::tables_only().mode.mines_text());
    }
}
