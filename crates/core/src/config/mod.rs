use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{tables::TableSet, CosmologyError, Result};

/// Top-level configuration structure for the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directories searched in order for the canonical tables.
    pub mappings_dirs: Vec<PathBuf>,
    /// Use the compiled-in tables when none of `mappings_dirs` exists.
    pub use_bundled_fallback: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mappings_dirs: vec![PathBuf::from("mappings"), PathBuf::from("data/mappings")],
            use_bundled_fallback: true,
        }
    }
}

impl EngineConfig {
    /// Only the compiled-in tables.
    pub fn bundled() -> Self {
        Self {
            mappings_dirs: Vec::new(),
            use_bundled_fallback: true,
        }
    }

    /// Exactly one directory, no fallback.
    pub fn with_mappings_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            mappings_dirs: vec![dir.into()],
            use_bundled_fallback: false,
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| CosmologyError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Reads the tables this configuration points at.
    pub fn load_tables(&self) -> Result<TableSet> {
        if let Some((dir, tables)) = TableSet::discover(&self.mappings_dirs)? {
            tracing::info!(dir = %dir.display(), "using canonical tables from directory");
            return Ok(tables);
        }
        if self.use_bundled_fallback {
            tracing::debug!("using bundled canonical tables");
            return TableSet::bundled();
        }
        let searched = self
            .mappings_dirs
            .iter()
            .map(|dir| dir.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(CosmologyError::msg(format!(
            "no mapping directory found (searched: {searched})"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = EngineConfig::from_json(r#"{ "use_bundled_fallback": false }"#).unwrap();
        assert!(!config.use_bundled_fallback);
        assert_eq!(config.mappings_dirs, EngineConfig::default().mappings_dirs);
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = EngineConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, CosmologyError::Json(_)));
    }

    #[test]
    fn bundled_config_loads_compiled_tables() {
        let tables = EngineConfig::bundled().load_tables().unwrap();
        assert_eq!(tables.modes.rows().len(), 24);
    }

    #[test]
    fn explicit_directory_without_fallback_fails_when_absent() {
        let err = EngineConfig::with_mappings_dir("/no/such/mappings")
            .load_tables()
            .unwrap_err();
        assert!(err.to_string().contains("/no/such/mappings"));
    }

    #[test]
    fn reads_tables_from_a_directory() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/mappings");
        let tables = EngineConfig::with_mappings_dir(dir).load_tables().unwrap();
        assert_eq!(tables.families.rows().len(), 12);
    }
}
