use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    /// Versioned synonym table file. `None` uses the compiled-in table;
    /// reloading a changed file requires a process restart.
    pub synonym_file: Option<PathBuf>,
    pub classifier: ClassifierConfig,
    pub semantic: SemanticConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Routes below this confidence are still executed but flagged in
    /// metadata so callers may present both answer paths.
    pub low_confidence_threshold: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticConfig {
    /// Retrieval + generation service endpoint.
    pub endpoint: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Passage count requested from the retrieval backend.
    pub top_k: usize,
}

impl EngineConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.classifier.low_confidence_threshold) {
            return Err("classifier.low_confidence_threshold must be in [0.0, 1.0]".into());
        }
        if self.semantic.endpoint.is_empty() {
            return Err("semantic.endpoint must not be empty".into());
        }
        if self.semantic.request_timeout_secs == 0 {
            return Err("semantic.request_timeout_secs must be > 0".into());
        }
        if self.semantic.top_k == 0 {
            return Err("semantic.top_k must be > 0".into());
        }
        Ok(())
    }

    /// Load config from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cortap-engine");

        let synonym_file = std::env::var("SYNONYM_FILE").ok().map(PathBuf::from);

        Self {
            data_dir,
            synonym_file,
            classifier: ClassifierConfig {
                low_confidence_threshold: 0.6,
            },
            semantic: SemanticConfig {
                endpoint: std::env::var("SEMANTIC_ENDPOINT")
                    .unwrap_or_else(|_| "http://localhost:8001/query".to_string()),
                connect_timeout_secs: 10,
                request_timeout_secs: 120,
                top_k: 5,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_threshold() {
        let mut config = EngineConfig::default();
        config.classifier.low_confidence_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_endpoint() {
        let mut config = EngineConfig::default();
        config.semantic.endpoint.clear();
        assert!(config.validate().is_err());
    }
}
