use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use gastocr_ocr::{EngineConfig, ExtractorConfig, PipelineConfig, TokenConvention, WordReconstructor};
use serde::Deserialize;
use thiserror::Error;

use crate::telemetry::LogFormat;

pub const CONFIG_PATH_VAR: &str = "GASTOCR_CONFIG";
const DEFAULT_MAX_UPLOAD: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {var}: {message}")]
    Env { var: &'static str, message: String },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Service settings: `[engine]`, `[tokens]`, `[words]` and `[extractor]` tables
/// plus a few top-level keys.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub bind: SocketAddr,
    pub max_upload_bytes: usize,
    pub log_format: LogFormat,
    pub engine: EngineConfig,
    pub tokens: TokenConvention,
    pub words: WordReconstructor,
    pub extractor: ExtractorConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            max_upload_bytes: DEFAULT_MAX_UPLOAD,
            log_format: LogFormat::default(),
            engine: EngineConfig::default(),
            tokens: TokenConvention::default(),
            words: WordReconstructor::default(),
            extractor: ExtractorConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// File named by `GASTOCR_CONFIG` (defaults when unset), then env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os(CONFIG_PATH_VAR) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Overlay `GASTOCR_*` variables read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("GASTOCR_BIND") {
            self.bind = bind
                .parse()
                .map_err(|e| ConfigError::Env { var: "GASTOCR_BIND", message: format!("{e}") })?;
        }
        if let Some(format) = lookup("GASTOCR_LOG_FORMAT") {
            self.log_format = format
                .parse()
                .map_err(|message| ConfigError::Env { var: "GASTOCR_LOG_FORMAT", message })?;
        }
        if let Some(dir) = lookup("GASTOCR_MODEL_DIR") {
            self.engine.model_dir = PathBuf::from(dir);
        }
        if let Some(kind) = lookup("GASTOCR_ENGINE") {
            self.engine.kind = kind
                .parse()
                .map_err(|message| ConfigError::Env { var: "GASTOCR_ENGINE", message })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid("max_upload_bytes must be positive".into()));
        }
        if self.extractor.total_window == 0 || self.extractor.tail_window == 0 {
            return Err(ConfigError::Invalid("extractor windows must be positive".into()));
        }
        if self.engine.max_sequence_length == 0 {
            return Err(ConfigError::Invalid("engine.max_sequence_length must be positive".into()));
        }
        Ok(())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            tokens: self.tokens.clone(),
            words: self.words,
            extractor: self.extractor,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use gastocr_ocr::EngineKind;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config = ServiceConfig::from_toml("").unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.bind.port(), 8000);
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.extractor.total_window, 30);
        assert_eq!(config.tokens.word_prefix, "Ġ");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_all_sections() {
        let config = ServiceConfig::from_toml(
            r#"
            bind = "127.0.0.1:9100"
            max_upload_bytes = 2048
            log_format = "json"

            [engine]
            kind = "fixture"
            fixture_path = "fixtures/ticket.json"

            [tokens]
            word_prefix = "▁"

            [words]
            keep_separators = true

            [extractor]
            total_window = 40
            "#,
        )
        .unwrap();

        assert_eq!(config.bind.port(), 9100);
        assert_eq!(config.max_upload_bytes, 2048);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.engine.kind, EngineKind::Fixture);
        assert_eq!(config.engine.fixture_path, Some(PathBuf::from("fixtures/ticket.json")));
        assert_eq!(config.tokens.word_prefix, "▁");
        assert_eq!(config.tokens.pad, "<pad>");
        assert!(config.words.keep_separators);
        assert_eq!(config.extractor.total_window, 40);
        assert_eq!(config.extractor.tail_window, 100);
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(ServiceConfig::from_toml("bind = ["), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = ServiceConfig::default();
        config
            .apply_env(env(&[
                ("GASTOCR_BIND", "127.0.0.1:7000"),
                ("GASTOCR_LOG_FORMAT", "json"),
                ("GASTOCR_MODEL_DIR", "/opt/models/v3"),
                ("GASTOCR_ENGINE", "fixture"),
            ]))
            .unwrap();

        assert_eq!(config.bind, "127.0.0.1:7000".parse().unwrap());
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.engine.model_dir, PathBuf::from("/opt/models/v3"));
        assert_eq!(config.engine.kind, EngineKind::Fixture);
    }

    #[test]
    fn bad_env_value_names_the_variable() {
        let mut config = ServiceConfig::default();
        let err = config.apply_env(env(&[("GASTOCR_ENGINE", "tract")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "GASTOCR_ENGINE", .. }));
    }

    #[test]
    fn validation_rejects_zero_limits() {
        let mut config = ServiceConfig::default();
        config.max_upload_bytes = 0;
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.extractor.tail_window = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn reads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gastocr.toml");
        std::fs::write(&path, "max_upload_bytes = 512\n").unwrap();
        assert_eq!(ServiceConfig::from_file(&path).unwrap().max_upload_bytes, 512);

        let missing = ServiceConfig::from_file(&dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
