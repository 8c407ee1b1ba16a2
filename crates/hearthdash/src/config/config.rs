use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error as ThisError;
use toml::Spanned;
use tracing_subscriber::filter::{LevelFilter, Targets};

use super::diagnostics::{
    format_diagnostics, Diagnostic, Error, LoadError, SourceInfo, ValidationError,
};
use super::partial::PartialConfig;

pub const DEFAULT_LISTEN: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8565;

#[derive(Debug)]
pub struct Config {
    pub logging: LoggingConfig,
    pub catalog: CatalogConfig,
    pub storage: StorageConfig,
    pub api: ApiConfig,
}

// Deserialize is needed because partial configs hold Spanned<LogLevel>
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: LogLevel,

    /// Per-target levels, e.g. `"tower_http" = "debug"`
    pub overrides: HashMap<String, LogLevel>,
}

impl LoggingConfig {
    /// Filter applying the global level and every per-target override.
    pub fn targets(&self) -> Targets {
        self.overrides
            .iter()
            .fold(Targets::new().with_default(self.level), |targets, (target, level)| {
                targets.with_target(target.clone(), *level)
            })
    }
}

#[derive(Debug)]
pub struct CatalogConfig {
    /// JSON file holding the base catalog
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct StorageConfig {
    /// Directory of the key-value store the overlay is persisted in
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct ApiConfig {
    pub listen: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Rendered diagnostics, errors and warnings alike
    #[error("{0}")]
    Invalid(String),
}

/// Collects validation errors while converting a merged partial config.
struct Validator<'a> {
    source: &'a Option<SourceInfo>,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl Validator<'_> {
    fn error(&mut self, field_path: &str, message: &str, span: Option<std::ops::Range<usize>>) {
        self.diagnostics
            .push(Diagnostic::Error(Error::Validation(ValidationError {
                field_path: field_path.to_string(),
                message: message.to_string(),
                source: span.as_ref().and(self.source.clone()),
                span,
            })));
    }

    fn required_path(&mut self, field_path: &str, value: Option<Spanned<String>>) -> PathBuf {
        match value {
            Some(value) if !value.get_ref().trim().is_empty() => PathBuf::from(value.into_inner()),
            Some(value) => {
                self.error(field_path, "expected a non-empty path", Some(value.span()));
                PathBuf::new()
            }
            None => {
                self.error(field_path, &format!("{} is required", field_path), None);
                PathBuf::new()
            }
        }
    }
}

impl Config {
    /// Load configuration from one or more TOML files.
    ///
    /// Files (and the files they import) are merged with first-wins semantics.
    /// Conflicts and validation problems are all reported together. Warnings
    /// alone don't fail loading and are returned alongside the config.
    pub fn from_files(paths: &[PathBuf]) -> Result<(Self, Vec<Diagnostic>), ConfigError> {
        let configs = PartialConfig::load_with_imports(paths)?;
        let (partial, diagnostics) = PartialConfig::merge(configs);
        Self::from_partial(partial, diagnostics)
    }

    /// Convert a merged PartialConfig, validating every field.
    pub fn from_partial(
        partial: PartialConfig,
        mut diagnostics: Vec<Diagnostic>,
    ) -> Result<(Self, Vec<Diagnostic>), ConfigError> {
        let logging = partial
            .logging
            .map(|logging| LoggingConfig {
                level: logging.level.map(|s| *s.get_ref()).unwrap_or_default(),
                overrides: logging
                    .overrides
                    .map(|hm| hm.into_iter().map(|(k, v)| (k, *v.get_ref())).collect())
                    .unwrap_or_default(),
            })
            .unwrap_or_default();

        let mut validator = Validator {
            source: &partial.source,
            diagnostics: &mut diagnostics,
        };

        let catalog = CatalogConfig {
            path: validator.required_path(
                "catalog.path",
                partial.catalog.and_then(|catalog| catalog.path),
            ),
        };

        let storage = StorageConfig {
            path: validator.required_path(
                "storage.path",
                partial.storage.and_then(|storage| storage.path),
            ),
        };

        let mut api = ApiConfig::default();
        if let Some(partial_api) = partial.api {
            if let Some(listen) = partial_api.listen {
                api.listen = listen.into_inner();
            }
            if let Some(port) = partial_api.port {
                if *port.get_ref() == 0 {
                    validator.error("api.port", "port must be between 1 and 65535", Some(port.span()));
                }
                api.port = port.into_inner();
            }
        }

        if diagnostics.iter().any(|d| d.is_error()) {
            return Err(ConfigError::Invalid(format_diagnostics(&diagnostics)));
        }

        Ok((
            Config {
                logging,
                catalog,
                storage,
                api,
            },
            diagnostics,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    const MINIMAL: &str = r#"
[catalog]
path = "catalog.json"

[storage]
path = "state"
"#;

    #[test]
    fn test_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(&temp_dir, "hearthdash.toml", MINIMAL);

        let (config, diagnostics) = Config::from_files(&[path]).unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(config.catalog.path, PathBuf::from("catalog.json"));
        assert_eq!(config.storage.path, PathBuf::from("state"));
        assert_eq!(config.api.listen, DEFAULT_LISTEN);
        assert_eq!(config.api.port, DEFAULT_PORT);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_merge_non_overlapping_configs() {
        let temp_dir = TempDir::new().unwrap();
        let base = write(&temp_dir, "base.toml", MINIMAL);
        let extra = write(
            &temp_dir,
            "extra.toml",
            r#"
[logging]
level = "debug"

[logging.overrides]
"tower_http" = "trace"

[api]
port = 9000
"#,
        );

        let (config, diagnostics) = Config::from_files(&[base, extra]).unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(
            config.logging.overrides.get("tower_http"),
            Some(&LogLevel::Trace)
        );
        assert_eq!(config.api.port, 9000);
    }

    #[test]
    fn test_conflict_detection() {
        let temp_dir = TempDir::new().unwrap();
        let base = write(&temp_dir, "base.toml", MINIMAL);
        let conflict = write(&temp_dir, "conflict.toml", "[catalog]\npath = \"other.json\"\n");

        let err_msg = Config::from_files(&[base, conflict]).unwrap_err().to_string();
        assert!(err_msg.contains("Merge conflict"));
        assert!(err_msg.contains("catalog.path"));
    }

    #[test]
    fn test_missing_required_fields() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(&temp_dir, "hearthdash.toml", "[api]\nport = 9000\n");

        let err_msg = Config::from_files(&[path]).unwrap_err().to_string();
        insta::assert_snapshot!(err_msg, @r"
        Validation error in 'catalog.path': catalog.path is required
        Validation error in 'storage.path': storage.path is required
        ");
    }

    #[test]
    fn test_zero_port_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(&temp_dir, "hearthdash.toml", &format!("{}\n[api]\nport = 0\n", MINIMAL));

        let err_msg = Config::from_files(&[path]).unwrap_err().to_string();
        assert!(err_msg.contains("api.port"));
        assert!(err_msg.contains("port must be between 1 and 65535"));
    }

    #[test]
    fn test_import_resolution() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("conf.d")).unwrap();
        write(&temp_dir, "conf.d/secrets.toml", "[storage]\npath = \"/var/lib/hearthdash\"\n");
        let main = write(
            &temp_dir,
            "main.toml",
            "imports = [\"conf.d/secrets.toml\"]\n\n[catalog]\npath = \"catalog.json\"\n",
        );

        let (config, _) = Config::from_files(&[main]).unwrap();
        assert_eq!(config.storage.path, PathBuf::from("/var/lib/hearthdash"));
    }

    #[test]
    fn test_import_cycle_detection() {
        let temp_dir = TempDir::new().unwrap();
        let a = write(&temp_dir, "a.toml", "imports = [\"b.toml\"]\n");
        write(&temp_dir, "b.toml", "imports = [\"a.toml\"]\n");

        let result = Config::from_files(&[a]);
        assert!(matches!(
            result,
            Err(ConfigError::Load(LoadError::ImportCycle { .. }))
        ));
    }

    #[test]
    fn test_empty_file_is_only_a_warning() {
        let temp_dir = TempDir::new().unwrap();
        let base = write(&temp_dir, "base.toml", MINIMAL);
        let empty = write(&temp_dir, "empty.toml", "");

        let (_, diagnostics) = Config::from_files(&[base, empty]).unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].is_warning());
    }

    #[test]
    fn test_missing_file_error() {
        let missing = PathBuf::from("/nonexistent/hearthdash.toml");

        let err_msg = Config::from_files(&[missing]).unwrap_err().to_string();
        assert!(err_msg.contains("Failed to read"));
        assert!(err_msg.contains("/nonexistent/hearthdash.toml"));
    }

    #[test]
    fn test_logging_targets() {
        let logging = LoggingConfig {
            level: LogLevel::Warn,
            overrides: HashMap::from([("hearthdash::api".to_string(), LogLevel::Debug)]),
        };

        let targets = logging.targets();
        assert!(targets.would_enable("hearthdash::api", &tracing::Level::DEBUG));
        assert!(!targets.would_enable("hearthdash_overlay", &tracing::Level::INFO));
    }
}
