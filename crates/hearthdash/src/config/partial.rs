use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use toml::Spanned;

use super::diagnostics::{
    Diagnostic, Error, LoadError, MergeConflictLocation, MergeError, SourceInfo, Warning,
};
use super::LogLevel;

/// One config file as written, before merging. Every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct PartialConfig {
    #[serde(default)]
    pub imports: Vec<String>,

    pub logging: Option<PartialLoggingConfig>,
    pub catalog: Option<PartialCatalogConfig>,
    pub storage: Option<PartialStorageConfig>,
    pub api: Option<PartialApiConfig>,

    #[serde(skip)]
    pub source: Option<SourceInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialLoggingConfig {
    pub level: Option<Spanned<LogLevel>>,
    pub overrides: Option<HashMap<String, Spanned<LogLevel>>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialCatalogConfig {
    pub path: Option<Spanned<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialStorageConfig {
    pub path: Option<Spanned<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialApiConfig {
    pub listen: Option<Spanned<String>>,
    pub port: Option<Spanned<u16>>,
}

/// First-wins bookkeeping: where each field path was first set.
struct Merger {
    seen: HashMap<String, MergeConflictLocation>,
    diagnostics: Vec<Diagnostic>,
}

impl Merger {
    /// Keep `incoming` in `slot` unless an earlier file already set the field,
    /// in which case a conflict naming both locations is recorded.
    fn field<T>(
        &mut self,
        field_path: String,
        slot: &mut Option<Spanned<T>>,
        incoming: Option<Spanned<T>>,
        source: &SourceInfo,
    ) {
        let Some(incoming) = incoming else {
            return;
        };

        let location = MergeConflictLocation {
            file_path: source.file_path.clone(),
            span: incoming.span(),
            content: source.content.clone(),
        };

        match self.seen.get(&field_path) {
            Some(first) => {
                self.diagnostics.push(Diagnostic::Error(Error::Merge(MergeError {
                    message: format!("'{}' is defined in multiple config files", field_path),
                    conflicts: vec![first.clone(), location],
                    field_path,
                })));
            }
            None => {
                *slot = Some(incoming);
                self.seen.insert(field_path, location);
            }
        }
    }
}

impl PartialConfig {
    /// Load a single config file without processing imports
    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| LoadError::Io {
            path: path.to_path_buf(),
            error: e,
        })?;

        let mut config: PartialConfig = toml::from_str(&content).map_err(|e| LoadError::Parse {
            path: path.to_path_buf(),
            error: e,
        })?;

        config.source = Some(SourceInfo {
            file_path: path.to_path_buf(),
            content,
        });

        Ok(config)
    }

    /// Load config files and, depth-first, the files they import.
    ///
    /// Imports come before the file importing them. Relative import paths are
    /// resolved against the importing file's directory.
    pub fn load_with_imports(paths: &[PathBuf]) -> Result<Vec<Self>, LoadError> {
        let mut visited = HashSet::new();
        let mut all_configs = Vec::new();

        for path in paths {
            Self::load_recursive(path, &mut visited, &mut all_configs)?;
        }

        Ok(all_configs)
    }

    fn load_recursive(
        path: &Path,
        visited: &mut HashSet<PathBuf>,
        configs: &mut Vec<Self>,
    ) -> Result<(), LoadError> {
        let canonical_path = path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf());

        if visited.contains(&canonical_path) {
            return Err(LoadError::ImportCycle {
                path: canonical_path.clone(),
                cycle: visited.iter().cloned().collect(),
            });
        }

        visited.insert(canonical_path.clone());

        let config = Self::from_file(path)?;

        for import in &config.imports {
            let import = PathBuf::from(import);
            let resolved = if import.is_absolute() {
                import
            } else {
                path.parent().unwrap_or_else(|| Path::new(".")).join(import)
            };

            Self::load_recursive(&resolved, visited, configs)?;
        }

        configs.push(config);

        // Sibling branches may import the same file
        visited.remove(&canonical_path);

        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.logging.is_none()
            && self.catalog.is_none()
            && self.storage.is_none()
            && self.api.is_none()
            && self.imports.is_empty()
    }

    /// Merge partial configs field by field with first-wins semantics.
    ///
    /// Every conflict is collected rather than stopping at the first one.
    /// Returns the merged config and all warnings and errors found.
    pub fn merge<I>(configs: I) -> (Self, Vec<Diagnostic>)
    where
        I: IntoIterator<Item = Self>,
    {
        let mut result = PartialConfig::default();
        let mut merger = Merger {
            seen: HashMap::new(),
            diagnostics: Vec::new(),
        };

        for config in configs {
            let source = config.source.clone().unwrap_or_else(|| SourceInfo {
                file_path: PathBuf::from("<unknown>"),
                content: String::new(),
            });

            if config.is_empty() {
                merger.diagnostics.push(Diagnostic::Warning(Warning::EmptyConfig {
                    file_path: source.file_path.clone(),
                }));
            }

            result.imports.extend(config.imports);

            if let Some(logging) = config.logging {
                let into = result.logging.get_or_insert_with(Default::default);
                merger.field("logging.level".to_string(), &mut into.level, logging.level, &source);

                if let Some(overrides) = logging.overrides {
                    let into = into.overrides.get_or_insert_with(HashMap::new);
                    for (target, level) in overrides {
                        let mut slot = None;
                        merger.field(
                            format!("logging.overrides.{}", target),
                            &mut slot,
                            Some(level),
                            &source,
                        );
                        if let Some(level) = slot {
                            into.insert(target, level);
                        }
                    }
                }
            }

            if let Some(catalog) = config.catalog {
                let into = result.catalog.get_or_insert_with(Default::default);
                merger.field("catalog.path".to_string(), &mut into.path, catalog.path, &source);
            }

            if let Some(storage) = config.storage {
                let into = result.storage.get_or_insert_with(Default::default);
                merger.field("storage.path".to_string(), &mut into.path, storage.path, &source);
            }

            if let Some(api) = config.api {
                let into = result.api.get_or_insert_with(Default::default);
                merger.field("api.listen".to_string(), &mut into.listen, api.listen, &source);
                merger.field("api.port".to_string(), &mut into.port, api.port, &source);
            }

            // Validation of the merged config points at the first file
            if result.source.is_none() {
                result.source = config.source;
            }
        }

        (result, merger.diagnostics)
    }
}
