use crate::cli::SourceArgs;
use crate::config::ProjectConfig;
use dynsql::{DynSqlError, Engine, EngineConfig, PlaceholderStyle};
use std::path::PathBuf;

/// Every mapper file of a run loaded into one engine.
#[derive(Debug)]
pub struct LoadedMappers {
    pub engine: Engine,
    /// `(file, namespace)` for each file that loaded.
    pub loaded: Vec<(PathBuf, String)>,
    /// Files that failed to parse or register; nothing from them is in `engine`.
    pub failures: Vec<(PathBuf, DynSqlError)>,
}

impl LoadedMappers {
    pub fn file_of(&self, statement_id: &str) -> Option<&PathBuf> {
        let namespace = statement_id.rsplit_once('.').map(|(ns, _)| ns)?;
        self.loaded
            .iter()
            .find(|(_, ns)| ns == namespace)
            .map(|(path, _)| path)
    }
}

/// Load mapper files named on the command line, or matched by the config.
///
/// Explicit files do not require a config, but one that exists still
/// supplies the engine settings.
pub fn load(
    sources: &SourceArgs,
    placeholder: Option<PlaceholderStyle>,
) -> anyhow::Result<LoadedMappers> {
    let project = if sources.config.exists() {
        Some(ProjectConfig::load(sources.config.clone())?)
    } else {
        None
    };

    let files = if !sources.files.is_empty() {
        sources.files.clone()
    } else {
        let Some(project) = &project else {
            anyhow::bail!(
                "failed to load config {}; pass mapper files or create one",
                sources.config.display()
            );
        };
        project.mapper_files()?
    };

    let mut config = project
        .map(|p| p.file.engine)
        .unwrap_or_else(EngineConfig::default);
    if let Some(style) = placeholder {
        config.placeholder = style;
    }

    let mut engine = Engine::new(config);
    let mut loaded = Vec::new();
    let mut failures = Vec::new();
    for path in files {
        let source = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
        match engine.load_mapper(&source) {
            Ok(namespace) => loaded.push((path, namespace)),
            Err(e) => failures.push((path, e)),
        }
    }

    Ok(LoadedMappers {
        engine,
        loaded,
        failures,
    })
}
