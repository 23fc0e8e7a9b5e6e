use dynsql::EngineConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub config_dir: PathBuf,
    pub file: ConfigFile,
}

impl ProjectConfig {
    pub fn load(config_path: PathBuf) -> anyhow::Result<Self> {
        let config_dir = config_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        let raw = std::fs::read_to_string(&config_path).map_err(|e| {
            anyhow::anyhow!(
                "failed to read config file {}: {e}",
                config_path.display()
            )
        })?;

        let mut file: ConfigFile = toml::from_str(&raw).map_err(|e| {
            anyhow::anyhow!(
                "failed to parse config file {}: {e}",
                config_path.display()
            )
        })?;

        file.expand_env()?;
        file.validate()?;

        Ok(Self { config_dir, file })
    }

    pub fn resolve_path(&self, p: impl AsRef<Path>) -> PathBuf {
        let p = p.as_ref();
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.config_dir.join(p)
        }
    }

    /// Mapper files matched by the `mappers` globs, sorted and deduplicated.
    pub fn mapper_files(&self) -> anyhow::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for pattern in &self.file.mappers {
            let full = self.resolve_path(pattern);
            let full = full.to_string_lossy();
            let entries = glob::glob(&full)
                .map_err(|e| anyhow::anyhow!("invalid mappers pattern {pattern}: {e}"))?;
            let mut matched = false;
            for entry in entries {
                let path = entry.map_err(|e| anyhow::anyhow!("failed to read {full}: {e}"))?;
                if path.is_file() {
                    files.push(path);
                    matched = true;
                }
            }
            if !matched {
                anyhow::bail!("mappers pattern matched no files: {pattern}");
            }
        }
        files.sort();
        files.dedup();
        Ok(files)
    }
}

/// `dynsql.toml`:
///
/// ```toml
/// version = "1"
/// mappers = ["mappers/**/*.xml"]
///
/// [engine]
/// placeholder = "dollar"
/// collapse_whitespace = true
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,

    #[serde(default)]
    pub mappers: Vec<String>,

    #[serde(default)]
    pub engine: EngineConfig,
}

impl ConfigFile {
    fn expand_env(&mut self) -> anyhow::Result<()> {
        for m in &mut self.mappers {
            *m = expand_env_vars(m)?;
        }
        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.version.trim() != "1" {
            anyhow::bail!("unsupported config version: {}", self.version);
        }
        if self.mappers.is_empty() {
            anyhow::bail!("at least one `mappers` pattern is required");
        }
        if let Some(m) = self.mappers.iter().find(|m| m.trim().is_empty()) {
            anyhow::bail!("mappers patterns must not be empty: {m:?}");
        }
        Ok(())
    }
}

fn expand_env_vars(input: &str) -> anyhow::Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut key = String::new();
            let mut closed = false;
            for ch in chars.by_ref() {
                if ch == '}' {
                    closed = true;
                    break;
                }
                key.push(ch);
            }

            if !closed {
                anyhow::bail!("unterminated env var reference: ${{{key}}}");
            }
            if key.is_empty() {
                anyhow::bail!("invalid env var reference: ${{}}");
            }

            let v = std::env::var(&key)
                .map_err(|_| anyhow::anyhow!("missing env var for config expansion: {key}"))?;
            out.push_str(&v);
            continue;
        }

        out.push(c);
    }

    Ok(out)
}
