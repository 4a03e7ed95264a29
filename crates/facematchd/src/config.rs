use anyhow::{bail, Context, Result};
use facematch_core::{default_model_dir, GalleryOptions, StrategyKind, DEFAULT_MATCH_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Daemon configuration: optional TOML file, then `FACEMATCH_*` environment overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listen address (default: 0.0.0.0:8000).
    pub bind: String,
    /// Root of the known-faces tree, one subdirectory per identity.
    pub gallery_dir: PathBuf,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Cosine similarity threshold for a positive match.
    pub match_threshold: f32,
    pub match_strategy: StrategyKind,
    /// Skip unreadable gallery images instead of failing startup.
    pub skip_unreadable: bool,
    /// Engine threads, each with its own copy of the models.
    pub workers: usize,
    /// Largest accepted request body, in bytes.
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            gallery_dir: PathBuf::from("known_faces"),
            model_dir: default_model_dir(),
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            match_strategy: StrategyKind::First,
            skip_unreadable: false,
            workers: 1,
            max_upload_bytes: 16 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Load from `FACEMATCH_CONFIG` (if set) and the process environment.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var_os("FACEMATCH_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config at {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Override fields from `FACEMATCH_*` variables as looked up by `get`.
    pub fn apply_env<F>(&mut self, get: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = get("FACEMATCH_BIND") {
            self.bind = v;
        }
        if let Some(v) = get("FACEMATCH_GALLERY_DIR") {
            self.gallery_dir = PathBuf::from(v);
        }
        if let Some(v) = get("FACEMATCH_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        if let Some(v) = env_parse(&get, "FACEMATCH_MATCH_THRESHOLD")? {
            self.match_threshold = v;
        }
        if let Some(v) = get("FACEMATCH_MATCH_STRATEGY") {
            self.match_strategy = v.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(v) = get("FACEMATCH_SKIP_UNREADABLE") {
            self.skip_unreadable = v != "0" && !v.eq_ignore_ascii_case("false");
        }
        if let Some(v) = env_parse(&get, "FACEMATCH_WORKERS")? {
            self.workers = v;
        }
        if let Some(v) = env_parse(&get, "FACEMATCH_MAX_UPLOAD_BYTES")? {
            self.max_upload_bytes = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            bail!("workers must be at least 1");
        }
        if !(-1.0..=1.0).contains(&self.match_threshold) {
            bail!("match_threshold {} is outside [-1, 1]", self.match_threshold);
        }
        if self.max_upload_bytes == 0 {
            bail!("max_upload_bytes must be positive");
        }
        Ok(())
    }

    pub fn gallery_options(&self) -> GalleryOptions {
        GalleryOptions {
            skip_unreadable: self.skip_unreadable,
        }
    }
}

fn env_parse<T, F>(get: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("invalid {key}={raw}: {e}")),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.match_strategy, StrategyKind::First);
        assert_eq!(config.gallery_dir, PathBuf::from("known_faces"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("FACEMATCH_BIND", "127.0.0.1:9000"),
                ("FACEMATCH_MATCH_THRESHOLD", "0.55"),
                ("FACEMATCH_MATCH_STRATEGY", "nearest"),
                ("FACEMATCH_SKIP_UNREADABLE", "1"),
                ("FACEMATCH_WORKERS", "3"),
            ]))
            .unwrap();

        assert_eq!(config.bind, "127.0.0.1:9000");
        assert!((config.match_threshold - 0.55).abs() < 1e-6);
        assert_eq!(config.match_strategy, StrategyKind::Nearest);
        assert!(config.gallery_options().skip_unreadable);
        assert_eq!(config.workers, 3);
    }

    #[test]
    fn test_invalid_env_value_is_an_error() {
        let mut config = Config::default();
        let err = config.apply_env(env(&[("FACEMATCH_WORKERS", "many")])).unwrap_err();
        assert!(err.to_string().contains("FACEMATCH_WORKERS"), "{err}");

        let err = config.apply_env(env(&[("FACEMATCH_MATCH_STRATEGY", "vote")])).unwrap_err();
        assert!(err.to_string().contains("vote"), "{err}");
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = Config { workers: 0, ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_fills_missing_fields_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facematch.toml");
        std::fs::write(&path, "gallery_dir = \"/srv/faces\"\nmatch_strategy = \"nearest\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.gallery_dir, PathBuf::from("/srv/faces"));
        assert_eq!(config.match_strategy, StrategyKind::Nearest);
        assert_eq!(config.workers, 1);
    }

    #[test]
    fn test_from_file_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "workers = \"two\"").unwrap();
        let err = Config::from_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("broken.toml"));
    }
}
