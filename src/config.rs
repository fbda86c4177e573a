use crate::{
    clipboard::BackendChoice,
    controller::{DEFAULT_DISPLAY_WIDTH, DEFAULT_PREVIEW_WIDTH},
    encoder::{DEFAULT_SENTINEL, Encoder},
    error::Error,
    history::DEFAULT_MAX_ENTRIES,
};
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

pub const APP_DIR: &str = "cliplog";

/// Settings read from `config.json`. Anything left out keeps its default.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub history_file: Option<PathBuf>,
    pub max_entries: Option<usize>,
    pub display_width: Option<usize>,
    pub preview_width: Option<usize>,
    pub sentinel: Option<char>,
    pub picker: Option<String>,
    pub backend: Option<BackendChoice>,
}

impl FileConfig {
    /// Load a config file. A missing file is the same as an empty one.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err).with_context(|| format!("read config {}", path.display()));
            }
        };
        serde_json::from_str(&contents).with_context(|| format!("parse config {}", path.display()))
    }

    /// Layer values on top of these, keeping ours where the other has none.
    pub fn overlay(self, top: FileConfig) -> FileConfig {
        FileConfig {
            history_file: top.history_file.or(self.history_file),
            max_entries: top.max_entries.or(self.max_entries),
            display_width: top.display_width.or(self.display_width),
            preview_width: top.preview_width.or(self.preview_width),
            sentinel: top.sentinel.or(self.sentinel),
            picker: top.picker.or(self.picker),
            backend: top.backend.or(self.backend),
        }
    }
}

/// Fully resolved settings.
#[derive(Debug, Clone)]
pub struct Config {
    pub history_file: PathBuf,
    pub max_entries: usize,
    pub display_width: usize,
    pub preview_width: usize,
    pub encoder: Encoder,
    pub picker: Option<String>,
    pub backend: BackendChoice,
}

impl Config {
    /// Fill in defaults and check the values make sense.
    pub fn resolve(file: FileConfig) -> Result<Self> {
        let history_file = match file.history_file {
            Some(path) => path,
            None => default_history_file()?,
        };
        let max_entries = file.max_entries.unwrap_or(DEFAULT_MAX_ENTRIES);
        if max_entries == 0 {
            return Err(Error::Config("max entries must be at least 1".into()).into());
        }
        let display_width = file.display_width.unwrap_or(DEFAULT_DISPLAY_WIDTH);
        let preview_width = file.preview_width.unwrap_or(DEFAULT_PREVIEW_WIDTH);
        if display_width == 0 || preview_width == 0 {
            return Err(Error::Config("widths must be at least 1".into()).into());
        }
        let encoder = Encoder::new(file.sentinel.unwrap_or(DEFAULT_SENTINEL))
            .ok_or_else(|| Error::Config("the sentinel can't be a newline".into()))?;
        Ok(Config {
            history_file,
            max_entries,
            display_width,
            preview_width,
            encoder,
            picker: file.picker.filter(|p| !p.trim().is_empty()),
            backend: file.backend.unwrap_or_default(),
        })
    }
}

pub fn default_config_file() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow!("cannot get config directory"))?;
    path.push(APP_DIR);
    path.push("config.json");
    Ok(path)
}

pub fn default_history_file() -> Result<PathBuf> {
    let mut path = dirs::cache_dir().ok_or_else(|| anyhow!("cannot get cache directory"))?;
    path.push(APP_DIR);
    path.push("history");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::{Config, FileConfig};
    use crate::{clipboard::BackendChoice, error::Error};
    use std::{fs, path::PathBuf};
    use tempfile::TempDir;

    fn with_history(file: FileConfig) -> FileConfig {
        FileConfig {
            history_file: Some(PathBuf::from("/tmp/history")),
            ..Default::default()
        }
        .overlay(file)
    }

    #[test]
    fn defaults() {
        let config = Config::resolve(with_history(FileConfig::default())).unwrap();
        assert_eq!(config.max_entries, 50);
        assert_eq!(config.display_width, 80);
        assert_eq!(config.preview_width, 50);
        assert_eq!(config.encoder.sentinel(), '\u{2424}');
        assert_eq!(config.backend, BackendChoice::Auto);
        assert!(config.picker.is_none());
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let file = FileConfig::load(&dir.path().join("config.json")).unwrap();
        assert!(file.max_entries.is_none());
    }

    #[test]
    fn file_values_are_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"max_entries": 10, "sentinel": "¶", "backend": "x11", "picker": "dmenu -i"}"#,
        )
        .unwrap();
        let config = Config::resolve(with_history(FileConfig::load(&path).unwrap())).unwrap();
        assert_eq!(config.max_entries, 10);
        assert_eq!(config.encoder.sentinel(), '¶');
        assert_eq!(config.backend, BackendChoice::X11);
        assert_eq!(config.picker.as_deref(), Some("dmenu -i"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"max_entires": 10}"#).unwrap();
        assert!(FileConfig::load(&path).is_err());
    }

    #[test]
    fn later_layers_win() {
        let file = FileConfig {
            max_entries: Some(10),
            display_width: Some(40),
            ..Default::default()
        };
        let cli = FileConfig {
            max_entries: Some(3),
            ..Default::default()
        };
        let config = Config::resolve(with_history(file.overlay(cli))).unwrap();
        assert_eq!(config.max_entries, 3);
        assert_eq!(config.display_width, 40);
    }

    #[test]
    fn zero_entries_is_invalid() {
        let file = FileConfig {
            max_entries: Some(0),
            ..Default::default()
        };
        let err = Config::resolve(with_history(file)).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Config(_))));
    }

    #[test]
    fn newline_sentinel_is_invalid() {
        let file = FileConfig {
            sentinel: Some('\n'),
            ..Default::default()
        };
        assert!(Config::resolve(with_history(file)).is_err());
    }
}
