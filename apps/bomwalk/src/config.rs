//! # Configuration
//!
//! Settings come from four layers, highest first:
//!
//! 1. command-line flags
//! 2. environment (`BOMWALK_DATABASE`, `BOMWALK_WORKSPACE`, `BOMWALK_LOG_FORMAT`)
//! 3. the TOML file (`bomwalk.toml` unless `--config` names another one)
//! 4. built-in defaults
//!
//! ```toml
//! database = "catalog.db"
//! workspace = "aerospace"
//! log_format = "json"
//! max_depth = 8
//! ```

use bomwalk_core::BomError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

// =============================================================================
// DEFAULTS
// =============================================================================

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "bomwalk.toml";

pub const DEFAULT_DATABASE: &str = "bomwalk.db";

pub const DEFAULT_WORKSPACE: &str = "default";

/// Upper bound for a config file; anything larger is not a config file.
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

// =============================================================================
// FILE LAYER
// =============================================================================

/// Content of the TOML file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub database: Option<PathBuf>,
    pub workspace: Option<String>,
    pub log_format: Option<String>,
    pub max_depth: Option<usize>,
}

impl FileConfig {
    /// Load the config file.
    ///
    /// An explicitly named file must exist. The default file is optional and
    /// an empty `FileConfig` is returned when it is absent.
    pub fn load(explicit: Option<&Path>) -> Result<Self, BomError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.is_file() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let metadata = std::fs::metadata(&path).map_err(|e| {
            BomError::Io(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(BomError::Deserialization(format!(
                "Config file '{}' is {} bytes, limit is {}",
                path.display(),
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }

        let text = std::fs::read_to_string(&path).map_err(|e| {
            BomError::Io(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, BomError> {
        toml::from_str(text).map_err(|e| BomError::Deserialization(format!("Config: {}", e)))
    }
}

// =============================================================================
// RESOLVED SETTINGS
// =============================================================================

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// `"json"` (any case) selects JSON, everything else is text.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Values given on the command line, before layering.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub database: Option<PathBuf>,
    pub workspace: Option<String>,
}

/// Final settings used by the commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database: PathBuf,
    pub workspace: String,
    pub log_format: LogFormat,
    /// Default for `resolve --depth`.
    pub max_depth: Option<usize>,
    pub json_mode: bool,
}

impl Settings {
    /// Layer flags, environment and file over the defaults.
    ///
    /// `env` looks up one variable; `main` passes `std::env::var`, tests pass
    /// a map.
    pub fn resolve(
        overrides: Overrides,
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
        json_mode: bool,
    ) -> Self {
        let database = overrides
            .database
            .or_else(|| env("BOMWALK_DATABASE").map(PathBuf::from))
            .or(file.database)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE));

        let workspace = overrides
            .workspace
            .or_else(|| env("BOMWALK_WORKSPACE"))
            .or(file.workspace)
            .filter(|ws| !ws.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_WORKSPACE.to_string());

        let log_format = env("BOMWALK_LOG_FORMAT")
            .or(file.log_format)
            .map(|f| LogFormat::parse(&f))
            .unwrap_or_default();

        Self {
            database,
            workspace,
            log_format,
            max_depth: file.max_depth,
            json_mode,
        }
    }

    /// Defaults only, pointing at `database`. Used by tests.
    #[must_use]
    pub fn for_database(database: impl Into<PathBuf>, workspace: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            workspace: workspace.into(),
            log_format: LogFormat::Text,
            max_depth: None,
            json_mode: false,
        }
    }
}

/// Environment lookup used by the binary.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn parses_every_key() {
        let file = FileConfig::parse(
            r#"
            database = "cat.db"
            workspace = "aero"
            log_format = "json"
            max_depth = 4
            "#,
        )
        .expect("parse");

        assert_eq!(file.database, Some(PathBuf::from("cat.db")));
        assert_eq!(file.workspace.as_deref(), Some("aero"));
        assert_eq!(file.log_format.as_deref(), Some("json"));
        assert_eq!(file.max_depth, Some(4));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = FileConfig::parse("databse = \"typo.db\"").expect_err("unknown key");
        assert!(matches!(err, BomError::Deserialization(_)));
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let settings =
            Settings::resolve(Overrides::default(), FileConfig::default(), env_of(&[]), false);

        assert_eq!(settings.database, PathBuf::from(DEFAULT_DATABASE));
        assert_eq!(settings.workspace, DEFAULT_WORKSPACE);
        assert_eq!(settings.log_format, LogFormat::Text);
        assert_eq!(settings.max_depth, None);
    }

    #[test]
    fn flag_beats_env_beats_file() {
        let file = FileConfig {
            database: Some(PathBuf::from("file.db")),
            workspace: Some("file-ws".to_string()),
            log_format: Some("text".to_string()),
            max_depth: Some(3),
        };
        let env = env_of(&[
            ("BOMWALK_DATABASE", "env.db"),
            ("BOMWALK_WORKSPACE", "env-ws"),
            ("BOMWALK_LOG_FORMAT", "JSON"),
        ]);
        let overrides = Overrides {
            database: Some(PathBuf::from("flag.db")),
            workspace: None,
        };

        let settings = Settings::resolve(overrides, file, env, true);

        assert_eq!(settings.database, PathBuf::from("flag.db"));
        assert_eq!(settings.workspace, "env-ws");
        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(settings.max_depth, Some(3));
        assert!(settings.json_mode);
    }

    #[test]
    fn file_fills_in_when_env_is_silent() {
        let file = FileConfig {
            workspace: Some("file-ws".to_string()),
            log_format: Some("json".to_string()),
            ..FileConfig::default()
        };

        let settings = Settings::resolve(Overrides::default(), file, env_of(&[]), false);

        assert_eq!(settings.workspace, "file-ws");
        assert_eq!(settings.log_format, LogFormat::Json);
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            FileConfig::load(Some(&missing)),
            Err(BomError::Io(_))
        ));

        let present = dir.path().join("bomwalk.toml");
        std::fs::write(&present, "workspace = \"w\"\n").expect("write");
        let file = FileConfig::load(Some(&present)).expect("load");
        assert_eq!(file.workspace.as_deref(), Some("w"));
    }
}
