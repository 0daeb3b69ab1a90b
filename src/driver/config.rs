use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::interpret::InterpreterConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("unknown profile {name}")]
    UnknownProfile { name: String },
}

/// A package config file. Namely Quill.toml
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub package: Package,
    #[serde(default)]
    pub profile: HashMap<String, Profile>,
    #[serde(default)]
    pub interpreter: InterpreterSection,
    #[serde(default)]
    pub backend: BackendSection,
}

/// Meta information about the package.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Package {
    /// The name of the package.
    pub name: String,
    /// The SEMVER compatible version of the package.
    pub version: String,
}

/// Defines a compilation profile.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Profile {
    /// Whether this profile is the --release profile.
    #[serde(default)]
    pub release: bool,
    /// The optimization level.
    #[serde(default)]
    pub opt_level: u8,
    /// Whether to enable debug info.
    #[serde(default)]
    pub debug_info: bool,
}

/// Limits of the IR interpreter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InterpreterSection {
    pub max_recursion: usize,
    pub max_instructions: u64,
}

impl Default for InterpreterSection {
    fn default() -> Self {
        let defaults = InterpreterConfig::default();
        Self {
            max_recursion: defaults.max_recursion,
            max_instructions: defaults.max_instructions,
        }
    }
}

impl From<InterpreterSection> for InterpreterConfig {
    fn from(section: InterpreterSection) -> Self {
        Self {
            max_recursion: section.max_recursion,
            max_instructions: section.max_instructions,
        }
    }
}

/// Settings of the C backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackendSection {
    /// The C compiler executable.
    pub c_compiler: String,
    /// Whether built programs fail when allocations outlive them.
    pub check_leaks: bool,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            c_compiler: "cc".to_string(),
            check_leaks: false,
        }
    }
}

impl Config {
    /// Reads the config file, a missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("no config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// The named profile. `dev` and `release` exist even when not written down.
    pub fn profile(&self, name: &str) -> Result<Profile, ConfigError> {
        match (self.profile.get(name), name) {
            (Some(profile), _) => Ok(profile.clone()),
            (None, "dev") => Ok(Profile {
                release: false,
                opt_level: 0,
                debug_info: true,
            }),
            (None, "release") => Ok(Profile {
                release: true,
                opt_level: 3,
                debug_info: false,
            }),
            (None, _) => Err(ConfigError::UnknownProfile {
                name: name.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.interpreter.max_recursion, 200);
        assert_eq!(config.interpreter.max_instructions, 1_000_000);
        assert_eq!(config.backend.c_compiler, "cc");
        assert!(!config.backend.check_leaks);
        assert!(config.profile("release").unwrap().release);
        assert!(matches!(
            config.profile("bench"),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn sections_override_defaults() {
        let config = Config::parse(
            r#"
            [package]
            name = "demo"
            version = "0.1.0"

            [profile.release]
            release = true
            opt_level = 2

            [interpreter]
            max_recursion = 16

            [backend]
            c_compiler = "clang"
            check_leaks = true
            "#,
        )
        .unwrap();
        assert_eq!(config.package.name, "demo");
        assert_eq!(config.profile("release").unwrap().opt_level, 2);
        assert_eq!(config.interpreter.max_recursion, 16);
        assert_eq!(config.interpreter.max_instructions, 1_000_000);
        assert_eq!(config.backend.c_compiler, "clang");
        assert!(config.backend.check_leaks);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("Quill.toml")).unwrap();
        assert_eq!(config.backend, BackendSection::default());
    }
}
