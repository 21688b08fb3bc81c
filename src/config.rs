use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::vm::vm::DEFAULT_STACK;

/// The name of the configuration file.
pub const CONFIG: &str = "xi.toml";

/// Settings read from `xi.toml`.
/// Every key is optional; missing keys take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub vm: VmConfig,
    pub compile: CompileConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Cell capacity of the interpreter.
    pub stack: usize,
}

impl Default for VmConfig {
    fn default() -> VmConfig {
        VmConfig {
            stack: DEFAULT_STACK,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileConfig {
    /// Print the bytecode before running it.
    pub dump: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{} could not be read: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{} is not a valid configuration: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl Config {
    pub fn parse(source: &str) -> Result<Config, toml::de::Error> {
        toml::from_str(source)
    }

    /// Searches `dir` and then each of its parents
    /// for a configuration file.
    pub fn locate(dir: &Path) -> Option<PathBuf> {
        dir.ancestors()
            .map(|dir| dir.join(CONFIG))
            .find(|path| path.is_file())
    }

    /// Loads the nearest configuration file,
    /// or the defaults if there is none.
    pub fn find(dir: &Path) -> Result<Config, ConfigError> {
        let path = match Config::locate(dir) {
            Some(path) => path,
            None => return Ok(Config::default()),
        };

        let source = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Config::parse(&source).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;

        debug!(path = %path.display(), ?config, "loaded configuration");
        Ok(config)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.vm.stack, DEFAULT_STACK);
        assert!(!config.compile.dump);
    }

    #[test]
    fn partial() {
        let config = Config::parse("[vm]\nstack = 128\n").unwrap();
        assert_eq!(config.vm.stack, 128);
        assert!(!config.compile.dump);

        let config = Config::parse("[compile]\ndump = true\n").unwrap();
        assert_eq!(config.vm.stack, DEFAULT_STACK);
        assert!(config.compile.dump);
    }

    #[test]
    fn invalid() {
        assert!(Config::parse("[vm]\nstack = \"big\"\n").is_err());
        assert!(Config::parse("[vm").is_err());
    }

    #[test]
    fn searches_upward() {
        let root = std::env::temp_dir().join(format!("xi-config-{}", std::process::id()));
        let nested = root.join("src").join("deep");
        fs::create_dir_all(&nested).unwrap();
        fs::write(root.join(CONFIG), "[vm]\nstack = 42\n").unwrap();

        let found = Config::find(&nested);
        let located = Config::locate(&nested);
        fs::remove_dir_all(&root).unwrap();

        assert_eq!(found.unwrap().vm.stack, 42);
        assert_eq!(located, Some(root.join(CONFIG)));
    }
}
