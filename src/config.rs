// Locating the data file

use eyre::{Result, eyre};
use std::path::PathBuf;

/// Environment variable that overrides the data file location
pub const DATA_FILE_ENV: &str = "TODOSTORE_DATA_FILE";

/// Directory under the user's data dir that holds the store
pub const APP_DIR: &str = "todolist";

/// File name of the store document
pub const DATA_FILE_NAME: &str = "todos.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_file: PathBuf,
}

impl Config {
    /// Resolve the data file: CLI flag, then `TODOSTORE_DATA_FILE`, then the
    /// per-user data directory
    pub fn resolve(cli_data_file: Option<PathBuf>) -> Result<Self> {
        Self::resolve_with(
            cli_data_file,
            std::env::var_os(DATA_FILE_ENV).map(PathBuf::from),
            dirs::data_dir(),
        )
    }

    fn resolve_with(cli: Option<PathBuf>, env: Option<PathBuf>, data_dir: Option<PathBuf>) -> Result<Self> {
        let non_empty = |p: &PathBuf| !p.as_os_str().is_empty();

        if let Some(path) = cli.filter(non_empty) {
            return Ok(Self { data_file: path });
        }
        if let Some(path) = env.filter(non_empty) {
            return Ok(Self { data_file: path });
        }

        let data_dir = data_dir.ok_or_else(|| {
            eyre!(
                "Could not determine the user data directory; pass --data-file or set {}",
                DATA_FILE_ENV
            )
        })?;
        Ok(Self {
            data_file: data_dir.join(APP_DIR).join(DATA_FILE_NAME),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flag_wins() {
        let config = Config::resolve_with(
            Some(PathBuf::from("/tmp/cli.json")),
            Some(PathBuf::from("/tmp/env.json")),
            Some(PathBuf::from("/home/u/.local/share")),
        )
        .unwrap();
        assert_eq!(config.data_file, PathBuf::from("/tmp/cli.json"));
    }

    #[test]
    fn test_env_before_default() {
        let config = Config::resolve_with(None, Some(PathBuf::from("/tmp/env.json")), None).unwrap();
        assert_eq!(config.data_file, PathBuf::from("/tmp/env.json"));
    }

    #[test]
    fn test_default_location() {
        let config =
            Config::resolve_with(None, Some(PathBuf::new()), Some(PathBuf::from("/home/u/.local/share"))).unwrap();
        assert_eq!(
            config.data_file,
            PathBuf::from("/home/u/.local/share/todolist/todos.json")
        );
    }

    #[test]
    fn test_no_location_is_an_error() {
        assert!(Config::resolve_with(None, None, None).is_err());
    }
}
