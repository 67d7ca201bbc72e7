use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use super::core::FaultmapConfig;
use crate::core::{Error, Result};

/// File name searched for in the working directory and its ancestors.
pub const CONFIG_FILE_NAME: &str = ".faultmap.toml";

const MAX_TRAVERSAL_DEPTH: usize = 10;

pub(crate) fn read_config_file(path: &Path) -> std::result::Result<String, std::io::Error> {
    let file = fs::File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut contents = String::new();
    reader.read_to_string(&mut contents)?;
    Ok(contents)
}

/// Parse TOML contents and validate the result
pub fn parse_and_validate_config(contents: &str) -> Result<FaultmapConfig> {
    let config = toml::from_str::<FaultmapConfig>(contents)
        .map_err(|e| Error::Configuration(format!("failed to parse {CONFIG_FILE_NAME}: {e}")))?;
    config.validate().map_err(Error::Configuration)?;
    Ok(config)
}

/// Load an explicitly named config file. Every failure is reported.
pub fn load_config_from_path(path: &Path) -> Result<FaultmapConfig> {
    let contents = read_config_file(path).map_err(|e| Error::file_system(path, e))?;
    parse_and_validate_config(&contents)
}

/// Try one candidate location while searching. Missing files are silent;
/// unreadable or invalid ones are logged and skipped.
pub(crate) fn try_load_config_from_path(config_path: &Path) -> Option<FaultmapConfig> {
    let contents = match read_config_file(config_path) {
        Ok(contents) => contents,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    "Failed to read config file {}: {}",
                    config_path.display(),
                    e
                );
            }
            return None;
        }
    };

    match parse_and_validate_config(&contents) {
        Ok(config) => {
            tracing::debug!("Loaded config from {}", config_path.display());
            Some(config)
        }
        Err(e) => {
            tracing::warn!("{} in {}. Using defaults.", e, config_path.display());
            None
        }
    }
}

/// `start` and its parents, nearest first, at most `max_depth` entries
pub fn directory_ancestors(start: PathBuf, max_depth: usize) -> impl Iterator<Item = PathBuf> {
    std::iter::successors(Some(start), |dir| {
        let mut parent = dir.clone();
        if parent.pop() {
            Some(parent)
        } else {
            None
        }
    })
    .take(max_depth)
}

/// Search `start` and up to nine ancestors for `.faultmap.toml`.
pub fn load_config_from_dir(start: &Path) -> FaultmapConfig {
    directory_ancestors(start.to_path_buf(), MAX_TRAVERSAL_DEPTH)
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find_map(|path| try_load_config_from_path(&path))
        .unwrap_or_else(|| {
            tracing::debug!(
                "No config found after checking {} directories. Using default config.",
                MAX_TRAVERSAL_DEPTH
            );
            FaultmapConfig::default()
        })
}

/// Load configuration for the current directory, falling back to defaults.
pub fn load_config() -> FaultmapConfig {
    match std::env::current_dir() {
        Ok(current) => load_config_from_dir(&current),
        Err(e) => {
            tracing::warn!(
                "Failed to get current directory: {}. Using default config.",
                e
            );
            FaultmapConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::EnsembleStrategy;
    use indoc::indoc;

    #[test]
    fn test_parse_full_config() {
        let config = parse_and_validate_config(indoc! {r#"
            [execution]
            timeout_ms = 250
            max_call_depth = 40

            [scoring]
            ensemble = "max-scaled-dstar"
        "#})
        .unwrap();

        assert_eq!(config.execution.timeout_ms, 250);
        assert_eq!(config.execution.max_call_depth, 40);
        assert_eq!(config.scoring.ensemble, EnsembleStrategy::MaxScaledDStar);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = parse_and_validate_config("[execution]\ntimeout_ms = 100\n").unwrap();
        assert_eq!(config.execution.max_call_depth, 100);
        assert_eq!(config.scoring.ensemble, EnsembleStrategy::Mean);
    }

    #[test]
    fn test_invalid_values_are_configuration_errors() {
        let err = parse_and_validate_config("[execution]\ntimeout_ms = 0\n").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let err = parse_and_validate_config("[scoring]\nensemble = \"median\"\n").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_directory_ancestors_stops_at_depth() {
        let dirs: Vec<PathBuf> = directory_ancestors(PathBuf::from("/a/b/c/d"), 3).collect();
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("/a/b/c/d"),
                PathBuf::from("/a/b/c"),
                PathBuf::from("/a/b")
            ]
        );
    }
}
