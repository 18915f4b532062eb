// Copyright 2025 Martin Pool

//! Deployment configuration: which container images run the load test.

use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use schemars::JsonSchema;
use serde::Deserialize;
use tracing::debug;

use crate::{Error, Result};

/// Default configuration file name, relative to the working directory.
pub static DEFAULT_CONFIG_FILE: &str = "conf.json";

/// Configuration for gcluster.
///
/// This is by default read from `conf.json` in the working directory, or from
/// the file specified by `--config`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, JsonSchema)]
pub struct Config {
    /// Image for the load-generator (Gatling injector) container.
    #[serde(rename = "PerfImage")]
    pub perf_image: String,

    /// Image for the watcher container that aggregates results.
    #[serde(rename = "WatcherImage")]
    pub watcher_image: String,
}

impl Config {
    /// Load from the given file, or from `conf.json` in the working directory.
    pub fn new(config_path: &Option<PathBuf>) -> Result<Self> {
        match config_path {
            Some(config_path) => Self::from_file(config_path),
            None => Self::from_file(Path::new(DEFAULT_CONFIG_FILE)),
        }
    }

    pub fn from_file(config_path: &Path) -> Result<Self> {
        debug!(?config_path, "Loading config from file");
        let config_str = std::fs::read_to_string(config_path).map_err(|err| {
            Error::Config(format!(
                "Failed to load config file {}: {err}",
                config_path.display()
            ))
        })?;
        config_str.parse().map_err(|err| {
            Error::Config(format!(
                "Failed to parse config file {}: {err}",
                config_path.display()
            ))
        })
    }
}

impl FromStr for Config {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use assert_matches::assert_matches;
    use schemars::schema_for;
    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn config_from_file() {
        let mut config_tmp = NamedTempFile::new().unwrap();
        config_tmp
            .write_all(
                br#"{
                    "PerfImage": "eu.gcr.io/proj/gatling:3.0.2",
                    "WatcherImage": "eu.gcr.io/proj/watcher:latest"
                }"#,
            )
            .unwrap();
        let config = Config::from_file(config_tmp.path()).unwrap();
        assert_eq!(config.perf_image, "eu.gcr.io/proj/gatling:3.0.2");
        assert_eq!(config.watcher_image, "eu.gcr.io/proj/watcher:latest");
    }

    #[test]
    fn missing_watcher_image() {
        let err = Config::from_str(r#"{ "PerfImage": "gatling" }"#).unwrap_err();
        assert!(err.to_string().contains("WatcherImage"), "{err}");
    }

    #[test]
    fn config_from_file_with_errors() {
        let mut config_tmp = NamedTempFile::new().unwrap();
        config_tmp.write_all(b" garbage ").unwrap();
        let err = Config::from_file(config_tmp.path()).unwrap_err();
        assert_matches!(err, Error::Config(_));
        let msg = err.to_string();
        println!("{}", msg);
        assert!(msg.starts_with("Invalid configuration: "));
        assert!(msg.contains(config_tmp.path().display().to_string().as_str()));
    }

    #[test]
    fn missing_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        let err = Config::new(&Some(path.clone())).unwrap_err();
        assert_matches!(err, Error::Config(_));
        assert!(err.to_string().contains("Failed to load config file"));
        assert!(err.to_string().contains(path.display().to_string().as_str()));
    }

    #[test]
    fn can_make_config_schema() {
        let schema = schema_for!(Config);
        let schema_json = serde_json::to_string_pretty(&schema).unwrap();
        assert!(schema_json.contains("PerfImage"));
    }
}
