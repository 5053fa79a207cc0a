//! Where the monitor keeps its databases, model assets and `config.yaml`.

use directories::ProjectDirs;
use serde::Deserialize;
use std::{
    env,
    path::PathBuf,
};

const ENV_PREFIX: &str = "DRIFT_MONITOR";

/// Filled from the `data_dir` and `config_dir` defaults of the loader.
#[derive(Clone, Debug, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub config_dir: PathBuf,
}

lazy_static::lazy_static! {
    static ref DATA_DIR_OVERRIDE: Option<PathBuf> = dir_override("DATA_DIR");
    static ref CONFIG_DIR_OVERRIDE: Option<PathBuf> = dir_override("CONFIG_DIR");
    static ref PROJECT_DIRS: Option<ProjectDirs> = ProjectDirs::from("", "", "drift-monitor");
}

fn dir_override(suffix: &str) -> Option<PathBuf> {
    env::var_os(format!("{ENV_PREFIX}_{suffix}"))
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// `DRIFT_MONITOR_DATA_DIR`, else the platform's local data directory.
pub fn get_data_dir() -> PathBuf {
    DATA_DIR_OVERRIDE
        .clone()
        .or_else(|| PROJECT_DIRS.as_ref().map(|dirs| dirs.data_local_dir().to_path_buf()))
        .unwrap_or_else(|| PathBuf::from(".drift-monitor").join("data"))
}

/// `DRIFT_MONITOR_CONFIG_DIR`, else the platform's local config directory.
pub fn get_config_dir() -> PathBuf {
    CONFIG_DIR_OVERRIDE
        .clone()
        .or_else(|| PROJECT_DIRS.as_ref().map(|dirs| dirs.config_local_dir().to_path_buf()))
        .unwrap_or_else(|| PathBuf::from(".drift-monitor").join("config"))
}
