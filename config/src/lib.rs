#[macro_use]
extern crate tracing;

mod app_config;
mod args;
mod duration;

use app_config::AppConfig;
pub use app_config::{
    get_config_dir,
    get_data_dir,
};
pub use args::{
    version,
    ConfigArgs,
};
use eyre::Context as _;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    net::SocketAddr,
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};

const DEFAULT_CONFIG: &str = include_str!("default-config.yaml");

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(flatten, skip_serializing)]
    pub app_config: AppConfig,
    pub analysis: AnalysisConfig,
    pub storage: StorageConfig,
    pub http: HttpConfig,
    pub simulator: SimulatorConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(with = "duration")]
    pub window: Duration,
    pub min_samples: usize,
    #[serde(with = "duration")]
    pub interval: Duration,
    #[serde(with = "duration")]
    pub timeout: Duration,
    pub significance: f64,
    pub categorical_max_unique: usize,
}

/// Relative paths are resolved against the data directory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub live_db: PathBuf,
    pub metrics_db: PathBuf,
    pub registry_db: PathBuf,
    pub assets_dir: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    pub listen_address: SocketAddr,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    pub api_url: url::Url,
    #[serde(with = "duration")]
    pub send_interval: Duration,
    #[serde(with = "duration")]
    pub grace_period: Duration,
    #[serde(with = "duration")]
    pub retry_interval: Duration,
}

impl Config {
    /// Built-in defaults, then `<config_dir>/config.yaml`, then `args`.
    pub fn new(args: ConfigArgs) -> Result<Self, config::ConfigError> {
        Self::with_dirs(&get_config_dir(), &get_data_dir(), args)
    }

    pub fn with_dirs(config_dir: &Path, data_dir: &Path, args: ConfigArgs) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("data_dir", data_dir.to_string_lossy().into_owned())?
            .set_default("config_dir", config_dir.to_string_lossy().into_owned())?;

        builder = builder.add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Yaml));

        let config_files = [("config.yaml", config::FileFormat::Yaml)];

        for (file, format) in &config_files {
            let source = config::File::from(config_dir.join(file))
                .format(*format)
                .required(false);
            builder = builder.add_source(source);
        }

        builder = builder.add_source(args);

        let cfg: Self = builder.build()?.try_deserialize()?;
        debug!(config_dir = %config_dir.display(), data_dir = %data_dir.display(), "configuration loaded");

        Ok(cfg)
    }

    pub fn data_dir(&self) -> &Path {
        &self.app_config.data_dir
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir().join(path)
        }
    }

    pub fn live_db_path(&self) -> PathBuf {
        self.resolve(&self.storage.live_db)
    }

    pub fn metrics_db_path(&self) -> PathBuf {
        self.resolve(&self.storage.metrics_db)
    }

    pub fn registry_db_path(&self) -> PathBuf {
        self.resolve(&self.storage.registry_db)
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.resolve(&self.storage.assets_dir)
    }

    /// The effective configuration in the format of `config.yaml`.
    pub fn to_yaml(&self) -> eyre::Result<String> {
        serde_yml::to_string(self).wrap_err("Failed to serialize config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use temp_dir::TempDir;

    #[test]
    fn built_in_defaults() {
        let dirs = TempDir::new().unwrap();
        let cfg = Config::with_dirs(dirs.path(), dirs.path(), ConfigArgs::default()).unwrap();

        assert_eq!(
            cfg.analysis,
            AnalysisConfig {
                window: Duration::from_secs(3600),
                min_samples: 5,
                interval: Duration::from_secs(15),
                timeout: Duration::from_secs(60),
                significance: 0.05,
                categorical_max_unique: 5,
            }
        );
        assert_eq!(cfg.http.listen_address, "127.0.0.1:8000".parse().unwrap());
        assert_eq!(cfg.simulator.send_interval, Duration::from_secs(2));
        assert_eq!(cfg.simulator.grace_period, Duration::from_secs(60));
        assert_eq!(cfg.live_db_path(), dirs.path().join("live_data.db"));
        assert_eq!(cfg.assets_dir(), dirs.path().join("model_assets"));
    }

    #[test]
    fn config_file_then_args() {
        let config_dir = TempDir::new().unwrap();
        let data_dir = TempDir::new().unwrap();
        std::fs::write(
            config_dir.path().join("config.yaml"),
            "analysis:\n  window: 30m\n  min_samples: 10\nstorage:\n  metrics_db: /var/lib/metrics.db\n",
        )
        .unwrap();

        let args = ConfigArgs {
            min_samples: Some(20),
            interval: Some("1m 30s".to_string()),
            ..Default::default()
        };
        let cfg = Config::with_dirs(config_dir.path(), data_dir.path(), args).unwrap();

        assert_eq!(cfg.analysis.window, Duration::from_secs(30 * 60));
        assert_eq!(cfg.analysis.min_samples, 20);
        assert_eq!(cfg.analysis.interval, Duration::from_secs(90));
        assert_eq!(cfg.metrics_db_path(), PathBuf::from("/var/lib/metrics.db"));
        assert_eq!(cfg.registry_db_path(), data_dir.path().join("model_registry.db"));
    }

    #[test]
    fn printed_yaml_loads_back_as_the_same_config() {
        let dirs = TempDir::new().unwrap();
        let args = ConfigArgs {
            window: Some("45m".to_string()),
            min_samples: Some(12),
            ..Default::default()
        };
        let cfg = Config::with_dirs(dirs.path(), dirs.path(), args).unwrap();
        let yaml = cfg.to_yaml().unwrap();
        assert!(!yaml.contains("data_dir"));

        let config_dir = TempDir::new().unwrap();
        std::fs::write(config_dir.path().join("config.yaml"), &yaml).unwrap();
        let reloaded = Config::with_dirs(config_dir.path(), dirs.path(), ConfigArgs::default()).unwrap();

        assert_eq!(reloaded.analysis, cfg.analysis);
        assert_eq!(reloaded.analysis.window, Duration::from_secs(45 * 60));
        assert_eq!(reloaded.storage, cfg.storage);
        assert_eq!(reloaded.http, cfg.http);
        assert_eq!(reloaded.simulator, cfg.simulator);
    }

    #[test]
    fn invalid_duration_is_rejected() {
        let dirs = TempDir::new().unwrap();
        let args = ConfigArgs {
            window: Some("soon".to_string()),
            ..Default::default()
        };

        assert!(Config::with_dirs(dirs.path(), dirs.path(), args).is_err());
    }
}
