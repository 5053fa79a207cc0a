use std::{
    net::SocketAddr,
    path::PathBuf,
};

/// Settings that override the configuration files for a single invocation.
#[derive(clap::Args, Debug, Clone, Default)]
#[group(skip)]
pub struct ConfigArgs {
    /// Trailing window of observations analyzed per cycle, e.g. `1h` or `30m`.
    #[arg(long, global = true, value_name = "DURATION")]
    pub window: Option<String>,

    /// Smallest window that is analyzed at all.
    #[arg(long, global = true, value_name = "COUNT")]
    pub min_samples: Option<u64>,

    /// Pause between two passes over all registered models.
    #[arg(long, global = true, value_name = "DURATION")]
    pub interval: Option<String>,

    /// SQLite database with the live observations.
    #[arg(long, global = true, value_name = "FILE")]
    pub live_db: Option<PathBuf>,

    /// SQLite database with the performance and feature drift series.
    #[arg(long, global = true, value_name = "FILE")]
    pub metrics_db: Option<PathBuf>,

    /// SQLite database with the registered models.
    #[arg(long, global = true, value_name = "FILE")]
    pub registry_db: Option<PathBuf>,

    /// Directory with one folder of reference data and model per model id.
    #[arg(long, global = true, value_name = "DIR")]
    pub assets_dir: Option<PathBuf>,

    /// Address the HTTP API listens on.
    #[arg(long, global = true, env = "DRIFT_MONITOR_HTTP_ADDRESS", value_name = "ADDRESS")]
    pub listen_address: Option<SocketAddr>,

    /// Base URL of the HTTP API the traffic generator posts to.
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,
}

mod config_ext {
    use super::*;
    use config::{
        Map,
        Source,
        Value,
    };
    use std::collections::HashMap;

    impl Source for ConfigArgs {
        fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
            Box::new((*self).clone())
        }

        fn collect(&self) -> Result<Map<String, Value>, config::ConfigError> {
            let mut cache = HashMap::<String, Value>::new();
            if let Some(window) = &self.window {
                cache.insert("analysis.window".to_string(), window.clone().into());
            }
            if let Some(min_samples) = self.min_samples {
                cache.insert("analysis.min_samples".to_string(), min_samples.into());
            }
            if let Some(interval) = &self.interval {
                cache.insert("analysis.interval".to_string(), interval.clone().into());
            }
            for (key, path) in [
                ("storage.live_db", &self.live_db),
                ("storage.metrics_db", &self.metrics_db),
                ("storage.registry_db", &self.registry_db),
                ("storage.assets_dir", &self.assets_dir),
            ] {
                if let Some(path) = path {
                    cache.insert(key.to_string(), path.to_string_lossy().into_owned().into());
                }
            }
            if let Some(address) = &self.listen_address {
                cache.insert("http.listen_address".to_string(), address.to_string().into());
            }
            if let Some(api_url) = &self.api_url {
                cache.insert("simulator.api_url".to_string(), api_url.clone().into());
            }
            Ok(cache)
        }
    }
}

pub fn version() -> String {
    let author = clap::crate_authors!();
    let version = clap::crate_version!();
    let config_dir_path = crate::get_config_dir().display().to_string();
    let data_dir_path = crate::get_data_dir().display().to_string();

    format!(
        "\
{version}

Authors: {author}

Config directory: {config_dir_path}
Data directory: {data_dir_path}"
    )
}
