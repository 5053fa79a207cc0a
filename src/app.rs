use crate::{
    args::{
        Args,
        Command,
        RegisterArgs,
        TrainArgs,
    },
    status::{
        feature_drift_table,
        performance_table,
    },
};
use chrono::Utc;
use color_eyre::Result;
use drift_monitor_analysis::{
    Analyzer,
    AutoDriftTest,
    Collaborators,
    LabelScorer,
    ModelId,
    Predictor,
    Scheduler,
    SchedulerSettings,
    WindowSelector,
};
use drift_monitor_config::Config;
use drift_monitor_http::AppState;
use drift_monitor_simulator::{
    Simulator,
    SimulatorSettings,
};
use drift_monitor_store::{
    assets::read_reference,
    FitSettings,
    FsAssetProvider,
    LogisticModel,
    SqliteMetricsStore,
    SqliteModelRegistry,
    SqliteObservationStore,
};
use eyre::{
    eyre,
    Context as _,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct App {
    config: Config,
    command: Command,
}

impl App {
    pub fn new(args: Args) -> Result<Self> {
        let config = Config::new(args.config).wrap_err("Failed to load the configuration")?;
        debug!(data_dir = %config.data_dir().display(), "configuration ready");

        Ok(Self {
            config,
            command: args.command,
        })
    }

    pub async fn run(self) -> Result<()> {
        let Self { config, command } = self;

        match command {
            Command::Run => scheduler(&config)?.run(shutdown_on_ctrl_c()).await,
            Command::Once => {
                let summary = scheduler(&config)?.run_pass(Utc::now()).await?;
                println!(
                    "persisted: {}, skipped: {}, failed: {}",
                    summary.persisted, summary.skipped, summary.failed
                );
                Ok(())
            }
            Command::Serve => serve(&config).await,
            Command::Register(args) => register(&config, args),
            Command::Train(args) => train(args),
            Command::Status { model_id, limit } => status(&config, &ModelId::new(model_id), limit),
            Command::Simulate { model_id } => simulate(&config, ModelId::new(model_id)).await,
            Command::Config => {
                print!("{}", config.to_yaml()?);
                Ok(())
            }
        }
    }
}

/// A token cancelled on the first Ctrl-C.
fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl-C, shutting down");
                cancel.cancel();
            }
            Err(err) => error!("failed to listen for Ctrl-C: {err}"),
        }
    });
    token
}

fn open_observations(config: &Config) -> Result<SqliteObservationStore> {
    let path = config.live_db_path();
    SqliteObservationStore::open(&path).wrap_err_with(|| format!("Failed to open {}", path.display()))
}

fn open_metrics(config: &Config) -> Result<SqliteMetricsStore> {
    let path = config.metrics_db_path();
    SqliteMetricsStore::open(&path).wrap_err_with(|| format!("Failed to open {}", path.display()))
}

fn open_registry(config: &Config) -> Result<SqliteModelRegistry> {
    let path = config.registry_db_path();
    SqliteModelRegistry::open(&path).wrap_err_with(|| format!("Failed to open {}", path.display()))
}

fn scheduler(config: &Config) -> Result<Scheduler> {
    let analysis = &config.analysis;
    let collaborators = Collaborators {
        observations: Arc::new(open_observations(config)?),
        assets: Arc::new(FsAssetProvider::new(config.assets_dir())),
        registry: Arc::new(open_registry(config)?),
        metrics: Arc::new(open_metrics(config)?),
    };
    let analyzer = Analyzer::new(
        Box::new(AutoDriftTest::new(analysis.significance, analysis.categorical_max_unique)),
        Box::new(LabelScorer::default()),
    );
    let settings = SchedulerSettings {
        interval: analysis.interval,
        analysis_timeout: analysis.timeout,
        ..Default::default()
    };

    Ok(Scheduler::new(
        collaborators,
        WindowSelector::new(analysis.window, analysis.min_samples),
        analyzer,
        settings,
    ))
}

async fn serve(config: &Config) -> Result<()> {
    let state = AppState {
        observations: Arc::new(open_observations(config)?),
        metrics: Arc::new(open_metrics(config)?),
        registry: Arc::new(open_registry(config)?),
        assets: Arc::new(FsAssetProvider::new(config.assets_dir())),
    };
    drift_monitor_http::serve(config.http.listen_address, state, shutdown_on_ctrl_c()).await
}

fn register(config: &Config, args: RegisterArgs) -> Result<()> {
    let reference_csv =
        std::fs::read(&args.reference).wrap_err_with(|| format!("Failed to read {}", args.reference.display()))?;
    let model_json = std::fs::read(&args.model).wrap_err_with(|| format!("Failed to read {}", args.model.display()))?;
    let model: LogisticModel =
        serde_json::from_slice(&model_json).wrap_err_with(|| format!("{} is not a model file", args.model.display()))?;

    let model_id = ModelId::from_name_and_version(&args.model_name, &args.model_version);
    let staged = FsAssetProvider::new(config.assets_dir()).stage_assets(&model_id, &reference_csv, &model)?;

    // The registry row is the uniqueness check; assets of a known model are never touched.
    let registered = open_registry(config)?.register(&args.model_name, &args.model_version, args.description.as_deref())?;
    staged.write()?;

    println!("Registered {}", registered.model_id);
    Ok(())
}

fn train(args: TrainArgs) -> Result<()> {
    let csv = std::fs::read(&args.reference).wrap_err_with(|| format!("Failed to read {}", args.reference.display()))?;
    let reference = read_reference(csv).map_err(|reason| eyre!("Invalid reference data: {reason}"))?;

    let settings = FitSettings {
        learning_rate: args.learning_rate,
        max_iter: args.max_iter,
        alpha: args.alpha,
        ..Default::default()
    };
    let model = LogisticModel::fit(&reference, &settings)?;

    let predictions = model.predict(reference.features())?;
    let correct = predictions
        .iter()
        .zip(reference.target())
        .filter(|(prediction, target)| prediction == target)
        .count();
    let accuracy = correct as f64 / reference.n_rows() as f64;

    std::fs::write(&args.output, serde_json::to_vec_pretty(&model)?)
        .wrap_err_with(|| format!("Failed to write {}", args.output.display()))?;

    info!(rows = reference.n_rows(), accuracy, "model trained");
    println!("Wrote {} (training accuracy {accuracy:.3})", args.output.display());
    Ok(())
}

fn status(config: &Config, model_id: &ModelId, limit: usize) -> Result<()> {
    let metrics = open_metrics(config)?;
    let series = metrics.performance_series(model_id)?;
    if series.is_empty() {
        println!("No metrics recorded for {model_id} yet");
        return Ok(());
    }
    println!("{}", performance_table(&series, limit));

    let snapshot = metrics.latest_feature_drift(model_id)?;
    if !snapshot.is_empty() {
        println!("{}", feature_drift_table(&snapshot));
    }
    Ok(())
}

async fn simulate(config: &Config, model_id: ModelId) -> Result<()> {
    let reference = FsAssetProvider::new(config.assets_dir()).load_reference(&model_id)?;
    let simulator_config = &config.simulator;
    let settings = SimulatorSettings {
        api_url: simulator_config.api_url.clone(),
        send_interval: simulator_config.send_interval,
        grace_period: simulator_config.grace_period,
        retry_interval: simulator_config.retry_interval,
    };

    let sent = Simulator::new(model_id, reference, settings)?
        .run(shutdown_on_ctrl_c())
        .await?;
    println!("Sent {sent} observations");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_monitor_analysis::Observation;
    use drift_monitor_config::ConfigArgs;
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use temp_dir::TempDir;

    const CSV: &str = "size,noise,target\n1,5,0\n2,6,0\n3,5,0\n4,6,0\n11,5,1\n12,6,1\n13,5,1\n14,6,1\n";

    fn config(dir: &TempDir) -> Config {
        Config::with_dirs(dir.path(), dir.path(), ConfigArgs::default()).unwrap()
    }

    fn train_and_register(dir: &TempDir, config: &Config) {
        let reference = dir.path().join("reference.csv");
        let model = dir.path().join("model.json");
        std::fs::write(&reference, CSV).unwrap();

        train(TrainArgs {
            reference: reference.clone(),
            output: model.clone(),
            learning_rate: 0.1,
            max_iter: 1000,
            alpha: 0.01,
        })
        .unwrap();
        register(config, register_args(&reference, &model)).unwrap();
    }

    fn register_args(reference: &Path, model: &Path) -> RegisterArgs {
        RegisterArgs {
            model_name: "Size Model".to_string(),
            model_version: "v1".to_string(),
            description: None,
            reference: reference.to_path_buf(),
            model: model.to_path_buf(),
        }
    }

    #[test]
    fn trained_model_can_be_registered_once() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        train_and_register(&dir, &config);

        let registry = open_registry(&config).unwrap();
        assert_eq!(
            registry.list().unwrap().into_iter().map(|m| m.model_id).collect::<Vec<_>>(),
            vec![ModelId::new("size_model_v1")]
        );
        assert!(config.assets_dir().join("size_model_v1").join("reference_data.csv").is_file());

        let again = register(
            &config,
            register_args(&dir.path().join("reference.csv"), &dir.path().join("model.json")),
        );
        assert!(again.is_err());
    }

    #[test]
    fn second_registration_keeps_the_stored_model() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        train_and_register(&dir, &config);
        let stored = config.assets_dir().join("size_model_v1").join("model.json");
        let original = std::fs::read_to_string(&stored).unwrap();

        let mut replacement: LogisticModel =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("model.json")).unwrap()).unwrap();
        replacement.intercept += 100.0;
        let replacement_path = dir.path().join("replacement.json");
        std::fs::write(&replacement_path, serde_json::to_vec(&replacement).unwrap()).unwrap();

        let again = register(&config, register_args(&dir.path().join("reference.csv"), &replacement_path));

        assert!(again.unwrap_err().to_string().contains("already registered"));
        assert_eq!(std::fs::read_to_string(&stored).unwrap(), original);
    }

    #[tokio::test]
    async fn single_pass_persists_metrics_for_registered_models() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        train_and_register(&dir, &config);

        let observations = open_observations(&config).unwrap();
        let now = Utc::now();
        for (size, noise, target) in [(1.0, 5.0, 0), (3.0, 6.0, 0), (4.0, 5.0, 0), (12.0, 6.0, 1), (13.0, 5.0, 1), (14.0, 6.0, 1)] {
            observations
                .append(&Observation {
                    model_id: ModelId::new("size_model_v1"),
                    features: [("size".to_string(), size), ("noise".to_string(), noise)].into(),
                    ground_truth: target,
                    ingested_at: now,
                })
                .unwrap();
        }

        let summary = scheduler(&config).unwrap().run_pass(Utc::now()).await.unwrap();
        assert_eq!((summary.persisted, summary.skipped, summary.failed), (1, 0, 0));

        let metrics = open_metrics(&config).unwrap();
        let series = metrics.performance_series(&ModelId::new("size_model_v1")).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].window_size, 6);
        assert_eq!(series[0].accuracy, 1.0);
        assert_eq!(metrics.latest_feature_drift(&ModelId::new("size_model_v1")).unwrap().len(), 2);
    }
}
