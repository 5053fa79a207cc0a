use clap::{
    Parser,
    Subcommand,
};
use drift_monitor_config::{
    version,
    ConfigArgs,
};
use std::path::PathBuf;

/// Monitors deployed classification models for performance decay and
/// input-distribution drift.
#[derive(Parser, Debug, Clone)]
#[command(author, version = version(), about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    #[clap(flatten)]
    pub config: ConfigArgs,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Analyze every registered model on a fixed interval until Ctrl-C.
    Run,

    /// Run a single analysis pass over every registered model.
    Once,

    /// Serve the ingestion, registration and metrics API.
    Serve,

    /// Register a model version from a reference CSV and a `model.json`.
    Register(RegisterArgs),

    /// Fit a logistic regression on a reference CSV and write it as `model.json`.
    Train(TrainArgs),

    /// Print the performance series and the latest feature drift of a model.
    Status {
        model_id: String,

        /// Number of most recent performance rows to show.
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Post synthetic observations for a model to the API, drifting after a grace period.
    Simulate { model_id: String },

    /// Print the effective configuration.
    Config,
}

#[derive(clap::Args, Debug, Clone)]
pub struct RegisterArgs {
    /// Human readable model name, e.g. `Cancer Model`.
    #[arg(long)]
    pub model_name: String,

    /// Version label, e.g. `v1.0`.
    #[arg(long)]
    pub model_version: String,

    #[arg(long)]
    pub description: Option<String>,

    /// Reference data with a header row and a `target` column.
    #[arg(long, value_name = "FILE")]
    pub reference: PathBuf,

    /// Trained model, as written by `train`.
    #[arg(long, value_name = "FILE")]
    pub model: PathBuf,
}

#[derive(clap::Args, Debug, Clone)]
pub struct TrainArgs {
    /// Reference data with a header row and a binary `target` column.
    #[arg(value_name = "FILE")]
    pub reference: PathBuf,

    #[arg(long, short, value_name = "FILE", default_value = "model.json")]
    pub output: PathBuf,

    #[arg(long, default_value_t = 0.1)]
    pub learning_rate: f64,

    #[arg(long, default_value_t = 1000)]
    pub max_iter: usize,

    /// L2 regularization strength.
    #[arg(long, default_value_t = 0.01)]
    pub alpha: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn cli_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn global_overrides_follow_the_subcommand() {
        let args = Args::try_parse_from(["drift-monitor", "status", "cancer_model_v1.0", "--min-samples", "3"]).unwrap();

        assert_eq!(args.config.min_samples, Some(3));
        match args.command {
            Command::Status { model_id, limit } => {
                assert_eq!(model_id, "cancer_model_v1.0");
                assert_eq!(limit, 20);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn register_needs_both_files() {
        let parsed = Args::try_parse_from(["drift-monitor", "register", "--model-name", "m", "--model-version", "1", "--model", "m.json"]);
        assert!(parsed.is_err());
    }
}
