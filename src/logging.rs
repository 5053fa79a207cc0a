use color_eyre::Result;
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
    Layer,
};

const DEFAULT_FILTER: &str = "info";

pub fn init_errors() -> Result<()> {
    color_eyre::install()
}

/// Logs to stderr, filtered by `RUST_LOG` and `info` when it is unset.
pub fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_filter(filter))
        .with(tracing_error::ErrorLayer::default())
        .try_init()?;

    Ok(())
}
