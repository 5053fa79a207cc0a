//! Synthetic traffic for a registered model: rows sampled from its reference
//! data are posted to the ingestion endpoint, and after a grace period the
//! rows are distorted so the monitor has drift to detect.

#[macro_use]
extern crate tracing;

mod drift;
mod traffic;

pub use drift::{
    drift_factor,
    DriftTargets,
    NOISE_AMPLITUDE,
    RADIUS_FEATURE,
    SMOOTHNESS_FEATURE,
    TEXTURE_FEATURE,
};
pub use traffic::{
    IngestPayload,
    Simulator,
    SimulatorSettings,
};
