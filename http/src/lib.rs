//! HTTP API of the drift monitor: ingestion of live observations, model
//! registration and the read side of the metrics store.

#[macro_use]
extern crate tracing;

pub mod error;
mod handlers;
pub mod router;

pub use error::AppError;
pub use router::{
    create_router,
    serve,
    AppState,
};
