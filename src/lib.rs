#[macro_use]
extern crate tracing;

mod app;
pub mod args;
mod logging;
mod status;

pub use app::App;
pub use args::{
    Args,
    Command,
};
pub use logging::{
    init_errors,
    init_logging,
};
