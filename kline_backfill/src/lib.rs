#[cfg(feature = "cli")]
pub mod cli;
pub mod backfill;
pub mod config;
pub mod errors;
pub mod io;
pub mod models;
pub mod normalizer;
pub mod pipeline;
pub mod providers;
pub mod translate;
pub mod utils;

pub use errors::{Error, Result};
