pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliArgs;
pub use config::EnricherConfig;

pub use core::{
    etl::EnrichmentEngine, fetcher::ProfileFetcher, pipeline::EnrichmentPipeline,
    retry::RetryPolicy,
};
pub use utils::error::{EnricherError, Result};
