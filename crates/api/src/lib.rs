pub mod cache;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod runner;
pub mod server;

pub use cache::DocumentCache;
pub use config::AppConfig;
pub use metrics::Metrics;
pub use pipeline::{DocumentSummary, Pipeline};
pub use runner::Runner;

use anyhow::Result;
use std::sync::Arc;

/// Pipeline, limiter and cache wired from one config.
pub fn build_runner(config: &AppConfig, metrics: Arc<Metrics>) -> Result<Runner> {
    let pipeline = Pipeline::from_config(config)?;
    let runner = Runner::new(pipeline, config.concurrency.max_concurrent_documents, metrics);

    Ok(if config.cache.enabled {
        runner.with_cache(Arc::new(DocumentCache::new(config.cache.max_entries)))
    } else {
        runner
    })
}
