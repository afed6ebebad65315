use crate::core::{Pipeline, RunReport};
use crate::utils::error::Result;

pub struct EnrichmentEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> EnrichmentEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<RunReport> {
        tracing::info!("Starting enrichment run...");

        // Extract
        let urls = self.pipeline.extract().await?;
        tracing::info!("📥 Read {} profile URLs", urls.len());

        // Transform
        let transformed = self.pipeline.transform(urls).await?;
        tracing::info!(
            "🔎 Enriched {} profiles, skipped {}",
            transformed.rows.len(),
            transformed.skipped
        );

        // Load
        let report = self.pipeline.load(transformed).await?;
        tracing::info!("📤 Appended {} rows", report.rows_written);

        Ok(report)
    }
}
