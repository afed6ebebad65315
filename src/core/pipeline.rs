use crate::core::formatter::format_row;
use crate::core::retry::RetryPolicy;
use crate::core::{Pipeline, ProfileSource, ProfileUrl, RunReport, SheetGateway, TransformResult};
use crate::utils::error::Result;
use futures::stream::{self, StreamExt};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub input_range: String,
    pub output_sheet: String,
    pub concurrent_requests: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            input_range: "URLs!A:A".to_string(),
            output_sheet: "Status_200".to_string(),
            concurrent_requests: 10,
        }
    }
}

/// Reads profile URLs from the sheet, enriches them and appends one row per
/// successful lookup.
pub struct EnrichmentPipeline<G: SheetGateway, P: ProfileSource> {
    gateway: G,
    source: P,
    settings: PipelineSettings,
    write_retry: RetryPolicy,
}

impl<G: SheetGateway, P: ProfileSource> EnrichmentPipeline<G, P> {
    pub fn new(gateway: G, source: P, settings: PipelineSettings, write_retry: RetryPolicy) -> Self {
        Self {
            gateway,
            source,
            settings,
            write_retry,
        }
    }
}

#[async_trait::async_trait]
impl<G: SheetGateway, P: ProfileSource> Pipeline for EnrichmentPipeline<G, P> {
    async fn extract(&self) -> Result<Vec<ProfileUrl>> {
        tracing::debug!("Reading profile URLs from {}", self.settings.input_range);
        let cells = self.gateway.read_column(&self.settings.input_range).await?;

        Ok(cells
            .into_iter()
            .filter(|cell| !cell.is_empty())
            .map(ProfileUrl::new)
            .collect())
    }

    async fn transform(&self, urls: Vec<ProfileUrl>) -> Result<TransformResult> {
        let urls_read = urls.len();
        let limit = self.settings.concurrent_requests.max(1);
        tracing::debug!("Fetching {} profiles, {} at a time", urls_read, limit);

        // 先收集成 Vec，避免 async_trait 內 stream.map 的生命週期推斷錯誤
        let fetches: Vec<_> = urls.iter().map(|url| self.source.fetch_profile(url)).collect();

        // buffered() 保持輸入順序
        let results = stream::iter(fetches)
            .buffered(limit)
            .collect::<Vec<_>>()
            .await;

        let mut rows = Vec::new();
        for (url, result) in urls.iter().zip(results.iter()) {
            match result.usable_payload() {
                Some(payload) => rows.push(format_row(payload)),
                None => tracing::debug!("Skipping {} (status {:?})", url, result.status),
            }
        }

        Ok(TransformResult {
            skipped: urls_read - rows.len(),
            rows,
            urls_read,
        })
    }

    async fn load(&self, result: TransformResult) -> Result<RunReport> {
        let sheet = self.settings.output_sheet.as_str();
        let mut rows_written = 0;

        for row in &result.rows {
            self.write_retry
                .run(&format!("append row to {}", sheet), || {
                    self.gateway.append_row(sheet, row.values())
                })
                .await?;
            rows_written += 1;
            tracing::debug!("Appended row {}/{} to {}", rows_written, result.rows.len(), sheet);
        }

        Ok(RunReport {
            urls_read: result.urls_read,
            fetched_ok: result.rows.len(),
            skipped: result.skipped,
            rows_written,
        })
    }
}
