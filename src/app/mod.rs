// Application layer: wires config, adapters and the pipeline for one run.

use crate::adapters::{CsvSheet, GoogleAuthenticator, GoogleSheets};
use crate::config::{EnricherConfig, API_KEY_FIELD, SPREADSHEET_ID_FIELD};
use crate::core::etl::EnrichmentEngine;
use crate::core::fetcher::ProfileFetcher;
use crate::core::formatter::COLUMNS;
use crate::core::pipeline::EnrichmentPipeline;
use crate::core::{RunReport, SheetGateway};
use crate::utils::error::Result;
use crate::utils::validation::validate_required_field;

pub async fn run(config: &EnricherConfig) -> Result<RunReport> {
    let api_key = validate_required_field(API_KEY_FIELD, &config.api_key)?;
    let fetcher = ProfileFetcher::new(
        &config.api_endpoint,
        api_key,
        config.request_timeout(),
        config.retry_policy(),
    )?;

    match &config.local {
        Some(local) => {
            tracing::info!(
                "📄 Using local sheet {} -> {}",
                local.input_path.display(),
                local.output_dir.display()
            );
            let gateway =
                CsvSheet::new(&local.input_path, &local.output_dir).with_header(&COLUMNS);
            run_pipeline(gateway, fetcher, config).await
        }
        None => {
            let spreadsheet_id = validate_required_field(SPREADSHEET_ID_FIELD, &config.spreadsheet_id)?;
            tracing::info!("Authenticating Google API");
            let auth = GoogleAuthenticator::from_files(
                &config.credentials_path,
                &config.token_path,
                config.request_timeout(),
            )
            .await?;
            let gateway = GoogleSheets::new(
                &config.sheets_endpoint,
                spreadsheet_id.as_str(),
                auth,
                config.request_timeout(),
            )?;
            run_pipeline(gateway, fetcher, config).await
        }
    }
}

async fn run_pipeline<G: SheetGateway>(
    gateway: G,
    fetcher: ProfileFetcher,
    config: &EnricherConfig,
) -> Result<RunReport> {
    let pipeline = EnrichmentPipeline::new(
        gateway,
        fetcher,
        config.pipeline_settings(),
        config.retry_policy(),
    );
    EnrichmentEngine::new(pipeline).run().await
}
