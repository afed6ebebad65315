#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::adapters::sheets::DEFAULT_SHEETS_ENDPOINT;
use crate::core::fetcher::DEFAULT_ENDPOINT;
use crate::core::pipeline::PipelineSettings;
use crate::core::retry::RetryPolicy;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_non_empty_string, validate_positive_number, validate_range, validate_required_field,
    validate_sheet_range, validate_url, Validate,
};
use std::path::PathBuf;
use std::time::Duration;

#[cfg(feature = "cli")]
pub use cli::CliArgs;
pub use toml_config::FileConfig;

pub const SPREADSHEET_ID_FIELD: &str = "spreadsheet_id (GOOGLE_SHEET_ID)";
pub const API_KEY_FIELD: &str = "api_key (SCRAPIN_API_KEY)";

/// Local CSV files used instead of Google Sheets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSheetConfig {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
}

/// Everything a run needs, resolved once at startup and passed down explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnricherConfig {
    pub spreadsheet_id: Option<String>,
    pub api_key: Option<String>,
    pub api_endpoint: String,
    pub sheets_endpoint: String,
    pub input_range: String,
    pub output_sheet: String,
    pub concurrent_requests: usize,
    pub request_timeout_secs: u64,
    pub retry_max_attempts: u32,
    pub retry_initial_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
    pub local: Option<LocalSheetConfig>,
}

impl Default for EnricherConfig {
    fn default() -> Self {
        let settings = PipelineSettings::default();
        Self {
            spreadsheet_id: None,
            api_key: None,
            api_endpoint: DEFAULT_ENDPOINT.to_string(),
            sheets_endpoint: DEFAULT_SHEETS_ENDPOINT.to_string(),
            input_range: settings.input_range,
            output_sheet: settings.output_sheet,
            concurrent_requests: settings.concurrent_requests,
            request_timeout_secs: 30,
            retry_max_attempts: 8,
            retry_initial_delay_ms: 1_000,
            retry_max_delay_ms: 60_000,
            credentials_path: PathBuf::from("credentials.json"),
            token_path: PathBuf::from("token.json"),
            local: None,
        }
    }
}

impl EnricherConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_max_attempts,
            Duration::from_millis(self.retry_initial_delay_ms),
            Duration::from_millis(self.retry_max_delay_ms),
        )
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            input_range: self.input_range.clone(),
            output_sheet: self.output_sheet.clone(),
            concurrent_requests: self.concurrent_requests,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// 套用設定檔中有填的欄位
    pub fn apply_file(&mut self, file: FileConfig) {
        if let Some(sheets) = file.sheets {
            set(&mut self.spreadsheet_id, resolved(sheets.spreadsheet_id).map(Some));
            set(&mut self.sheets_endpoint, sheets.endpoint);
            set(&mut self.input_range, sheets.input_range);
            set(&mut self.output_sheet, sheets.output_sheet);
        }
        if let Some(enrichment) = file.enrichment {
            set(&mut self.api_key, resolved(enrichment.api_key).map(Some));
            set(&mut self.api_endpoint, enrichment.endpoint);
            set(&mut self.request_timeout_secs, enrichment.timeout_seconds);
        }
        if let Some(pipeline) = file.pipeline {
            set(&mut self.concurrent_requests, pipeline.concurrent_requests);
        }
        if let Some(retry) = file.retry {
            set(&mut self.retry_max_attempts, retry.max_attempts);
            set(&mut self.retry_initial_delay_ms, retry.initial_delay_ms);
            set(&mut self.retry_max_delay_ms, retry.max_delay_ms);
        }
        if let Some(auth) = file.auth {
            set(&mut self.credentials_path, auth.credentials_path);
            set(&mut self.token_path, auth.token_path);
        }
    }
}

fn set<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

/// 未被替換的 `${VAR}` 視為未設定
fn resolved(value: Option<String>) -> Option<String> {
    value.filter(|v| !(v.starts_with("${") && v.ends_with('}')))
}

impl Validate for EnricherConfig {
    fn validate(&self) -> Result<()> {
        if self.local.is_none() {
            let sheet_id = validate_required_field(SPREADSHEET_ID_FIELD, &self.spreadsheet_id)?;
            validate_non_empty_string(SPREADSHEET_ID_FIELD, sheet_id)?;
            validate_url("sheets.endpoint", &self.sheets_endpoint)?;
        }
        let api_key = validate_required_field(API_KEY_FIELD, &self.api_key)?;
        validate_non_empty_string(API_KEY_FIELD, api_key)?;
        validate_url("enrichment.endpoint", &self.api_endpoint)?;
        validate_sheet_range("sheets.input_range", &self.input_range)?;
        validate_non_empty_string("sheets.output_sheet", &self.output_sheet)?;
        validate_range("pipeline.concurrent_requests", self.concurrent_requests, 1, 100)?;
        validate_positive_number("enrichment.timeout_seconds", self.request_timeout_secs as usize, 1)?;
        validate_range("retry.max_attempts", self.retry_max_attempts, 1, 20)?;

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }
}
