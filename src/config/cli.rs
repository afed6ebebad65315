use crate::config::{EnricherConfig, FileConfig, LocalSheetConfig};
use crate::utils::error::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "profile-enricher")]
#[command(about = "Enrich LinkedIn profile URLs from a spreadsheet via Scrapin.io")]
pub struct CliArgs {
    /// Path to an optional TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(long, env = "GOOGLE_SHEET_ID", hide_env_values = true)]
    pub spreadsheet_id: Option<String>,

    #[arg(long, env = "SCRAPIN_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Maximum number of enrichment requests in flight
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Attempts per network call before giving up
    #[arg(long)]
    pub max_attempts: Option<u32>,

    #[arg(long)]
    pub input_range: Option<String>,

    #[arg(long)]
    pub output_sheet: Option<String>,

    /// Read URLs from this CSV file instead of Google Sheets
    #[arg(long, requires = "local_output")]
    pub local_input: Option<PathBuf>,

    /// Directory receiving `<sheet>.csv` output files
    #[arg(long, requires = "local_input")]
    pub local_output: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}

impl CliArgs {
    /// 預設值 < 設定檔 < 環境變數 / 命令列
    pub fn into_config(self) -> Result<EnricherConfig> {
        let mut config = EnricherConfig::default();

        if let Some(path) = &self.config {
            tracing::info!("📁 Loading configuration from: {}", path.display());
            config.apply_file(FileConfig::from_file(path)?);
        }

        if let Some(id) = self.spreadsheet_id {
            config.spreadsheet_id = Some(id);
        }
        if let Some(key) = self.api_key {
            config.api_key = Some(key);
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrent_requests = concurrency;
        }
        if let Some(max_attempts) = self.max_attempts {
            config.retry_max_attempts = max_attempts;
        }
        if let Some(range) = self.input_range {
            config.input_range = range;
        }
        if let Some(sheet) = self.output_sheet {
            config.output_sheet = sheet;
        }
        if let (Some(input_path), Some(output_dir)) = (self.local_input, self.local_output) {
            config.local = Some(LocalSheetConfig {
                input_path,
                output_dir,
            });
        }

        Ok(config)
    }
}
