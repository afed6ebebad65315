use crate::domain::model::{FetchResult, ProfileUrl, RunReport, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Read/append access to a spreadsheet.
#[async_trait]
pub trait SheetGateway: Send + Sync {
    /// Returns the non-empty cells of an A1 range such as `URLs!A:A`, top to bottom.
    async fn read_column(&self, range: &str) -> Result<Vec<String>>;

    /// Appends one row below the existing data of `sheet_name`.
    async fn append_row(&self, sheet_name: &str, values: &[String]) -> Result<()>;
}

/// Source of enrichment data for a single profile URL. Never fails: a transport
/// failure comes back as an empty `FetchResult`.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn fetch_profile(&self, url: &ProfileUrl) -> FetchResult;
}

#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<ProfileUrl>>;
    async fn transform(&self, urls: Vec<ProfileUrl>) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<RunReport>;
}
