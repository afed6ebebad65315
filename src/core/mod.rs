pub mod etl;
pub mod fetcher;
pub mod formatter;
pub mod pipeline;
pub mod retry;

pub use crate::domain::model::{FetchResult, OutputRow, ProfileUrl, RunReport, TransformResult};
pub use crate::domain::ports::{Pipeline, ProfileSource, SheetGateway, TokenSource};
pub use crate::utils::error::Result;
