use serde::{Deserialize, Serialize};
use std::fmt;

/// A LinkedIn profile URL as read from the input column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUrl(String);

impl ProfileUrl {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 送出前補上結尾斜線
    pub fn normalized(&self) -> String {
        if self.0.ends_with('/') {
            self.0.clone()
        } else {
            format!("{}/", self.0)
        }
    }
}

impl fmt::Display for ProfileUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProfileUrl {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Outcome of one enrichment call. Both fields are `None` on transport failure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchResult {
    pub payload: Option<serde_json::Value>,
    pub status: Option<u16>,
}

impl FetchResult {
    pub fn new(payload: Option<serde_json::Value>, status: Option<u16>) -> Self {
        Self { payload, status }
    }

    pub fn failed() -> Self {
        Self::default()
    }

    /// Returns the payload only for a 200 response carrying a body.
    pub fn usable_payload(&self) -> Option<&serde_json::Value> {
        match (self.status, &self.payload) {
            (Some(200), Some(payload)) => Some(payload),
            _ => None,
        }
    }
}

/// One flattened spreadsheet row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRow(Vec<String>);

impl OutputRow {
    pub fn new(values: Vec<String>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub rows: Vec<OutputRow>,
    pub urls_read: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub urls_read: usize,
    pub fetched_ok: usize,
    pub skipped: usize,
    pub rows_written: usize,
}
