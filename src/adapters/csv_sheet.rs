use crate::domain::ports::SheetGateway;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Local stand-in for a spreadsheet: the input column is the first column of
/// a CSV file, and each output sheet is `{output_dir}/{sheet}.csv`.
///
/// With a header configured, a newly created output file starts with it, the
/// same way the Google sheet keeps its header in row 1.
#[derive(Debug)]
pub struct CsvSheet {
    input_path: PathBuf,
    output_dir: PathBuf,
    header: Option<Vec<String>>,
    write_lock: Mutex<()>,
}

impl CsvSheet {
    pub fn new(input_path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_dir: output_dir.into(),
            header: None,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_header(mut self, columns: &[&str]) -> Self {
        self.header = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn sheet_path(&self, sheet_name: &str) -> PathBuf {
        self.output_dir.join(format!("{}.csv", sheet_name))
    }

    fn read_first_column(path: &Path) -> Result<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;

        let mut cells = Vec::new();
        for record in reader.records() {
            let record = record?;
            if let Some(cell) = record.get(0) {
                let cell = cell.trim();
                if !cell.is_empty() {
                    cells.push(cell.to_string());
                }
            }
        }
        Ok(cells)
    }
}

#[async_trait]
impl SheetGateway for CsvSheet {
    /// The range is ignored; the whole first column is returned.
    async fn read_column(&self, range: &str) -> Result<Vec<String>> {
        tracing::debug!(
            "Reading {} from local file {}",
            range,
            self.input_path.display()
        );
        Self::read_first_column(&self.input_path)
    }

    async fn append_row(&self, sheet_name: &str, values: &[String]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        std::fs::create_dir_all(&self.output_dir)?;

        let path = self.sheet_path(sheet_name);
        let is_new = !path.exists();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::Writer::from_writer(file);
        if let (true, Some(header)) = (is_new, &self.header) {
            writer.write_record(header)?;
        }
        writer.write_record(values)?;
        writer.flush()?;
        Ok(())
    }
}
