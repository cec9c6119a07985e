use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Serialize;

use crate::score::ScoreTriple;

pub const HEADER: [&str; 7] = [
    "URL",
    "Extracted Text",
    "Analysis Result",
    "Gold Standard",
    "Accuracy",
    "Precision",
    "Recall",
];

/// One row of the result table. `None` fields are written as empty cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRecord {
    pub url: String,
    pub extracted_text: String,
    pub analysis_result: Option<String>,
    pub gold_standard: Option<String>,
    pub accuracy: Option<f64>,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
}

impl OutputRecord {
    /// Row for a page whose title/body were not found: no analysis, no scores.
    pub fn skipped(url: &str, extracted_text: String) -> Self {
        Self {
            url: url.to_owned(),
            extracted_text,
            analysis_result: None,
            gold_standard: None,
            accuracy: None,
            precision: None,
            recall: None,
        }
    }

    pub fn scored(
        url: &str,
        extracted_text: String,
        analysis_result: String,
        gold_standard: String,
        score: ScoreTriple,
    ) -> Self {
        Self {
            url: url.to_owned(),
            extracted_text,
            analysis_result: Some(analysis_result),
            gold_standard: Some(gold_standard),
            accuracy: Some(score.accuracy),
            precision: Some(score.precision),
            recall: Some(score.recall),
        }
    }
}

/// Append-only CSV result table.
///
/// Whether a header is needed is decided once, from whether the file existed
/// when the table was opened. Each append opens, writes and closes the file so
/// finished rows survive a crash.
#[derive(Debug)]
pub struct ResultTable {
    path: PathBuf,
    write_header: bool,
}

impl ResultTable {
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let write_header = !path.exists();
        Self { path, write_header }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn writes_header(&self) -> bool {
        self.write_header
    }

    pub fn append(&mut self, record: &OutputRecord) -> anyhow::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open result table: {}", self.path.display()))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::CRLF)
            .from_writer(file);

        if self.write_header {
            writer
                .write_record(HEADER)
                .context("write result table header")?;
        }
        writer
            .serialize(record)
            .with_context(|| format!("write result row for {}", record.url))?;
        writer
            .flush()
            .with_context(|| format!("flush result table: {}", self.path.display()))?;

        self.write_header = false;
        Ok(())
    }
}
