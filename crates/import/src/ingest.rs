use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use thiserror::Error;

use crate::config::ImportConfig;

pub type RawRow = Vec<String>;

/// Dialog-level failures. None of them is fatal; the caller stays on the
/// upload step and asks for another file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("Unsupported file type: {0} (expected .csv or .json)")]
    UnsupportedExtension(String),
    #[error("File could not be parsed: {0}")]
    FileFormat(String),
    #[error("JSON is neither a backup nor a list of transactions")]
    StructuralMismatch,
    #[error("File contains no usable rows")]
    EmptyFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Json,
}

impl FileKind {
    /// The extension is the only discriminator; content is never sniffed.
    pub fn from_name(file_name: &str) -> Result<Self, IngestError> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(FileKind::Csv),
            "json" => Ok(FileKind::Json),
            _ => Err(IngestError::UnsupportedExtension(file_name.to_string())),
        }
    }
}

/// Untyped rows of one file. When `has_header` is set, `rows[0]` is the header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawTable {
    pub rows: Vec<RawRow>,
    pub has_header: bool,
}

impl RawTable {
    /// Width of the widest row.
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(|r| r.len()).max().unwrap_or(0)
    }

    pub fn header(&self) -> Option<&RawRow> {
        if self.has_header {
            self.rows.first()
        } else {
            None
        }
    }

    pub fn data_rows(&self) -> &[RawRow] {
        let start = usize::from(self.has_header).min(self.rows.len());
        &self.rows[start..]
    }
}

/// A full application export, handed untouched to the restore collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupPayload {
    pub transactions: Vec<Value>,
    pub categories: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BackupPayload {
    pub(crate) fn is_backup(map: &Map<String, Value>) -> bool {
        map.get("categories").is_some_and(Value::is_array)
            && map.get("transactions").is_some_and(Value::is_array)
    }

    pub(crate) fn from_map(mut map: Map<String, Value>) -> Self {
        let mut take_array = |key: &str| match map.remove(key) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        let transactions = take_array("transactions");
        let categories = take_array("categories");
        let timestamp = map.remove("timestamp");
        Self { transactions, categories, timestamp, extra: map }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngestedFile {
    Table(RawTable),
    Backup(BackupPayload),
}

/// Reads a whole file into either a raw table or a backup payload.
pub fn ingest(file_name: &str, data: &[u8], config: &ImportConfig) -> Result<IngestedFile, IngestError> {
    let kind = FileKind::from_name(file_name)?;
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
    if data.iter().all(u8::is_ascii_whitespace) {
        return Err(IngestError::EmptyFile);
    }
    let file = match kind {
        FileKind::Csv => IngestedFile::Table(crate::csv::read_table(data, config)?),
        FileKind::Json => crate::json::read_json(data)?,
    };
    match &file {
        IngestedFile::Table(t) => {
            tracing::info!(file = file_name, rows = t.rows.len(), header = t.has_header, "ingested table")
        }
        IngestedFile::Backup(b) => tracing::info!(
            file = file_name,
            transactions = b.transactions.len(),
            categories = b.categories.len(),
            "detected full backup"
        ),
    }
    Ok(file)
}
