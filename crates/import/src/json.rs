use serde_json::{Map, Value};

use crate::ingest::{BackupPayload, IngestError, IngestedFile, RawRow, RawTable};

/// Classifies parsed JSON by shape: a backup object, a bare array of
/// transaction objects, or an object wrapping exactly one array.
pub fn read_json(data: &[u8]) -> Result<IngestedFile, IngestError> {
    let value: Value =
        serde_json::from_slice(data).map_err(|e| IngestError::FileFormat(format!("JSON: {e}")))?;

    match value {
        Value::Object(map) if BackupPayload::is_backup(&map) => {
            Ok(IngestedFile::Backup(BackupPayload::from_map(map)))
        }
        Value::Array(items) => flatten(items).map(IngestedFile::Table),
        Value::Object(map) => match single_array(map) {
            Some(items) => flatten(items).map(IngestedFile::Table),
            None => Err(IngestError::StructuralMismatch),
        },
        _ => Err(IngestError::StructuralMismatch),
    }
}

fn single_array(map: Map<String, Value>) -> Option<Vec<Value>> {
    let mut arrays = map.into_iter().filter_map(|(_, v)| match v {
        Value::Array(items) => Some(items),
        _ => None,
    });
    let first = arrays.next()?;
    arrays.next().is_none().then_some(first)
}

/// Header is the union of object keys in first-seen order; absent keys
/// become empty cells.
fn flatten(items: Vec<Value>) -> Result<RawTable, IngestError> {
    if items.is_empty() {
        return Err(IngestError::EmptyFile);
    }
    let objects: Vec<Map<String, Value>> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect();
    if objects.is_empty() {
        return Err(IngestError::StructuralMismatch);
    }

    let mut header: Vec<String> = Vec::new();
    for obj in &objects {
        for key in obj.keys() {
            if !header.contains(key) {
                header.push(key.clone());
            }
        }
    }
    if header.is_empty() {
        return Err(IngestError::EmptyFile);
    }

    let mut rows: Vec<RawRow> = Vec::with_capacity(objects.len() + 1);
    rows.push(header.clone());
    for obj in &objects {
        rows.push(
            header
                .iter()
                .map(|key| obj.get(key).map(cell_text).unwrap_or_default())
                .collect(),
        );
    }
    Ok(RawTable { rows, has_header: true })
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}
