use crate::classify::looks_like_header;
use crate::config::ImportConfig;
use crate::ingest::{IngestError, RawRow, RawTable};

const DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Picks the candidate delimiter seen most often outside quotes on the first
/// non-blank line. Comma on a tie or when none appears.
pub fn detect_delimiter(data: &[u8]) -> u8 {
    let text = String::from_utf8_lossy(data);
    let Some(line) = text.lines().find(|l| !l.trim().is_empty()) else {
        return b',';
    };
    let mut counts = [0usize; DELIMITERS.len()];
    let mut in_quotes = false;
    for b in line.bytes() {
        if b == b'"' {
            in_quotes = !in_quotes;
        } else if !in_quotes {
            if let Some(i) = DELIMITERS.iter().position(|d| *d == b) {
                counts[i] += 1;
            }
        }
    }
    let mut best = 0;
    for i in 1..DELIMITERS.len() {
        if counts[i] > counts[best] {
            best = i;
        }
    }
    DELIMITERS[best]
}

/// Parses CSV bytes into raw rows. Rows whose cells are all blank are dropped.
pub fn read_table(data: &[u8], config: &ImportConfig) -> Result<RawTable, IngestError> {
    let delimiter = detect_delimiter(data);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(data);

    let mut rows: Vec<RawRow> = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| IngestError::FileFormat(format!("CSV: {e}")))?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        rows.push(record.iter().map(|s| s.to_string()).collect());
    }

    if rows.is_empty() {
        return Err(IngestError::EmptyFile);
    }
    let has_header = looks_like_header(&rows[0], config);
    if has_header && rows.len() == 1 {
        return Err(IngestError::EmptyFile);
    }
    Ok(RawTable { rows, has_header })
}
