//! Decoding of uploaded score sheets into an untyped table.
//!
//! Accepts plain or gzip-compressed CSV, with or without a UTF-8 byte order
//! mark (spreadsheet exports usually carry one). No values are interpreted
//! here; that is the job of [`crate::analyzers::validate`].

use std::borrow::Cow;
use std::io::Read;

use flate2::read::GzDecoder;
use tracing::debug;

use crate::error::{Result, ScoreError};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Header names plus string cells, exactly as uploaded.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Rows skipped because a cell was not valid UTF-8.
    pub undecodable: usize,
}

impl RawTable {
    /// Position of the first header matching any of `aliases`.
    pub fn column_index(&self, aliases: &[String]) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| aliases.iter().any(|a| a.trim() == h.as_str()))
    }

    /// Cell at `row`/`column`; missing trailing cells read as empty.
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Decodes raw upload bytes into a [`RawTable`].
///
/// # Errors
///
/// Returns [`ScoreError::EmptyTable`] when there is no header row, and
/// propagates gzip and CSV decoding failures. A header that is not UTF-8 is
/// fatal; a data row that is not is skipped and counted in
/// [`RawTable::undecodable`].
pub fn parse_table(bytes: &[u8]) -> Result<RawTable> {
    let bytes: Cow<'_, [u8]> = if bytes.starts_with(&GZIP_MAGIC) {
        let mut decoded = Vec::new();
        GzDecoder::new(bytes).read_to_end(&mut decoded)?;
        debug!(
            compressed = bytes.len(),
            decompressed = decoded.len(),
            "Decompressed gzip input"
        );
        Cow::Owned(decoded)
    } else {
        Cow::Borrowed(bytes)
    };
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes[..]);

    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body);

    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    if headers.iter().all(String::is_empty) {
        return Err(ScoreError::EmptyTable);
    }

    let mut rows = Vec::new();
    let mut undecodable = 0usize;
    for (index, record) in rdr.byte_records().enumerate() {
        let record = record?;
        match decode_row(&record) {
            Some(row) => rows.push(row),
            None => {
                debug!(row = index, "Row is not valid UTF-8, skipped");
                undecodable += 1;
            }
        }
    }

    debug!(
        columns = headers.len(),
        rows = rows.len(),
        undecodable,
        "Table decoded"
    );
    Ok(RawTable {
        headers,
        rows,
        undecodable,
    })
}

fn decode_row(record: &csv::ByteRecord) -> Option<Vec<String>> {
    record
        .iter()
        .map(|field| std::str::from_utf8(field).ok().map(str::to_string))
        .collect()
}
