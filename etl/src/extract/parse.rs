use common::{Error, Result};
use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, warn};

use super::ExtractFormat;
use super::dates::parse_authorization_date;
use crate::models::{ExtractStats, RawEventRecord};

/// Column positions of the canonical fields inside one file's header.
struct ColumnIndex {
    identifier: usize,
    display_name: usize,
    authorization_date: usize,
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord, format: &ExtractFormat, file: &str) -> Result<Self> {
        let position = |name: &str| -> Result<usize> {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| {
                    Error::SchemaMismatch(format!(
                        "file '{}' has no '{}' column (found: {:?})",
                        file,
                        name,
                        headers.iter().map(str::trim).collect::<Vec<_>>()
                    ))
                })
        };

        Ok(Self {
            identifier: position(&format.columns.identifier)?,
            display_name: position(&format.columns.display_name)?,
            authorization_date: position(&format.columns.authorization_date)?,
        })
    }
}

/// Decode and parse one extract file.
///
/// The whole file is decoded with the configured encoding before the CSV reader
/// sees it. Rows whose mapped fields are all blank (separator-only padding
/// lines) are skipped and counted. A missing mapped column fails the file.
pub fn parse_extract(
    bytes: &[u8],
    format: &ExtractFormat,
    file: &str,
) -> Result<(Vec<RawEventRecord>, ExtractStats)> {
    let (text, _, had_errors) = format.encoding.decode(bytes);
    if had_errors {
        warn!(file, encoding = format.encoding.name(), "Replaced undecodable bytes in extract");
    }

    let mut reader = ReaderBuilder::new()
        .delimiter(format.delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let index = ColumnIndex::from_headers(&headers, format, file)?;

    let mut records = Vec::new();
    let mut stats = ExtractStats {
        files: 1,
        ..Default::default()
    };

    for (line, result) in reader.records().enumerate() {
        let row = result?;
        let field = |i: usize| row.get(i).unwrap_or("").trim();

        if [index.identifier, index.display_name, index.authorization_date]
            .iter()
            .all(|&i| field(i).is_empty())
        {
            debug!(file, line = line + 2, "Skipping blank extract row");
            stats.skipped_rows += 1;
            continue;
        }

        let authorization_date =
            parse_authorization_date(field(index.authorization_date), &format.date_formats);
        if authorization_date.is_none() {
            stats.null_dates += 1;
        }

        records.push(RawEventRecord::new(
            field(index.identifier),
            field(index.display_name),
            authorization_date,
        ));
        stats.rows += 1;
    }

    Ok((records, stats))
}
