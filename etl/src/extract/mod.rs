mod dates;
mod parse;

pub use dates::parse_authorization_date;
pub use parse::parse_extract;

use common::config::{ColumnSettings, SourceSettings};
use common::storage::ObjectStorage;
use common::{Error, Result};
use encoding_rs::Encoding;
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::{Extract, ExtractStats, RawEventRecord};

/// Fixed description of how extract files are encoded and laid out.
#[derive(Debug, Clone)]
pub struct ExtractFormat {
    pub encoding: &'static Encoding,
    pub delimiter: u8,
    pub columns: ColumnSettings,
    pub date_formats: Vec<String>,
}

impl ExtractFormat {
    pub fn from_settings(settings: &SourceSettings) -> Result<Self> {
        let encoding = Encoding::for_label(settings.encoding.as_bytes()).ok_or_else(|| {
            Error::InvalidInput(format!("unknown source encoding '{}'", settings.encoding))
        })?;

        let delimiter = match settings.delimiter.as_bytes() {
            [byte] => *byte,
            _ => {
                return Err(Error::InvalidInput(format!(
                    "source delimiter must be one byte, got '{}'",
                    settings.delimiter
                )));
            }
        };

        Ok(Self {
            encoding,
            delimiter,
            columns: settings.columns.clone(),
            date_formats: settings.date_formats.clone(),
        })
    }
}

impl Default for ExtractFormat {
    fn default() -> Self {
        let settings = SourceSettings::default();
        Self {
            // WHATWG maps the "latin1" label to windows-1252
            encoding: encoding_rs::WINDOWS_1252,
            delimiter: b';',
            columns: settings.columns,
            date_formats: settings.date_formats,
        }
    }
}

/// Reads authorization extracts from the source bucket.
pub struct RawExtractReader {
    storage: Arc<dyn ObjectStorage>,
    format: ExtractFormat,
}

impl RawExtractReader {
    pub fn new(storage: Arc<dyn ObjectStorage>, format: ExtractFormat) -> Self {
        Self { storage, format }
    }

    /// Fetches every file and concatenates their rows in the order given.
    ///
    /// Fails with [`Error::SourceUnavailable`] on the first file that cannot be
    /// retrieved. Malformed rows never fail the read.
    pub async fn read_all(&self, files: &[String]) -> Result<Extract> {
        let per_file = try_join_all(files.iter().map(|file| self.read_file(file))).await?;

        let mut extract = Extract::default();
        for (records, stats) in per_file {
            extract.records.extend(records);
            extract.stats.merge(&stats);
        }

        info!(
            files = extract.stats.files,
            rows = extract.stats.rows,
            skipped_rows = extract.stats.skipped_rows,
            null_dates = extract.stats.null_dates,
            "Read authorization extracts"
        );

        Ok(extract)
    }

    pub async fn read_file(&self, file: &str) -> Result<(Vec<RawEventRecord>, ExtractStats)> {
        let bytes = self
            .storage
            .get_object(file)
            .await
            .map_err(|e| Error::SourceUnavailable {
                file: format!("s3://{}/{}", self.storage.bucket(), file),
                reason: e.to_string(),
            })?;

        let (records, stats) = parse_extract(&bytes, &self.format, file)?;

        if stats.skipped_rows > 0 || stats.null_dates > 0 {
            warn!(
                file,
                skipped_rows = stats.skipped_rows,
                null_dates = stats.null_dates,
                "Extract contains rows with data-quality issues"
            );
        }
        info!(file, rows = stats.rows, bytes = bytes.len(), "Parsed extract file");

        Ok((records, stats))
    }
}
