use chrono::NaiveDateTime;
use serde::Serialize;

/// One line of an authorization extract, with canonical field names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEventRecord {
    /// Taxpayer identifier exactly as it appeared in the file (trimmed, not padded).
    pub identifier: String,
    pub display_name: String,
    /// `None` when the source value was empty or did not match any configured format.
    pub authorization_date: Option<NaiveDateTime>,
}

impl RawEventRecord {
    pub fn new(
        identifier: impl Into<String>,
        display_name: impl Into<String>,
        authorization_date: Option<NaiveDateTime>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            display_name: display_name.into(),
            authorization_date,
        }
    }
}

/// Row-level counters collected while reading extract files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractStats {
    pub files: usize,
    pub rows: usize,
    pub skipped_rows: usize,
    pub null_dates: usize,
}

impl ExtractStats {
    pub fn merge(&mut self, other: &ExtractStats) {
        self.files += other.files;
        self.rows += other.rows;
        self.skipped_rows += other.skipped_rows;
        self.null_dates += other.null_dates;
    }
}

/// Concatenated records of every requested file, in request order.
#[derive(Debug, Clone, Default)]
pub struct Extract {
    pub records: Vec<RawEventRecord>,
    pub stats: ExtractStats,
}
