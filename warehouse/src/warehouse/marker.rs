use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Written next to the data after every successful load.
///
/// `checksum` covers only the Parquet bytes, so two loads of the same rows
/// share it even though `run_id` and `loaded_at` differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadMarker {
    pub table: String,
    pub row_count: u64,
    pub checksum: String,
    pub schema_version: String,
    pub run_id: String,
    pub loaded_at: DateTime<Utc>,
}

pub fn checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_hex_sha256() {
        assert_eq!(
            checksum(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn marker_json_round_trips() {
        let marker = LoadMarker {
            table: "dim_tiempo".into(),
            row_count: 1096,
            checksum: checksum(b"parquet"),
            schema_version: "1".into(),
            run_id: "run".into(),
            loaded_at: Utc::now(),
        };

        let json = serde_json::to_vec_pretty(&marker).unwrap();
        let parsed: LoadMarker = serde_json::from_slice(&json).unwrap();
        assert_eq!(parsed, marker);
    }
}
