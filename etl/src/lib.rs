//! Extraction side of the authorization warehouse: pulls the raw SRI extract
//! files from object storage and turns them into [`models::RawEventRecord`]s.

pub mod extract;
pub mod models;
pub mod utils;

pub use extract::{ExtractFormat, RawExtractReader};
pub use models::{Extract, ExtractStats, RawEventRecord};
