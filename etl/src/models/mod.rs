mod record;

pub use record::{Extract, ExtractStats, RawEventRecord};
