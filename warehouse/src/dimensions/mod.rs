//! Dimension tables of the authorization star schema.

mod entity_type;
mod geography;
mod taxpayer;
mod time;

pub use entity_type::{EntityTypeDimensionBuilder, EntityTypeDimensionRow};
pub use geography::{GeographyDimensionBuilder, GeographyDimensionRow};
pub use taxpayer::{TaxpayerDimensionBuilder, TaxpayerDimensionRow, TaxpayerStats};
pub use time::{TimeDimensionBuilder, TimeDimensionRow};
