use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::record_batch::RecordBatch;
use common::config::RegionEntry;
use common::{Error, Result};
use std::collections::HashSet;
use std::sync::Arc;

use crate::convert::{WarehouseRow, i64_column, string_column};
use crate::identifier::RegionCode;
use crate::schema::Table;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeographyDimensionRow {
    pub id_geografia: i64,
    pub codigo_region: RegionCode,
    pub nombre_region: String,
}

/// Region enumeration, keyed in configuration order.
#[derive(Debug, Clone)]
pub struct GeographyDimensionBuilder {
    regions: Vec<RegionEntry>,
}

impl GeographyDimensionBuilder {
    pub fn new(regions: Vec<RegionEntry>) -> Self {
        Self { regions }
    }

    pub fn build(&self) -> Result<Vec<GeographyDimensionRow>> {
        let mut seen = HashSet::new();
        let mut rows = Vec::with_capacity(self.regions.len());

        for (i, entry) in self.regions.iter().enumerate() {
            let codigo_region = RegionCode::parse(&entry.codigo)?;
            if !seen.insert(codigo_region.clone()) {
                return Err(Error::InvalidInput(format!(
                    "region code {} is configured more than once",
                    codigo_region
                )));
            }

            rows.push(GeographyDimensionRow {
                id_geografia: i as i64 + 1,
                codigo_region,
                nombre_region: entry.nombre.trim().to_string(),
            });
        }

        Ok(rows)
    }
}

impl WarehouseRow for GeographyDimensionRow {
    const TABLE: Table = Table::Geography;

    fn to_record_batch(rows: &[Self]) -> Result<RecordBatch> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.id_geografia))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.codigo_region.as_str()))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.nombre_region.as_str()))),
        ];
        Ok(RecordBatch::try_new(Self::TABLE.schema(), columns)?)
    }

    fn from_record_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let id_geografia = i64_column(batch, "id_geografia")?;
        let codigo_region = string_column(batch, "codigo_region")?;
        let nombre_region = string_column(batch, "nombre_region")?;

        (0..batch.num_rows())
            .map(|i| {
                Ok(GeographyDimensionRow {
                    id_geografia: id_geografia.value(i),
                    codigo_region: RegionCode::parse(codigo_region.value(i))?,
                    nombre_region: nombre_region.value(i).to_string(),
                })
            })
            .collect()
    }
}
