use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::record_batch::RecordBatch;
use common::Result;
use etl::RawEventRecord;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{EntityTypeDimensionRow, GeographyDimensionRow};
use crate::convert::{WarehouseRow, i64_column, nullable_i64_column, optional, string_column};
use crate::identifier::{ClassificationRule, RegionCode, TaxpayerId};
use crate::schema::Table;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxpayerDimensionRow {
    pub id_contribuyente: i64,
    pub identifier: TaxpayerId,
    pub display_name: String,
    pub id_tipo: Option<i64>,
    pub id_geografia: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaxpayerStats {
    pub input_rows: usize,
    pub malformed_identifiers: usize,
    pub duplicate_rows: usize,
    pub unmatched_geography: usize,
    pub unmatched_entity_type: usize,
    pub taxpayers: usize,
}

/// Infers the taxpayer dimension from the identifiers seen in the extracts.
///
/// Each identifier is normalized, decomposed into region and category,
/// deduplicated (first occurrence in extract order wins) and joined against the
/// geography and entity type dimensions. Joins that miss leave the foreign key
/// empty rather than dropping the taxpayer.
#[derive(Debug, Clone, Default)]
pub struct TaxpayerDimensionBuilder {
    rule: ClassificationRule,
}

impl TaxpayerDimensionBuilder {
    pub fn new(rule: ClassificationRule) -> Self {
        Self { rule }
    }

    pub fn build(
        &self,
        records: &[RawEventRecord],
        geography: &[GeographyDimensionRow],
        entity_types: &[EntityTypeDimensionRow],
    ) -> (Vec<TaxpayerDimensionRow>, TaxpayerStats) {
        let regions: HashMap<&RegionCode, i64> = geography
            .iter()
            .map(|g| (&g.codigo_region, g.id_geografia))
            .collect();
        let types: HashMap<&str, i64> = entity_types
            .iter()
            .map(|t| (t.tipo.as_str(), t.id_tipo))
            .collect();

        let mut stats = TaxpayerStats {
            input_rows: records.len(),
            ..Default::default()
        };
        let mut seen = HashSet::new();
        let mut rows = Vec::new();

        for record in records {
            let identifier = match TaxpayerId::parse(&record.identifier) {
                Ok(id) => id,
                Err(e) => {
                    debug!(error = %e, "Excluding record from taxpayer dimension");
                    stats.malformed_identifiers += 1;
                    continue;
                }
            };

            if !seen.insert(identifier.clone()) {
                stats.duplicate_rows += 1;
                continue;
            }

            let category = self.rule.classify(&identifier);
            let id_geografia = regions.get(&identifier.region()).copied();
            let id_tipo = types.get(category.label()).copied();

            if id_geografia.is_none() {
                debug!(identifier = %identifier, region = %identifier.region(), "No geography row for region");
                stats.unmatched_geography += 1;
            }
            if id_tipo.is_none() {
                stats.unmatched_entity_type += 1;
            }

            rows.push(TaxpayerDimensionRow {
                id_contribuyente: rows.len() as i64 + 1,
                identifier,
                display_name: record.display_name.clone(),
                id_tipo,
                id_geografia,
            });
        }

        stats.taxpayers = rows.len();

        if stats.malformed_identifiers > 0 || stats.unmatched_geography > 0 || stats.unmatched_entity_type > 0 {
            warn!(
                malformed_identifiers = stats.malformed_identifiers,
                unmatched_geography = stats.unmatched_geography,
                unmatched_entity_type = stats.unmatched_entity_type,
                "Taxpayer dimension has data-quality issues"
            );
        }
        info!(
            input_rows = stats.input_rows,
            duplicate_rows = stats.duplicate_rows,
            taxpayers = stats.taxpayers,
            "Built taxpayer dimension"
        );

        (rows, stats)
    }
}

impl WarehouseRow for TaxpayerDimensionRow {
    const TABLE: Table = Table::Taxpayer;

    fn to_record_batch(rows: &[Self]) -> Result<RecordBatch> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.id_contribuyente))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.identifier.as_str()))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.display_name.as_str()))),
            Arc::new(Int64Array::from(rows.iter().map(|r| r.id_tipo).collect::<Vec<_>>())),
            Arc::new(Int64Array::from(rows.iter().map(|r| r.id_geografia).collect::<Vec<_>>())),
        ];
        Ok(RecordBatch::try_new(Self::TABLE.schema(), columns)?)
    }

    fn from_record_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let id_contribuyente = i64_column(batch, "id_contribuyente")?;
        let numero_ruc = string_column(batch, "numero_ruc")?;
        let razon_social = string_column(batch, "razon_social")?;
        let id_tipo = nullable_i64_column(batch, "id_tipo")?;
        let id_geografia = nullable_i64_column(batch, "id_geografia")?;

        (0..batch.num_rows())
            .map(|i| {
                Ok(TaxpayerDimensionRow {
                    id_contribuyente: id_contribuyente.value(i),
                    identifier: TaxpayerId::parse(numero_ruc.value(i))?,
                    display_name: razon_social.value(i).to_string(),
                    id_tipo: optional(&id_tipo, i),
                    id_geografia: optional(&id_geografia, i),
                })
            })
            .collect()
    }
}
