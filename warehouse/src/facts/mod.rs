use arrow::array::{ArrayRef, Int64Array};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use common::{Error, Result};
use etl::RawEventRecord;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::convert::{WarehouseRow, i64_column};
use crate::dimensions::{TaxpayerDimensionRow, TimeDimensionRow};
use crate::identifier::TaxpayerId;
use crate::schema::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FactRow {
    pub id_fecha: i64,
    pub id_contribuyente: i64,
    pub cantidad: i64,
}

/// Why raw events did not reach the fact table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FactStats {
    pub input_rows: usize,
    pub missing_date: usize,
    pub malformed_identifier: usize,
    pub unresolved_taxpayer: usize,
    pub date_out_of_range: usize,
    pub facts: usize,
}

impl FactStats {
    pub fn dropped(&self) -> usize {
        self.missing_date + self.malformed_identifier + self.unresolved_taxpayer + self.date_out_of_range
    }
}

/// Lookup from natural keys to the surrogate keys of the loaded dimensions.
struct KeyResolver {
    dates: HashMap<NaiveDate, i64>,
    taxpayers: HashMap<TaxpayerId, i64>,
}

impl KeyResolver {
    fn new(time: &[TimeDimensionRow], taxpayers: &[TaxpayerDimensionRow]) -> Self {
        Self {
            dates: time.iter().map(|t| (t.fecha, t.id_fecha)).collect(),
            taxpayers: taxpayers
                .iter()
                .map(|t| (t.identifier.clone(), t.id_contribuyente))
                .collect(),
        }
    }

    fn date(&self, date: NaiveDate) -> Result<i64> {
        self.dates.get(&date).copied().ok_or_else(|| Error::UnresolvedForeignKey {
            table: Table::Time.name(),
            key: date.to_string(),
        })
    }

    fn taxpayer(&self, id: &TaxpayerId) -> Result<i64> {
        self.taxpayers.get(id).copied().ok_or_else(|| Error::UnresolvedForeignKey {
            table: Table::Taxpayer.name(),
            key: id.to_string(),
        })
    }
}

/// Counts authorization events per (day, taxpayer).
#[derive(Debug, Clone, Default)]
pub struct FactBuilder;

impl FactBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Rows whose date or taxpayer cannot be resolved are dropped and counted,
    /// never turned into facts with empty keys.
    pub fn build(
        &self,
        records: &[RawEventRecord],
        time: &[TimeDimensionRow],
        taxpayers: &[TaxpayerDimensionRow],
    ) -> (Vec<FactRow>, FactStats) {
        let resolver = KeyResolver::new(time, taxpayers);
        let mut stats = FactStats {
            input_rows: records.len(),
            ..Default::default()
        };
        let mut counts: BTreeMap<(i64, i64), i64> = BTreeMap::new();

        for record in records {
            let Some(authorized_at) = record.authorization_date else {
                stats.missing_date += 1;
                continue;
            };

            let identifier = match TaxpayerId::parse(&record.identifier) {
                Ok(id) => id,
                Err(_) => {
                    stats.malformed_identifier += 1;
                    continue;
                }
            };

            let id_contribuyente = match resolver.taxpayer(&identifier) {
                Ok(key) => key,
                Err(e) => {
                    debug!(error = %e, "Dropping authorization event");
                    stats.unresolved_taxpayer += 1;
                    continue;
                }
            };

            let id_fecha = match resolver.date(authorized_at.date()) {
                Ok(key) => key,
                Err(e) => {
                    debug!(error = %e, "Dropping authorization event");
                    stats.date_out_of_range += 1;
                    continue;
                }
            };

            *counts.entry((id_fecha, id_contribuyente)).or_insert(0) += 1;
        }

        let facts: Vec<FactRow> = counts
            .into_iter()
            .map(|((id_fecha, id_contribuyente), cantidad)| FactRow {
                id_fecha,
                id_contribuyente,
                cantidad,
            })
            .collect();
        stats.facts = facts.len();

        if stats.dropped() > 0 {
            warn!(
                missing_date = stats.missing_date,
                malformed_identifier = stats.malformed_identifier,
                unresolved_taxpayer = stats.unresolved_taxpayer,
                date_out_of_range = stats.date_out_of_range,
                "Authorization events dropped from fact table"
            );
        }
        info!(input_rows = stats.input_rows, facts = stats.facts, "Built authorization facts");

        (facts, stats)
    }
}

impl WarehouseRow for FactRow {
    const TABLE: Table = Table::AuthorizationFacts;

    fn to_record_batch(rows: &[Self]) -> Result<RecordBatch> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.id_fecha))),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.id_contribuyente))),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.cantidad))),
        ];
        Ok(RecordBatch::try_new(Self::TABLE.schema(), columns)?)
    }

    fn from_record_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let id_fecha = i64_column(batch, "id_fecha")?;
        let id_contribuyente = i64_column(batch, "id_contribuyente")?;
        let cantidad = i64_column(batch, "cantidad_autorizaciones")?;

        Ok((0..batch.num_rows())
            .map(|i| FactRow {
                id_fecha: id_fecha.value(i),
                id_contribuyente: id_contribuyente.value(i),
                cantidad: cantidad.value(i),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimensions::{TaxpayerDimensionBuilder, TimeDimensionBuilder};
    use chrono::NaiveDateTime;

    fn at(y: i32, m: u32, d: u32, h: u32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 0, 0)
    }

    fn dimensions(records: &[RawEventRecord]) -> (Vec<TimeDimensionRow>, Vec<TaxpayerDimensionRow>) {
        let time = TimeDimensionBuilder::new(
            NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2022, 12, 31).unwrap(),
        )
        .unwrap()
        .build();
        let (taxpayers, _) = TaxpayerDimensionBuilder::default().build(records, &[], &[]);
        (time, taxpayers)
    }

    #[test]
    fn same_day_events_are_summed() {
        let records = vec![
            RawEventRecord::new("1790012345001", "A", at(2022, 1, 3, 9)),
            RawEventRecord::new("1790012345001", "A", at(2022, 1, 3, 17)),
        ];
        let (time, taxpayers) = dimensions(&records);

        let (facts, stats) = FactBuilder::new().build(&records, &time, &taxpayers);

        assert_eq!(
            facts,
            vec![FactRow {
                id_fecha: 3,
                id_contribuyente: 1,
                cantidad: 2
            }]
        );
        assert_eq!(stats.dropped(), 0);
    }

    #[test]
    fn output_is_ordered_by_keys() {
        let records = vec![
            RawEventRecord::new("1790012345001", "A", at(2022, 2, 1, 0)),
            RawEventRecord::new("0912345678001", "B", at(2022, 1, 1, 0)),
            RawEventRecord::new("1790012345001", "A", at(2022, 1, 1, 0)),
        ];
        let (time, taxpayers) = dimensions(&records);

        let (facts, _) = FactBuilder::new().build(&records, &time, &taxpayers);

        let keys: Vec<_> = facts.iter().map(|f| (f.id_fecha, f.id_contribuyente)).collect();
        assert_eq!(keys, vec![(1, 1), (1, 2), (32, 1)]);
    }

    #[test]
    fn unresolvable_events_are_dropped_and_counted() {
        let known = vec![RawEventRecord::new("1790012345001", "A", at(2022, 5, 5, 0))];
        let (time, taxpayers) = dimensions(&known);

        let records = vec![
            RawEventRecord::new("1790012345001", "A", None),
            RawEventRecord::new("ABC", "B", at(2022, 5, 5, 0)),
            RawEventRecord::new("0912345678001", "C", at(2022, 5, 5, 0)),
            RawEventRecord::new("1790012345001", "A", at(2023, 1, 1, 0)),
            RawEventRecord::new("790012345001", "A", at(2022, 5, 5, 0)),
        ];

        let (facts, stats) = FactBuilder::new().build(&records, &time, &taxpayers);

        assert_eq!(stats.missing_date, 1);
        assert_eq!(stats.malformed_identifier, 1);
        // "790012345001" pads to 0790012345001, which is not a known taxpayer
        assert_eq!(stats.unresolved_taxpayer, 2);
        assert_eq!(stats.date_out_of_range, 1);
        assert!(facts.is_empty());
        assert_eq!(stats.dropped(), 5);
    }
}
