use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::record_batch::RecordBatch;
use common::config::EntityTypeEntry;
use common::{Error, Result};
use std::collections::HashSet;
use std::sync::Arc;

use crate::convert::{WarehouseRow, i64_column, string_column};
use crate::schema::Table;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTypeDimensionRow {
    pub id_tipo: i64,
    pub tipo: String,
    pub descripcion: String,
    pub digito_verificador: String,
}

#[derive(Debug, Clone)]
pub struct EntityTypeDimensionBuilder {
    entries: Vec<EntityTypeEntry>,
}

impl EntityTypeDimensionBuilder {
    pub fn new(entries: Vec<EntityTypeEntry>) -> Self {
        Self { entries }
    }

    pub fn build(&self) -> Result<Vec<EntityTypeDimensionRow>> {
        let mut seen = HashSet::new();
        let mut rows = Vec::with_capacity(self.entries.len());

        for (i, entry) in self.entries.iter().enumerate() {
            let tipo = entry.tipo.trim();
            if tipo.is_empty() {
                return Err(Error::InvalidInput(format!(
                    "entity type #{} has an empty label",
                    i + 1
                )));
            }
            if !seen.insert(tipo) {
                return Err(Error::InvalidInput(format!(
                    "entity type '{}' is configured more than once",
                    tipo
                )));
            }

            rows.push(EntityTypeDimensionRow {
                id_tipo: i as i64 + 1,
                tipo: tipo.to_string(),
                descripcion: entry.descripcion.trim().to_string(),
                digito_verificador: entry.digito_verificador.trim().to_string(),
            });
        }

        Ok(rows)
    }
}

impl WarehouseRow for EntityTypeDimensionRow {
    const TABLE: Table = Table::EntityType;

    fn to_record_batch(rows: &[Self]) -> Result<RecordBatch> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.id_tipo))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.tipo.as_str()))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.descripcion.as_str()))),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.digito_verificador.as_str()),
            )),
        ];
        Ok(RecordBatch::try_new(Self::TABLE.schema(), columns)?)
    }

    fn from_record_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let id_tipo = i64_column(batch, "id_tipo")?;
        let tipo = string_column(batch, "tipo")?;
        let descripcion = string_column(batch, "descripcion")?;
        let digito_verificador = string_column(batch, "digito_verificador")?;

        Ok((0..batch.num_rows())
            .map(|i| EntityTypeDimensionRow {
                id_tipo: id_tipo.value(i),
                tipo: tipo.value(i).to_string(),
                descripcion: descripcion.value(i).to_string(),
                digito_verificador: digito_verificador.value(i).to_string(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::TaxpayerCategory;
    use common::config::default_entity_types;

    #[test]
    fn default_types_cover_every_category() {
        let rows = EntityTypeDimensionBuilder::new(default_entity_types()).build().unwrap();

        assert_eq!(rows.len(), 3);
        for category in [
            TaxpayerCategory::NaturalPerson,
            TaxpayerCategory::PrivateEntity,
            TaxpayerCategory::PublicEntity,
        ] {
            assert!(rows.iter().any(|r| r.tipo == category.label()));
        }
        assert_eq!(rows[0].id_tipo, 1);
        assert_eq!(rows[1].digito_verificador, "9");
    }

    #[test]
    fn duplicate_labels_fail() {
        let entry = |tipo: &str| EntityTypeEntry {
            tipo: tipo.into(),
            descripcion: "x".into(),
            digito_verificador: String::new(),
        };

        let builder = EntityTypeDimensionBuilder::new(vec![entry("Privada"), entry(" Privada ")]);
        assert!(matches!(builder.build(), Err(Error::InvalidInput(_))));

        let builder = EntityTypeDimensionBuilder::new(vec![entry("")]);
        assert!(builder.build().is_err());
    }

    #[test]
    fn empty_verifier_digit_survives_a_batch() {
        let rows = EntityTypeDimensionBuilder::new(default_entity_types()).build().unwrap();
        let batch = EntityTypeDimensionRow::to_record_batch(&rows).unwrap();

        let decoded = EntityTypeDimensionRow::from_record_batch(&batch).unwrap();
        assert_eq!(decoded[0].digito_verificador, "");
        assert_eq!(decoded, rows);
    }
}
