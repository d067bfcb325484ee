use arrow::array::{ArrayRef, Int32Array, Int64Array, StringArray};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, NaiveDate};
use common::config::CalendarSettings;
use common::{Error, Result};
use std::sync::Arc;

use crate::convert::{WarehouseRow, date_array, date_column, i32_column, i64_column, string_column};
use crate::schema::Table;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeDimensionRow {
    pub id_fecha: i64,
    pub fecha: NaiveDate,
    pub dia: i32,
    pub mes: i32,
    pub nombre_mes: String,
    pub anio: i32,
    /// 0 = Monday .. 6 = Sunday
    pub dia_semana: i32,
}

impl TimeDimensionRow {
    fn for_date(id_fecha: i64, fecha: NaiveDate) -> Self {
        Self {
            id_fecha,
            fecha,
            dia: fecha.day() as i32,
            mes: fecha.month() as i32,
            nombre_mes: fecha.format("%B").to_string(),
            anio: fecha.year(),
            dia_semana: fecha.weekday().num_days_from_monday() as i32,
        }
    }
}

/// One row per calendar day over an inclusive range.
#[derive(Debug, Clone)]
pub struct TimeDimensionBuilder {
    start: NaiveDate,
    end: NaiveDate,
}

impl TimeDimensionBuilder {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidInput(format!(
                "calendar start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn from_settings(settings: &CalendarSettings) -> Result<Self> {
        Self::new(settings.start, settings.end)
    }

    pub fn build(&self) -> Vec<TimeDimensionRow> {
        self.start
            .iter_days()
            .take_while(|day| *day <= self.end)
            .enumerate()
            .map(|(i, day)| TimeDimensionRow::for_date(i as i64 + 1, day))
            .collect()
    }
}

impl WarehouseRow for TimeDimensionRow {
    const TABLE: Table = Table::Time;

    fn to_record_batch(rows: &[Self]) -> Result<RecordBatch> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.id_fecha))),
            date_array(rows.iter().map(|r| r.fecha)),
            Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.dia))),
            Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.mes))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.nombre_mes.as_str()))),
            Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.anio))),
            Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.dia_semana))),
        ];
        Ok(RecordBatch::try_new(Self::TABLE.schema(), columns)?)
    }

    fn from_record_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let id_fecha = i64_column(batch, "id_fecha")?;
        let fecha = date_column(batch, "fecha")?;
        let dia = i32_column(batch, "dia")?;
        let mes = i32_column(batch, "mes")?;
        let nombre_mes = string_column(batch, "nombre_mes")?;
        let anio = i32_column(batch, "anio")?;
        let dia_semana = i32_column(batch, "dia_semana")?;

        Ok((0..batch.num_rows())
            .map(|i| TimeDimensionRow {
                id_fecha: id_fecha.value(i),
                fecha: fecha[i],
                dia: dia.value(i),
                mes: mes.value(i),
                nombre_mes: nombre_mes.value(i).to_string(),
                anio: anio.value(i),
                dia_semana: dia_semana.value(i),
            })
            .collect())
    }
}
