use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use lazy_static::lazy_static;
use std::fmt;
use std::sync::Arc;

/// Bumped whenever a table layout below changes; recorded in every load marker.
pub const SCHEMA_VERSION: &str = "1";

// Dimension schemas
pub fn time_dimension_schema() -> Schema {
    Schema::new(vec![
        Field::new("id_fecha", DataType::Int64, false),
        Field::new("fecha", DataType::Date32, false),
        Field::new("dia", DataType::Int32, false),
        Field::new("mes", DataType::Int32, false),
        Field::new("nombre_mes", DataType::Utf8, false),
        Field::new("anio", DataType::Int32, false),
        Field::new("dia_semana", DataType::Int32, false),
    ])
}

pub fn geography_dimension_schema() -> Schema {
    Schema::new(vec![
        Field::new("id_geografia", DataType::Int64, false),
        Field::new("codigo_region", DataType::Utf8, false),
        Field::new("nombre_region", DataType::Utf8, false),
    ])
}

pub fn entity_type_dimension_schema() -> Schema {
    Schema::new(vec![
        Field::new("id_tipo", DataType::Int64, false),
        Field::new("tipo", DataType::Utf8, false),
        Field::new("descripcion", DataType::Utf8, false),
        Field::new("digito_verificador", DataType::Utf8, false),
    ])
}

pub fn taxpayer_dimension_schema() -> Schema {
    Schema::new(vec![
        Field::new("id_contribuyente", DataType::Int64, false),
        Field::new("numero_ruc", DataType::Utf8, false),
        Field::new("razon_social", DataType::Utf8, false),
        Field::new("id_tipo", DataType::Int64, true),
        Field::new("id_geografia", DataType::Int64, true),
    ])
}

// Fact schema
pub fn authorization_facts_schema() -> Schema {
    Schema::new(vec![
        Field::new("id_fecha", DataType::Int64, false),
        Field::new("id_contribuyente", DataType::Int64, false),
        Field::new("cantidad_autorizaciones", DataType::Int64, false),
    ])
}

lazy_static! {
    static ref TIME_DIMENSION_SCHEMA: SchemaRef = Arc::new(time_dimension_schema());
    static ref GEOGRAPHY_DIMENSION_SCHEMA: SchemaRef = Arc::new(geography_dimension_schema());
    static ref ENTITY_TYPE_DIMENSION_SCHEMA: SchemaRef = Arc::new(entity_type_dimension_schema());
    static ref TAXPAYER_DIMENSION_SCHEMA: SchemaRef = Arc::new(taxpayer_dimension_schema());
    static ref AUTHORIZATION_FACTS_SCHEMA: SchemaRef = Arc::new(authorization_facts_schema());
}

/// Every table the warehouse holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Time,
    Geography,
    EntityType,
    Taxpayer,
    AuthorizationFacts,
}

impl Table {
    pub const ALL: [Table; 5] = [
        Table::Time,
        Table::Geography,
        Table::EntityType,
        Table::Taxpayer,
        Table::AuthorizationFacts,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Time => "dim_tiempo",
            Table::Geography => "dim_geografia",
            Table::EntityType => "dim_tipo_ruc",
            Table::Taxpayer => "dim_contribuyente",
            Table::AuthorizationFacts => "hechos_autorizaciones",
        }
    }

    pub fn from_name(name: &str) -> Option<Table> {
        Table::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn schema(&self) -> SchemaRef {
        match self {
            Table::Time => TIME_DIMENSION_SCHEMA.clone(),
            Table::Geography => GEOGRAPHY_DIMENSION_SCHEMA.clone(),
            Table::EntityType => ENTITY_TYPE_DIMENSION_SCHEMA.clone(),
            Table::Taxpayer => TAXPAYER_DIMENSION_SCHEMA.clone(),
            Table::AuthorizationFacts => AUTHORIZATION_FACTS_SCHEMA.clone(),
        }
    }

    /// Columns rows are ordered by when the table is read back.
    pub fn order_by(&self) -> &'static str {
        match self {
            Table::Time => "id_fecha",
            Table::Geography => "id_geografia",
            Table::EntityType => "id_tipo",
            Table::Taxpayer => "id_contribuyente",
            Table::AuthorizationFacts => "id_fecha, id_contribuyente",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
