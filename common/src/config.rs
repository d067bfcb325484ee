use chrono::NaiveDate;
use config::{Config, ConfigError, FileFormat};
use serde::Deserialize;
use tracing::debug;

use crate::{Error, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub storage: StorageSettings,
    #[serde(default)]
    pub source: SourceSettings,
    #[serde(default)]
    pub warehouse: WarehouseSettings,
    #[serde(default)]
    pub calendar: CalendarSettings,
    #[serde(default = "default_regions")]
    pub geography: Vec<RegionEntry>,
    #[serde(default = "default_entity_types")]
    pub entity_types: Vec<EntityTypeEntry>,
    #[serde(default)]
    pub classification: ClassificationSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    #[serde(default = "default_s3_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_s3_region")]
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    #[serde(default = "default_true")]
    pub allow_http: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceSettings {
    #[serde(default = "default_source_bucket")]
    pub bucket: String,
    #[serde(default = "default_source_files")]
    pub files: Vec<String>,
    #[serde(default = "default_encoding")]
    pub encoding: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default)]
    pub columns: ColumnSettings,
    #[serde(default = "default_date_formats")]
    pub date_formats: Vec<String>,
}

/// Source header names for each canonical extract field.
#[derive(Debug, Deserialize, Clone)]
pub struct ColumnSettings {
    #[serde(default = "default_identifier_column")]
    pub identifier: String,
    #[serde(default = "default_display_name_column")]
    pub display_name: String,
    #[serde(default = "default_authorization_date_column")]
    pub authorization_date: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WarehouseSettings {
    #[serde(default = "default_warehouse_bucket")]
    pub bucket: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CalendarSettings {
    #[serde(default = "default_calendar_start")]
    pub start: NaiveDate,
    #[serde(default = "default_calendar_end")]
    pub end: NaiveDate,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RegionEntry {
    pub codigo: String,
    pub nombre: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct EntityTypeEntry {
    pub tipo: String,
    pub descripcion: String,
    #[serde(default)]
    pub digito_verificador: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassificationSettings {
    #[serde(default = "default_public_digit")]
    pub public_digit: String,
    #[serde(default = "default_private_digit")]
    pub private_digit: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            bucket: default_source_bucket(),
            files: default_source_files(),
            encoding: default_encoding(),
            delimiter: default_delimiter(),
            columns: ColumnSettings::default(),
            date_formats: default_date_formats(),
        }
    }
}

impl Default for ColumnSettings {
    fn default() -> Self {
        Self {
            identifier: default_identifier_column(),
            display_name: default_display_name_column(),
            authorization_date: default_authorization_date_column(),
        }
    }
}

impl Default for WarehouseSettings {
    fn default() -> Self {
        Self {
            bucket: default_warehouse_bucket(),
            namespace: default_namespace(),
        }
    }
}

impl Default for CalendarSettings {
    fn default() -> Self {
        Self {
            start: default_calendar_start(),
            end: default_calendar_end(),
        }
    }
}

impl Default for ClassificationSettings {
    fn default() -> Self {
        Self {
            public_digit: default_public_digit(),
            private_digit: default_private_digit(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_s3_endpoint() -> String {
    "http://localhost:9000".to_string()
}

fn default_s3_region() -> String {
    "us-east-1".to_string()
}

fn default_true() -> bool {
    true
}

fn default_source_bucket() -> String {
    "etl-autorizaciones-datos".to_string()
}

fn default_source_files() -> Vec<String> {
    (2022..=2024)
        .map(|year| format!("SRI_CONTRI_AUTO_OFICIO_COMP_ELECT_{}.csv", year))
        .collect()
}

fn default_encoding() -> String {
    "latin1".to_string()
}

fn default_delimiter() -> String {
    ";".to_string()
}

fn default_identifier_column() -> String {
    "NUMERO_RUC".to_string()
}

fn default_display_name_column() -> String {
    "RAZON_SOCIAL".to_string()
}

fn default_authorization_date_column() -> String {
    "FECHA_AUTORIZACIÓN_OFICIO".to_string()
}

fn default_date_formats() -> Vec<String> {
    [
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M",
        "%d/%m/%Y",
        "%d-%m-%Y",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d",
    ]
    .iter()
    .map(|f| f.to_string())
    .collect()
}

fn default_warehouse_bucket() -> String {
    "warehouse".to_string()
}

fn default_namespace() -> String {
    "dw_autorizaciones".to_string()
}

fn default_calendar_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 1, 1).unwrap_or_default()
}

fn default_calendar_end() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 12, 31).unwrap_or_default()
}

pub fn default_regions() -> Vec<RegionEntry> {
    [
        "Azuay",
        "Bolívar",
        "Cañar",
        "Carchi",
        "Cotopaxi",
        "Chimborazo",
        "El Oro",
        "Esmeraldas",
        "Guayas",
        "Imbabura",
        "Loja",
        "Los Ríos",
        "Manabí",
        "Morona Santiago",
        "Napo",
        "Pastaza",
        "Pichincha",
        "Tungurahua",
        "Zamora Chinchipe",
        "Galápagos",
        "Sucumbíos",
        "Orellana",
        "Santo Domingo de los Tsáchilas",
        "Santa Elena",
    ]
    .iter()
    .enumerate()
    .map(|(i, nombre)| RegionEntry {
        codigo: format!("{:02}", i + 1),
        nombre: nombre.to_string(),
    })
    .collect()
}

pub fn default_entity_types() -> Vec<EntityTypeEntry> {
    [
        ("Natural", "Persona natural", ""),
        ("Privada", "Sociedad privada", "9"),
        ("Pública", "Entidad pública", "6"),
    ]
    .iter()
    .map(|(tipo, descripcion, digito)| EntityTypeEntry {
        tipo: tipo.to_string(),
        descripcion: descripcion.to_string(),
        digito_verificador: digito.to_string(),
    })
    .collect()
}

fn default_public_digit() -> String {
    "6".to_string()
}

fn default_private_digit() -> String {
    "9".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    pub fn new(path: &str) -> Result<Self> {
        let builder = Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        Self::from_config(builder.build()?)
    }

    /// Builds settings from an in-memory TOML document, without environment overrides.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(config::File::from_str(toml, FileFormat::Toml))
            .build()?;

        Self::from_config(config)
    }

    fn from_config(config: Config) -> Result<Self> {
        if let Ok(files) = config.get_array("source.files") {
            debug!(count = files.len(), "Loaded source file list from configuration");
        }

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;

        debug!(
            namespace = %settings.warehouse.namespace,
            start = %settings.calendar.start,
            end = %settings.calendar.end,
            "Parsed warehouse settings"
        );

        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let public = single_digit("classification.public_digit", &self.classification.public_digit)?;
        let private = single_digit("classification.private_digit", &self.classification.private_digit)?;
        if public == private {
            return Err(Error::Config(ConfigError::Message(format!(
                "public and private digits must differ, both are '{}'",
                public
            ))));
        }

        if self.source.delimiter.len() != 1 {
            return Err(Error::Config(ConfigError::Message(format!(
                "source.delimiter must be a single ASCII character, got '{}'",
                self.source.delimiter
            ))));
        }

        if self.calendar.start > self.calendar.end {
            return Err(Error::Config(ConfigError::Message(format!(
                "calendar.start ({}) is after calendar.end ({})",
                self.calendar.start, self.calendar.end
            ))));
        }

        Ok(())
    }
}

fn single_digit(key: &str, value: &str) -> Result<char> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_digit() => Ok(c),
        _ => Err(Error::Config(ConfigError::Message(format!(
            "{} must be a single digit, got '{}'",
            key, value
        )))),
    }
}
