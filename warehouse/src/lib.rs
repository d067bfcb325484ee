pub mod convert;
pub mod dimensions;
pub mod facts;
pub mod identifier;
pub mod pipeline;
pub mod schema;
pub mod warehouse;

use common::Result;
use common::config::{LoggingSettings, Settings};
use common::storage::{ObjectStorage, S3Config, S3Manager};
use etl::{ExtractFormat, RawExtractReader};
use pipeline::{PipelineConfig, WarehousePipeline};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` takes precedence over the
/// configured level.
pub fn init_tracing(settings: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    let result = if settings.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = result {
        eprintln!("Logging already initialized: {}", e);
    }
}

/// Wires the source bucket reader and the warehouse from settings.
pub fn build_pipeline(manager: &S3Manager, settings: &Settings) -> Result<WarehousePipeline> {
    let source: Arc<dyn ObjectStorage> = Arc::new(manager.storage(&settings.source.bucket)?);
    let reader = RawExtractReader::new(source, ExtractFormat::from_settings(&settings.source)?);
    let warehouse = warehouse::Warehouse::from_settings(manager, &settings.warehouse)?;

    Ok(WarehousePipeline::new(
        PipelineConfig::from_settings(settings)?,
        reader,
        warehouse,
    ))
}

/// Builds the pipeline once both buckets answer, so no task starts against
/// an unreachable store.
pub async fn connect(settings: &Settings) -> Result<WarehousePipeline> {
    let manager = S3Manager::new(S3Config::from(&settings.storage));
    for bucket in [&settings.source.bucket, &settings.warehouse.bucket] {
        manager.verify_bucket_exists(bucket).await?;
    }
    info!(
        source = %settings.source.bucket,
        warehouse = %settings.warehouse.bucket,
        "Connected to object storage"
    );

    build_pipeline(&manager, settings)
}
