mod report;
mod tasks;

pub use report::{RunReport, TaskReport};
pub use tasks::Task;

use chrono::Utc;
use common::config::{CalendarSettings, EntityTypeEntry, RegionEntry, RetrySettings, Settings};
use common::{Error, Result};
use etl::RawExtractReader;
use etl::utils::retry_with_backoff;
use futures::future::try_join_all;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{error, info};

use crate::dimensions::{
    EntityTypeDimensionBuilder, EntityTypeDimensionRow, GeographyDimensionBuilder,
    GeographyDimensionRow, TaxpayerDimensionBuilder, TaxpayerDimensionRow, TimeDimensionBuilder,
    TimeDimensionRow,
};
use crate::facts::FactBuilder;
use crate::identifier::ClassificationRule;
use crate::warehouse::Warehouse;

/// Everything the tasks need besides the source reader and the warehouse.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub files: Vec<String>,
    pub calendar: CalendarSettings,
    pub regions: Vec<RegionEntry>,
    pub entity_types: Vec<EntityTypeEntry>,
    pub classification: ClassificationRule,
    pub retry: RetrySettings,
}

impl PipelineConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            files: settings.source.files.clone(),
            calendar: settings.calendar.clone(),
            regions: settings.geography.clone(),
            entity_types: settings.entity_types.clone(),
            classification: ClassificationRule::from_settings(&settings.classification)?,
            retry: settings.retry.clone(),
        })
    }
}

/// Runs the load DAG.
///
/// Time, geography and entity type have no inputs besides configuration and
/// run concurrently. The taxpayer dimension reads geography and entity type
/// back from the warehouse, and the fact table reads time and taxpayer, so
/// every task can also be re-run on its own once its upstream tables exist.
pub struct WarehousePipeline {
    config: PipelineConfig,
    reader: RawExtractReader,
    warehouse: Warehouse,
}

impl WarehousePipeline {
    pub fn new(config: PipelineConfig, reader: RawExtractReader, warehouse: Warehouse) -> Self {
        Self {
            config,
            reader,
            warehouse,
        }
    }

    pub fn warehouse(&self) -> &Warehouse {
        &self.warehouse
    }

    pub async fn run(&self) -> Result<RunReport> {
        let started_at = Utc::now();
        info!(run_id = %self.warehouse.run_id(), files = self.config.files.len(), "Starting warehouse load");

        let mut tasks = try_join_all(Task::INDEPENDENT.map(|task| self.run_task(task))).await?;
        tasks.push(self.run_task(Task::LoadTaxpayer).await?);
        tasks.push(self.run_task(Task::LoadFacts).await?);

        let report = RunReport {
            run_id: self.warehouse.run_id().to_string(),
            started_at,
            finished_at: Utc::now(),
            tasks,
        };
        info!(
            run_id = %report.run_id,
            elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
            "Warehouse load finished"
        );

        Ok(report)
    }

    /// Runs one task, retrying transient failures.
    ///
    /// Fails with [`Error::MissingDependency`] when an upstream table has not
    /// been loaded. Errors come back wrapped in [`Error::Task`].
    pub async fn run_task(&self, task: Task) -> Result<TaskReport> {
        self.check_dependencies(task)
            .await
            .map_err(|e| e.in_task(task.name()))?;

        info!(task = %task, "Running task");
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let result = retry_with_backoff(
            self.config.retry.max_retries,
            self.config.retry.base_delay_ms,
            move || {
                attempts.fetch_add(1, Ordering::SeqCst);
                self.execute(task)
            },
        )
        .await;

        let attempts = counter.load(Ordering::SeqCst);
        match result {
            Ok(report) => {
                info!(task = %task, rows = report.rows, attempts, "Task finished");
                Ok(TaskReport { attempts, ..report })
            }
            Err(e) => {
                error!(task = %task, attempts, error = %e, "Task failed");
                Err(e.in_task(task.name()))
            }
        }
    }

    async fn check_dependencies(&self, task: Task) -> Result<()> {
        for table in task.dependencies() {
            if !self.warehouse.table_exists(*table).await? {
                return Err(Error::MissingDependency {
                    task: task.name().to_string(),
                    table: table.name().to_string(),
                });
            }
        }
        Ok(())
    }

    async fn execute(&self, task: Task) -> Result<TaskReport> {
        match task {
            Task::LoadTime => {
                let rows = TimeDimensionBuilder::from_settings(&self.config.calendar)?.build();
                let marker = self.warehouse.load_rows(&rows).await?;
                Ok(TaskReport::new(task.name(), &marker))
            }
            Task::LoadGeography => {
                let rows = GeographyDimensionBuilder::new(self.config.regions.clone()).build()?;
                let marker = self.warehouse.load_rows(&rows).await?;
                Ok(TaskReport::new(task.name(), &marker))
            }
            Task::LoadEntityType => {
                let rows = EntityTypeDimensionBuilder::new(self.config.entity_types.clone()).build()?;
                let marker = self.warehouse.load_rows(&rows).await?;
                Ok(TaskReport::new(task.name(), &marker))
            }
            Task::LoadTaxpayer => {
                let extract = self.reader.read_all(&self.config.files).await?;
                let geography: Vec<GeographyDimensionRow> = self.warehouse.read_table().await?;
                let entity_types: Vec<EntityTypeDimensionRow> = self.warehouse.read_table().await?;

                let (rows, stats) = TaxpayerDimensionBuilder::new(self.config.classification).build(
                    &extract.records,
                    &geography,
                    &entity_types,
                );
                let marker = self.warehouse.load_rows(&rows).await?;

                Ok(TaskReport::new(task.name(), &marker)
                    .with_stats(json!({ "extract": extract.stats, "taxpayers": stats })))
            }
            Task::LoadFacts => {
                let extract = self.reader.read_all(&self.config.files).await?;
                let time: Vec<TimeDimensionRow> = self.warehouse.read_table().await?;
                let taxpayers: Vec<TaxpayerDimensionRow> = self.warehouse.read_table().await?;

                let (rows, stats) = FactBuilder::new().build(&extract.records, &time, &taxpayers);
                let marker = self.warehouse.load_rows(&rows).await?;

                Ok(TaskReport::new(task.name(), &marker)
                    .with_stats(json!({ "extract": extract.stats, "facts": stats })))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::storage::{ObjectStorage, ObjectStoreStorage};
    use etl::ExtractFormat;
    use object_store::memory::InMemory;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    const EXTRACT: &str = "NUMERO_RUC;RAZON_SOCIAL;FECHA_AUTORIZACIÓN_OFICIO\n\
                           1790012345001;ACME;03/01/2022 10:00:00\n";

    fn config(files: Vec<String>) -> PipelineConfig {
        let settings = Settings::from_toml_str(
            r#"
            [storage]
            access_key = "minio"
            secret_key = "minio123"

            [calendar]
            start = "2022-01-01"
            end = "2022-01-31"

            [retry]
            max_retries = 1
            base_delay_ms = 1
            "#,
        )
        .unwrap();
        PipelineConfig {
            files,
            ..PipelineConfig::from_settings(&settings).unwrap()
        }
    }

    /// Source bucket that counts reads per key.
    struct CountingSource {
        inner: ObjectStoreStorage,
        reads: Mutex<HashMap<String, u32>>,
    }

    impl CountingSource {
        fn reads_of(&self, key: &str) -> u32 {
            self.reads.lock().unwrap().get(key).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl ObjectStorage for CountingSource {
        async fn put_object(&self, key: &str, data: &[u8]) -> Result<()> {
            self.inner.put_object(key, data).await
        }
        async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
            *self.reads.lock().unwrap().entry(key.to_string()).or_insert(0) += 1;
            self.inner.get_object(key).await
        }
        async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
            self.inner.list_objects(prefix).await
        }
        async fn check_file_exists(&self, key: &str) -> Result<bool> {
            self.inner.check_file_exists(key).await
        }
        fn bucket(&self) -> &str {
            self.inner.bucket()
        }
    }

    async fn source() -> Arc<CountingSource> {
        let inner = ObjectStoreStorage::new(Arc::new(InMemory::new()), "fuente");
        let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode(EXTRACT);
        inner.put_object("2022.csv", &bytes).await.unwrap();
        Arc::new(CountingSource {
            inner,
            reads: Mutex::new(HashMap::new()),
        })
    }

    fn pipeline_over(source: Arc<CountingSource>, files: Vec<String>) -> WarehousePipeline {
        let reader = RawExtractReader::new(source, ExtractFormat::default());
        let warehouse = Warehouse::new(Arc::new(InMemory::new()), "warehouse", "dw").unwrap();
        WarehousePipeline::new(config(files), reader, warehouse)
    }

    async fn pipeline(files: Vec<String>) -> WarehousePipeline {
        pipeline_over(source().await, files)
    }

    #[tokio::test]
    async fn downstream_task_without_inputs_is_missing_dependency() {
        let pipeline = pipeline(vec!["2022.csv".into()]).await;

        let err = pipeline.run_task(Task::LoadFacts).await.unwrap_err();
        match err {
            Error::Task { task, source } => {
                assert_eq!(task, "cargar_hechos_autorizaciones");
                assert!(matches!(*source, Error::MissingDependency { ref table, .. } if table == "dim_tiempo"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_source_file_is_retried_then_reported() {
        let source = source().await;
        let pipeline = pipeline_over(Arc::clone(&source), vec!["2022.csv".into(), "2099.csv".into()]);
        for task in Task::INDEPENDENT {
            pipeline.run_task(task).await.unwrap();
        }

        let err = pipeline.run_task(Task::LoadTaxpayer).await.unwrap_err();
        match err {
            Error::Task { task, source } => {
                assert_eq!(task, "cargar_dim_contribuyente");
                assert!(matches!(*source, Error::SourceUnavailable { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        // one retry configured: the first attempt and the retry both fetch the file
        assert_eq!(source.reads_of("2099.csv"), 2);
        assert!(!pipeline.warehouse().table_exists(Task::LoadTaxpayer.table()).await.unwrap());
    }

    #[tokio::test]
    async fn data_errors_are_not_retried() {
        let source = source().await;
        source
            .put_object("roto.csv", b"RUC;NOMBRE;FECHA\n1790012345001;X;01/01/2022\n")
            .await
            .unwrap();
        let pipeline = pipeline_over(Arc::clone(&source), vec!["roto.csv".into()]);
        for task in Task::INDEPENDENT {
            pipeline.run_task(task).await.unwrap();
        }

        let err = pipeline.run_task(Task::LoadTaxpayer).await.unwrap_err();
        assert!(matches!(err, Error::Task { ref source, .. } if matches!(**source, Error::SchemaMismatch(_))));
        assert_eq!(source.reads_of("roto.csv"), 1);
    }

    #[tokio::test]
    async fn tasks_rerun_in_isolation() {
        let pipeline = pipeline(vec!["2022.csv".into()]).await;
        let first = pipeline.run().await.unwrap();
        assert_eq!(first.tasks.len(), 5);

        let again = pipeline.run_task(Task::LoadFacts).await.unwrap();
        assert_eq!(again.attempts, 1);
        assert_eq!(again.rows, 1);
        assert_eq!(
            again.checksum,
            first.task("cargar_hechos_autorizaciones").unwrap().checksum
        );
    }
}
