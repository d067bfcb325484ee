mod marker;
mod table;

pub use marker::{LoadMarker, checksum};
pub use table::{ParquetTableRegistry, TableRegistry};

use arrow::record_batch::RecordBatch;
use chrono::Utc;
use common::config::WarehouseSettings;
use common::storage::{ObjectStorage, ObjectStoreStorage, S3Manager};
use common::{Error, Result};
use datafusion::prelude::SessionContext;
use object_store::ObjectStore;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::convert::WarehouseRow;
use crate::schema::{SCHEMA_VERSION, Table};

/// Handle to the warehouse bucket: loads tables as Parquet objects and
/// queries them through DataFusion.
///
/// Every table lives at `{namespace}/{table}/{table}.parquet` and is
/// replaced as a whole on each load.
pub struct Warehouse {
    ctx: SessionContext,
    storage: Arc<dyn ObjectStorage>,
    registry: Arc<dyn TableRegistry>,
    bucket: String,
    namespace: String,
    run_id: String,
}

impl Warehouse {
    /// Uses `store` both for writes and, registered at `s3://{bucket}`, for queries.
    pub fn new(store: Arc<dyn ObjectStore>, bucket: &str, namespace: &str) -> Result<Self> {
        let ctx = SessionContext::new();
        let url = Url::parse(&format!("s3://{}", bucket))?;
        ctx.register_object_store(&url, Arc::clone(&store));

        Ok(Self {
            ctx,
            storage: Arc::new(ObjectStoreStorage::new(store, bucket)),
            registry: Arc::new(ParquetTableRegistry),
            bucket: bucket.to_string(),
            namespace: namespace.trim_matches('/').to_string(),
            run_id: Uuid::new_v4().to_string(),
        })
    }

    pub fn from_settings(manager: &S3Manager, settings: &WarehouseSettings) -> Result<Self> {
        let store: Arc<dyn ObjectStore> = manager.get_object_store(&settings.bucket)?;
        Self::new(store, &settings.bucket, &settings.namespace)
    }

    /// Replaces the storage used for writes and existence checks.
    pub fn with_storage(mut self, storage: Arc<dyn ObjectStorage>) -> Self {
        self.storage = storage;
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn table_key(&self, table: Table) -> String {
        format!("{}/{}/{}.parquet", self.namespace, table.name(), table.name())
    }

    pub fn marker_key(&self, table: Table) -> String {
        format!("{}/_markers/{}.json", self.namespace, table.name())
    }

    fn table_url(&self, table: Table) -> String {
        format!("s3://{}/{}", self.bucket, self.table_key(table))
    }

    pub async fn load_rows<R: WarehouseRow>(&self, rows: &[R]) -> Result<LoadMarker> {
        let batch = R::to_record_batch(rows)?;
        self.load_batch(R::TABLE, batch).await
    }

    /// Replaces `table` with the contents of `batch`.
    ///
    /// The batch is encoded completely before the single write of the data
    /// object, so a failed load leaves the previous table readable.
    pub async fn load_batch(&self, table: Table, batch: RecordBatch) -> Result<LoadMarker> {
        let expected = table.schema();
        if batch.schema().fields() != expected.fields() {
            return Err(Error::SchemaMismatch(format!(
                "batch for {} does not match its declared schema: {:?}",
                table,
                batch.schema().fields()
            )));
        }

        let row_count = batch.num_rows() as u64;
        let bytes = encode_parquet(&batch)?;
        let checksum = checksum(&bytes);
        let destination = self.table_url(table);

        self.storage
            .put_object(&self.table_key(table), &bytes)
            .await
            .map_err(|e| {
                warn!(table = %table, error = %e, "Warehouse write failed");
                Error::LoadFailure {
                    destination: destination.clone(),
                    reason: e.to_string(),
                }
            })?;

        let marker = LoadMarker {
            table: table.name().to_string(),
            row_count,
            checksum,
            schema_version: SCHEMA_VERSION.to_string(),
            run_id: self.run_id.clone(),
            loaded_at: Utc::now(),
        };
        let marker_json = serde_json::to_vec_pretty(&marker)?;
        self.storage
            .put_object(&self.marker_key(table), &marker_json)
            .await
            .map_err(|e| Error::LoadFailure {
                destination: format!("s3://{}/{}", self.bucket, self.marker_key(table)),
                reason: e.to_string(),
            })?;

        info!(
            table = %table,
            rows = row_count,
            bytes = bytes.len(),
            checksum = %marker.checksum,
            destination = %destination,
            "Loaded warehouse table"
        );

        Ok(marker)
    }

    pub async fn table_exists(&self, table: Table) -> Result<bool> {
        self.storage.check_file_exists(&self.table_key(table)).await
    }

    pub async fn marker(&self, table: Table) -> Result<Option<LoadMarker>> {
        match self.storage.get_object(&self.marker_key(table)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(Error::ObjectNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Markers of every table currently loaded, in [`Table::ALL`] order.
    pub async fn loaded_tables(&self) -> Result<Vec<LoadMarker>> {
        let keys = self
            .storage
            .list_objects(&format!("{}/_markers", self.namespace))
            .await?;

        let mut markers = Vec::new();
        for table in Table::ALL {
            let key = self.marker_key(table);
            if keys.contains(&key) {
                let bytes = self.storage.get_object(&key).await?;
                markers.push(serde_json::from_slice(&bytes)?);
            }
        }
        Ok(markers)
    }

    /// Makes `table` queryable under its own name.
    pub async fn attach(&self, table: Table) -> Result<()> {
        if !self.table_exists(table).await? {
            return Err(Error::MissingDependency {
                task: "query".to_string(),
                table: table.name().to_string(),
            });
        }

        let schema = table.schema();
        self.registry
            .register_table(&self.ctx, table.name(), &self.table_url(table), schema.as_ref())
            .await?;
        debug!(table = %table, "Attached warehouse table");
        Ok(())
    }

    /// Reads a whole table back as typed rows, ordered by its keys.
    pub async fn read_table<R: WarehouseRow>(&self) -> Result<Vec<R>> {
        let table = R::TABLE;
        self.attach(table).await?;

        let sql = format!("SELECT * FROM {} ORDER BY {}", table.name(), table.order_by());
        let batches = self.ctx.sql(&sql).await?.collect().await?;
        let rows = R::from_batches(&batches)?;

        debug!(table = %table, rows = rows.len(), "Read warehouse table");
        Ok(rows)
    }

    /// Runs SQL over every loaded table.
    pub async fn query(&self, sql: &str) -> Result<Vec<RecordBatch>> {
        for table in Table::ALL {
            if self.table_exists(table).await? {
                self.attach(table).await?;
            }
        }

        let batches = self.ctx.sql(sql).await?.collect().await?;
        Ok(batches)
    }
}

fn encode_parquet(batch: &RecordBatch) -> Result<Vec<u8>> {
    let mut buffer: Vec<u8> = Vec::new();
    let properties = WriterProperties::builder().build();

    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(properties))?;
    writer.write(batch)?;
    writer.close()?;

    Ok(buffer)
}
