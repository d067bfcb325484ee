use arrow::datatypes::Schema;
use async_trait::async_trait;
use common::{Error, Result};
use datafusion::datasource::file_format::options::ParquetReadOptions;
use datafusion::prelude::SessionContext;

/// Attaches stored table objects to a query session.
#[async_trait]
pub trait TableRegistry: Send + Sync + 'static {
    async fn register_table(
        &self,
        ctx: &SessionContext,
        table_name: &str,
        file_path: &str,
        schema: &Schema,
    ) -> Result<()>;

    async fn deregister_table(&self, ctx: &SessionContext, table_name: &str) -> Result<()>;
}

pub struct ParquetTableRegistry;

#[async_trait]
impl TableRegistry for ParquetTableRegistry {
    async fn register_table(
        &self,
        ctx: &SessionContext,
        table_name: &str,
        file_path: &str,
        schema: &Schema,
    ) -> Result<()> {
        // a reload rewrites the object under the same path, so the old
        // registration is dropped rather than reused
        self.deregister_table(ctx, table_name).await?;

        let options = ParquetReadOptions::default()
            .schema(schema)
            .table_partition_cols(vec![]);

        ctx.register_parquet(table_name, file_path, options)
            .await
            .map_err(|e| {
                Error::Other(format!(
                    "Failed to register {} at {}: {}",
                    table_name, file_path, e
                ))
            })
    }

    async fn deregister_table(&self, ctx: &SessionContext, table_name: &str) -> Result<()> {
        ctx.deregister_table(table_name)?;
        Ok(())
    }
}
