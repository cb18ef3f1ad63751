use async_trait::async_trait;
use sqlx::PgPool;

use rowforge_core::{Result, SchemaSource, TableMetadata};

use crate::{mapper, queries};

/// Read side: builds the categorical catalog from a live Postgres schema.
#[derive(Debug, Clone)]
pub struct PostgresSource {
    pool: PgPool,
    schema: String,
}

impl PostgresSource {
    /// Source over the `public` schema.
    pub fn new(pool: PgPool) -> Self {
        Self::with_schema(pool, "public")
    }

    pub fn with_schema(pool: PgPool, schema: &str) -> Self {
        Self {
            pool,
            schema: schema.to_string(),
        }
    }
}

#[async_trait]
impl SchemaSource for PostgresSource {
    async fn fetch_tables(&self) -> Result<Vec<TableMetadata>> {
        let names = queries::list_tables(&self.pool, &self.schema).await?;

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            let columns = queries::list_columns(&self.pool, &self.schema, &name).await?;
            let primary_key = queries::primary_key_columns(&self.pool, &self.schema, &name).await?;
            let unique_columns =
                queries::single_unique_columns(&self.pool, &self.schema, &name).await?;
            let foreign_keys = queries::list_foreign_keys(&self.pool, &self.schema, &name).await?;
            tables.push(mapper::map_table(
                name,
                columns,
                primary_key,
                unique_columns,
                foreign_keys,
            )?);
        }

        Ok(tables)
    }
}
