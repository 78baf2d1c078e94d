//! LanceDB connection and table housekeeping.

use anyhow::Result;
use arrow_array::RecordBatchIterator;
use lancedb::{connect, Connection};
use std::sync::Arc;
use tracing::info;

use reportdb_core::config::StoreSettings;
use reportdb_core::types::Collection;

use crate::schema::{documents_schema, fragments_schema};

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<arrow_schema::Schema>) -> Result<()> {
    let names = conn.table_names().execute().await?;
    if names.iter().any(|n| n == name) {
        return Ok(());
    }
    // empty table, zero rows
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
    conn.create_table(name, Box::new(iter)).execute().await?;
    info!(table = name, "created table");
    Ok(())
}

/// Creates the registry and both fragment tables when missing.
pub async fn ensure_store(conn: &Connection, settings: &StoreSettings, dim: i32) -> Result<()> {
    ensure_table(conn, &settings.documents_table, documents_schema()).await?;
    ensure_table(conn, &settings.text_table, fragments_schema(Collection::Text, dim)).await?;
    ensure_table(conn, &settings.tables_table, fragments_schema(Collection::Tables, dim)).await
}

pub fn table_name(settings: &StoreSettings, collection: Collection) -> &str {
    match collection {
        Collection::Text => &settings.text_table,
        Collection::Tables => &settings.tables_table,
    }
}
