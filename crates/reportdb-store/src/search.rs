use anyhow::{anyhow, Result};
use arrow_array::{Array, Float32Array, Int32Array, Int64Array, RecordBatch, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{Connection, DistanceType};
use tracing::debug;

use reportdb_core::config::StoreSettings;
use reportdb_core::traits::FragmentStore;
use reportdb_core::types::{Collection, StoredFragment};

use crate::table::{open_db, table_name};

/// Read-only [`FragmentStore`] over the LanceDB fragment tables.
pub struct LanceFragmentStore {
    conn: Connection,
    settings: StoreSettings,
}

impl LanceFragmentStore {
    pub async fn open(settings: &StoreSettings) -> Result<Self> {
        let uri = settings.resolved_uri();
        let conn = open_db(&uri.to_string_lossy()).await?;
        Ok(Self::from_connection(conn, settings))
    }

    pub fn from_connection(conn: Connection, settings: &StoreSettings) -> Self {
        Self { conn, settings: settings.clone() }
    }

    fn columns(collection: Collection) -> Select {
        match collection {
            Collection::Text => Select::columns(&["doc_id", "page_number", "content"]),
            Collection::Tables => Select::columns(&["doc_id", "page_number", "content", "table_json"]),
        }
    }
}

#[async_trait]
impl FragmentStore for LanceFragmentStore {
    async fn nearest(&self, collection: Collection, query_vec: &[f32], limit: usize) -> Result<Vec<StoredFragment>> {
        let name = table_name(&self.settings, collection);
        let table = self.conn.open_table(name).execute().await?;
        let mut stream = table
            .vector_search(query_vec.to_vec())?
            .distance_type(DistanceType::L2)
            .select(Self::columns(collection))
            .limit(limit)
            .execute()
            .await?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            hits.extend(fragments_from_batch(&batch, true)?);
        }
        hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
        debug!(table = name, hits = hits.len(), "nearest");
        Ok(hits)
    }

    async fn substring_match(&self, collection: Collection, pattern: &str, limit: usize) -> Result<Vec<StoredFragment>> {
        let name = table_name(&self.settings, collection);
        let table = self.conn.open_table(name).execute().await?;
        let filter = format!("search_text LIKE '%{}%'", pattern.to_lowercase().replace('\'', "''"));
        let mut stream = table.query().only_if(filter).select(Self::columns(collection)).limit(limit).execute().await?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            hits.extend(fragments_from_batch(&batch, false)?);
        }
        hits.truncate(limit);
        debug!(table = name, pattern, hits = hits.len(), "substring match");
        Ok(hits)
    }
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| anyhow!("column {} missing or mistyped", name))
}

/// Lance reports squared L2 for vector search; fragments carry the Euclidean distance.
fn fragments_from_batch(batch: &RecordBatch, with_distance: bool) -> Result<Vec<StoredFragment>> {
    let doc_ids = column::<Int64Array>(batch, "doc_id")?;
    let pages = column::<Int32Array>(batch, "page_number")?;
    let contents = column::<StringArray>(batch, "content")?;
    let table_json = batch.column_by_name("table_json").and_then(|c| c.as_any().downcast_ref::<StringArray>());
    let distances = if with_distance { Some(column::<Float32Array>(batch, "_distance")?) } else { None };

    Ok((0..batch.num_rows())
        .map(|i| StoredFragment {
            content: contents.value(i).to_string(),
            page_number: pages.value(i),
            document_id: doc_ids.value(i),
            distance: distances.map(|d| d.value(i).max(0.0).sqrt()),
            table_json: table_json.filter(|c| c.is_valid(i)).map(|c| c.value(i).to_string()),
        })
        .collect())
}
