use anyhow::{ensure, Result};
use arrow_array::{
    Array, FixedSizeListArray, Int32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray,
    TimestampMillisecondArray,
};
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::Connection;
use std::sync::Arc;
use tracing::{debug, info};

use reportdb_core::config::StoreSettings;
use reportdb_core::types::{Collection, DocumentId, DocumentMeta, FragmentDraft};

use crate::schema::{documents_schema, fragments_schema};
use crate::table::{ensure_store, open_db, table_name};

/// Write side of the store: registers documents and appends embedded drafts.
pub struct FragmentWriter {
    pub(crate) conn: Connection,
    pub(crate) settings: StoreSettings,
    dim: i32,
}

impl FragmentWriter {
    pub async fn open(settings: &StoreSettings, dim: usize) -> Result<Self> {
        let uri = settings.resolved_uri();
        let conn = open_db(&uri.to_string_lossy()).await?;
        Self::from_connection(conn, settings, dim).await
    }

    pub async fn from_connection(conn: Connection, settings: &StoreSettings, dim: usize) -> Result<Self> {
        let dim = i32::try_from(dim)?;
        ensure_store(&conn, settings, dim).await?;
        Ok(Self { conn, settings: settings.clone(), dim })
    }

    pub fn dim(&self) -> usize { self.dim as usize }

    pub fn connection(&self) -> &Connection { &self.conn }

    /// Registers a document and returns its id, one past the current maximum.
    pub async fn insert_document(&self, meta: &DocumentMeta) -> Result<DocumentId> {
        let table = self.conn.open_table(&self.settings.documents_table).execute().await?;
        let mut stream = table.query().select(Select::columns(&["doc_id"])).execute().await?;
        let mut max_id: DocumentId = 0;
        while let Some(batch) = stream.try_next().await? {
            let ids = batch
                .column_by_name("doc_id")
                .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
                .ok_or_else(|| anyhow::anyhow!("documents.doc_id column missing"))?;
            max_id = ids.iter().flatten().fold(max_id, DocumentId::max);
        }
        let doc_id = max_id + 1;

        let rb = RecordBatch::try_new(
            documents_schema(),
            vec![
                Arc::new(Int64Array::from(vec![doc_id])),
                Arc::new(StringArray::from(vec![meta.file_path.clone()])),
                Arc::new(StringArray::from(vec![meta.company_name.clone()])),
                Arc::new(Int32Array::from(vec![meta.report_year])),
                Arc::new(TimestampMillisecondArray::from(vec![Utc::now().timestamp_millis()])),
            ],
        )?;
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(rb)].into_iter(), documents_schema()));
        table.add(reader).execute().await?;
        info!(doc_id, file = %meta.file_path, "registered document");
        Ok(doc_id)
    }

    /// Appends drafts of one collection with their embeddings; returns rows written.
    pub async fn write(&self, doc_id: DocumentId, collection: Collection, drafts: &[(FragmentDraft, Vec<f32>)]) -> Result<usize> {
        if drafts.is_empty() { return Ok(0); }
        for (draft, vector) in drafts {
            ensure!(draft.collection == collection, "draft for {} written to {}", draft.collection, collection);
            ensure!(vector.len() == self.dim(), "vector has {} dims, table expects {}", vector.len(), self.dim);
        }
        let batch = self.to_record_batch(doc_id, collection, drafts)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        let name = table_name(&self.settings, collection);
        self.conn.open_table(name).execute().await?.add(reader).execute().await?;
        debug!(doc_id, table = name, rows = drafts.len(), "wrote fragments");
        Ok(drafts.len())
    }

    fn to_record_batch(&self, doc_id: DocumentId, collection: Collection, drafts: &[(FragmentDraft, Vec<f32>)]) -> Result<RecordBatch> {
        let mut pages = Vec::with_capacity(drafts.len());
        let mut contents = Vec::with_capacity(drafts.len());
        let mut search_texts = Vec::with_capacity(drafts.len());
        let mut table_json: Vec<Option<String>> = Vec::with_capacity(drafts.len());
        let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(drafts.len());
        for (draft, vector) in drafts {
            pages.push(draft.page_number);
            contents.push(draft.text.clone());
            search_texts.push(draft.text.to_lowercase());
            table_json.push(draft.table.to_json());
            vectors.push(Some(vector.iter().map(|&x| Some(x)).collect()));
        }

        let mut columns: Vec<Arc<dyn Array>> = vec![
            Arc::new(Int64Array::from(vec![doc_id; drafts.len()])),
            Arc::new(Int32Array::from(pages)),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(search_texts)),
        ];
        if collection == Collection::Tables {
            columns.push(Arc::new(StringArray::from(table_json)));
        }
        columns.push(Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(
            vectors.into_iter(),
            self.dim,
        )));
        Ok(RecordBatch::try_new(fragments_schema(collection, self.dim), columns)?)
    }
}
