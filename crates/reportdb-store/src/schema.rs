use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

use reportdb_core::types::Collection;

pub fn documents_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("doc_id", DataType::Int64, false),
        Field::new("file_path", DataType::Utf8, false),
        Field::new("company_name", DataType::Utf8, true),
        Field::new("report_year", DataType::Int32, true),
        Field::new("processed_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
    ]))
}

/// Fragment table layout; only the tables collection has `table_json`.
pub fn fragments_schema(collection: Collection, dim: i32) -> Arc<Schema> {
    let mut fields = vec![
        Field::new("doc_id", DataType::Int64, false),
        Field::new("page_number", DataType::Int32, false),
        Field::new("content", DataType::Utf8, false),
        Field::new("search_text", DataType::Utf8, false),
    ];
    if collection == Collection::Tables {
        fields.push(Field::new("table_json", DataType::Utf8, true));
    }
    fields.push(Field::new(
        "vector",
        DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim),
        true,
    ));
    Arc::new(Schema::new(fields))
}
