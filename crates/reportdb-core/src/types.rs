//! Domain types shared by the store, the embedders and the retrieval engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{Error, Result};

pub type DocumentId = i64;

/// Which kind of content a fragment carries.
///
/// `KeywordText` marks free-text fragments found by substring search rather
/// than by vector similarity; it ranks with a fixed base score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Text,
    Table,
    KeywordText,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Table => "table",
            ContentType::KeywordText => "keyword_text",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// The fragment collections held by the persistent store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// Free-text chunks (paragraphs, page windows, image descriptions).
    Text,
    /// Rendered tables with their structured payload.
    Tables,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Text => "text",
            Collection::Tables => "tables",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// What a vision model read from a page image. Empty strings mean "not found".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    #[serde(default, alias = "detailed_description")]
    pub description: String,
    #[serde(default)]
    pub ocr_text: String,
    #[serde(default)]
    pub key_insights: String,
    #[serde(default)]
    pub visual_type: String,
    #[serde(default)]
    pub data_extracted: String,
}

impl ImageAnalysis {
    pub fn is_empty(&self) -> bool {
        [&self.description, &self.ocr_text, &self.key_insights, &self.data_extracted].iter().all(|s| s.trim().is_empty())
    }
}

/// Structured data attached to a table fragment.
///
/// Rows are reconciled against the header count on construction: short rows
/// are padded with empty cells and long rows are truncated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TablePayload {
    #[default]
    Absent,
    Present { headers: Vec<String>, rows: Vec<Vec<String>> },
}

impl TablePayload {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self::Present { headers, rows }
    }

    /// Parses the stored JSON form `{"headers": [..], "rows": [[..], ..]}`.
    ///
    /// `null`, and objects lacking either key, yield `Absent`. Anything that is
    /// not valid JSON, or has the keys with the wrong shape, is an
    /// `Error::MalformedStructuredPayload`.
    pub fn from_json(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw).map_err(|e| Error::MalformedStructuredPayload(e.to_string()))?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = match value {
            Value::Null => return Ok(Self::Absent),
            Value::Object(obj) => obj,
            other => return Err(Error::MalformedStructuredPayload(format!("expected an object, found {}", json_kind(other)))),
        };
        let (Some(headers), Some(rows)) = (obj.get("headers"), obj.get("rows")) else { return Ok(Self::Absent) };
        let headers = headers
            .as_array()
            .ok_or_else(|| Error::MalformedStructuredPayload("headers is not an array".to_string()))?
            .iter()
            .map(cell_text)
            .collect();
        let rows = rows
            .as_array()
            .ok_or_else(|| Error::MalformedStructuredPayload("rows is not an array".to_string()))?
            .iter()
            .enumerate()
            .map(|(i, row)| {
                row.as_array()
                    .map(|cells| cells.iter().map(cell_text).collect())
                    .ok_or_else(|| Error::MalformedStructuredPayload(format!("row {} is not an array", i)))
            })
            .collect::<Result<Vec<Vec<String>>>>()?;
        Ok(Self::new(headers, rows))
    }

    /// JSON form used by the store; `None` when absent.
    pub fn to_json(&self) -> Option<String> {
        match self {
            TablePayload::Absent => None,
            TablePayload::Present { headers, rows } => Some(serde_json::json!({ "headers": headers, "rows": rows }).to_string()),
        }
    }

    pub fn is_present(&self) -> bool { matches!(self, TablePayload::Present { .. }) }

    pub fn headers(&self) -> &[String] {
        match self {
            TablePayload::Absent => &[],
            TablePayload::Present { headers, .. } => headers,
        }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        match self {
            TablePayload::Absent => &[],
            TablePayload::Present { rows, .. } => rows,
        }
    }

    /// Per row, the `(header, cell)` pairs whose cell is non-empty and whose
    /// column falls inside the header count.
    pub fn labelled_rows(&self) -> Vec<Vec<(&str, &str)>> {
        let headers = self.headers();
        self.rows()
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .filter(|(col, cell)| *col < headers.len() && !cell.is_empty())
                    .map(|(col, cell)| (headers[col].as_str(), cell.as_str()))
                    .collect()
            })
            .collect()
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A row as returned by the store, before the retriever tags it.
///
/// `distance` is set for nearest-neighbour hits only. `table_json` is the raw
/// stored payload for rows of the tables collection.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFragment {
    pub content: String,
    pub page_number: i32,
    pub document_id: DocumentId,
    pub distance: Option<f32>,
    pub table_json: Option<String>,
}

/// A unit of retrievable content as seen by the ranking pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub content_type: ContentType,
    pub text: String,
    pub page_number: i32,
    pub document_id: DocumentId,
    pub distance: Option<f32>,
    pub table: TablePayload,
}

/// A fragment produced by the report processor and waiting for an embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentDraft {
    pub collection: Collection,
    pub page_number: i32,
    pub text: String,
    pub table: TablePayload,
}

/// Source document metadata registered before its fragments are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub file_path: String,
    pub company_name: Option<String>,
    pub report_year: Option<i32>,
}
