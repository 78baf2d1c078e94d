use reportdb_core::types::{ContentType, TablePayload};

use crate::rank::RankedResult;

pub const EMPTY_CONTEXT: &str = "No relevant information found.";

/// Serializes ranked results into the context block handed to the generator.
///
/// Tables and text are numbered separately. A table with a structured payload
/// gets one bullet per row listing its non-empty `header: cell` pairs.
pub fn compose_context(results: &[RankedResult]) -> String {
    if results.is_empty() {
        return EMPTY_CONTEXT.to_string();
    }
    let mut tables = 0usize;
    let mut texts = 0usize;
    let mut parts = Vec::with_capacity(results.len());
    for r in results {
        let f = &r.fragment;
        match f.content_type {
            ContentType::Table => {
                tables += 1;
                let mut block = format!("\n--- TABLE {} (Page {}) ---\n{}", tables, f.page_number, f.text);
                if f.table.is_present() {
                    block.push_str("\n\nStructured Data:\n");
                    block.push_str(&structured_rows(&f.table));
                }
                parts.push(block);
            }
            ContentType::Text | ContentType::KeywordText => {
                texts += 1;
                parts.push(format!("\n--- TEXT {} (Page {}) ---\n{}", texts, f.page_number, f.text));
            }
        }
    }
    parts.join("\n")
}

fn structured_rows(table: &TablePayload) -> String {
    table
        .labelled_rows()
        .iter()
        .filter(|pairs| !pairs.is_empty())
        .map(|pairs| {
            let cells: Vec<String> = pairs.iter().map(|(h, c)| format!("{}: {}", h, c)).collect();
            format!("• {}\n", cells.join(" | "))
        })
        .collect()
}
