use std::fs;
use tempfile::TempDir;

use reportdb_core::config::{Config, EmbeddingProviderKind, Settings};
use reportdb_core::data_processor::{DataProcessor, ReportJson, IMAGE_MARKER};
use reportdb_core::error::{Error, NO_RESULTS_ANSWER};
use reportdb_core::types::{Collection, ImageAnalysis, TablePayload};

fn strings(items: &[&str]) -> Vec<String> { items.iter().map(|s| s.to_string()).collect() }

#[test]
fn table_payload_reconciles_row_widths() {
    let payload = TablePayload::new(
        strings(&["Metric", "Target", "Actual"]),
        vec![strings(&["Uptime"]), strings(&["Latency", "10ms", "12ms", "extra"])],
    );
    assert_eq!(payload.rows()[0], strings(&["Uptime", "", ""]), "short rows are padded");
    assert_eq!(payload.rows()[1], strings(&["Latency", "10ms", "12ms"]), "long rows are truncated");
}

#[test]
fn table_payload_parses_stored_json() {
    let payload = TablePayload::from_json(r#"{"headers":["Metric","Target"],"rows":[["Uptime",99.9],["Errors",null]]}"#).expect("parse");
    assert_eq!(payload.headers(), &strings(&["Metric", "Target"])[..]);
    assert_eq!(payload.rows()[0], strings(&["Uptime", "99.9"]));
    assert_eq!(payload.labelled_rows()[1], vec![("Metric", "Errors")], "empty cells are skipped");

    let json = payload.to_json().expect("present payload serializes");
    assert_eq!(TablePayload::from_json(&json).expect("reparse"), payload);
}

#[test]
fn table_payload_absent_and_malformed() {
    assert_eq!(TablePayload::from_json("{}").expect("empty object"), TablePayload::Absent);
    assert_eq!(TablePayload::from_json("null").expect("null"), TablePayload::Absent);
    assert_eq!(TablePayload::from_json(r#"{"headers":["a"]}"#).expect("missing rows"), TablePayload::Absent);
    assert!(matches!(TablePayload::from_json("{not json"), Err(Error::MalformedStructuredPayload(_))));
    assert!(matches!(TablePayload::from_json(r#"{"headers":"a","rows":[]}"#), Err(Error::MalformedStructuredPayload(_))));
    assert!(TablePayload::Absent.to_json().is_none());
}

#[test]
fn processor_chunks_paragraphs_groups_and_pages() {
    let p1 = "Customer service accuracy improved across all regions this year.";
    let p2 = "Timeliness of responses remained within the published target range.";
    let p3 = "Short.";
    let report = serde_json::json!({
        "document_metadata": {},
        "pages": [{ "page_number": 4, "paragraphs": [p1, p2, p3], "tables": [] }]
    });
    let drafts = DataProcessor::new().process_str(&report.to_string()).expect("process");

    assert!(drafts.iter().all(|d| d.collection == Collection::Text && d.page_number == 4));
    let texts: Vec<&str> = drafts.iter().map(|d| d.text.as_str()).collect();
    // two long paragraphs, groups starting at 0 and 2 (the latter too short), one full page
    assert_eq!(texts.len(), 4, "{:?}", texts);
    assert!(texts.contains(&p1));
    assert!(texts.contains(&p2));
    assert!(!texts.contains(&p3));
    assert!(texts.contains(&format!("{} {} {}", p1, p2, p3).as_str()));
}

#[test]
fn processor_splits_long_pages_into_overlapping_windows() {
    let paragraph = (0..450).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ");
    let report = serde_json::json!({ "pages": [{ "paragraphs": [paragraph] }] });
    let drafts = DataProcessor::new().process_str(&report.to_string()).expect("process");

    // the paragraph itself plus windows starting at words 0, 250
    assert_eq!(drafts.len(), 3);
    assert_eq!(drafts[0].page_number, 1, "page index is the fallback page number");
    assert!(drafts[1].text.starts_with("w0 ") && drafts[1].text.ends_with(" w299"));
    assert!(drafts[2].text.starts_with("w250 ") && drafts[2].text.ends_with(" w449"));
}

#[test]
fn processor_renders_tables() {
    let report = serde_json::json!({
        "pages": [{
            "page_number": 2,
            "paragraphs": [],
            "tables": [
                { "headers": ["Metric", "Target", "Actual"], "rows": [["Uptime", "99.9%", "99.95%"]] },
                { "headers": [], "rows": [] }
            ]
        }]
    });
    let drafts = DataProcessor::new().process_str(&report.to_string()).expect("process");
    assert_eq!(drafts.len(), 1, "empty tables are skipped");
    let table = &drafts[0];
    assert_eq!(table.collection, Collection::Tables);
    assert_eq!(
        table.text,
        "Table from page 2 with columns: Metric, Target, Actual.  Row 1 - Metric: Uptime, Target: 99.9%, Actual: 99.95% \
         Additional details: Metric is Uptime. Target is 99.9%. Actual is 99.95%"
    );
    assert!(table.table.is_present());
}

#[test]
fn list_report_files_only_json_sorted() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::create_dir_all(dir.join("nested")).unwrap();
    fs::write(dir.join("b.json"), "{}").unwrap();
    fs::write(dir.join("nested/a.json"), "{}").unwrap();
    fs::write(dir.join("notes.txt"), "ignored").unwrap();

    let files = DataProcessor::new().list_report_files(dir);
    assert_eq!(files.len(), 2);
    assert!(files.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn settings_defaults_and_overrides() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("config.toml"),
        "[embedding]\nprovider = \"hashed\"\ndimension = 64\n\n[retrieval]\nanswer_limit = 3\n",
    )
    .unwrap();
    let settings = Config::load_from(tmp.path()).expect("load").settings().expect("settings");
    assert_eq!(settings.embedding.provider, EmbeddingProviderKind::Hashed);
    assert_eq!(settings.embedding.dimension, 64);
    assert_eq!(settings.retrieval.answer_limit, 3);
    assert_eq!(settings.retrieval.search_limit, 10);
    assert_eq!(settings.store.text_table, "document_chunks");
    assert_eq!(settings.generation.model, "gpt-4o-mini");
}

#[test]
fn settings_validation_rejects_zero_limits() {
    let mut settings = Settings::default();
    assert!(settings.validate().is_ok());
    settings.retrieval.search_limit = 0;
    assert!(matches!(settings.validate(), Err(Error::InvalidConfig(_))));
}

#[test]
fn degraded_answers_use_fixed_text() {
    assert_eq!(Error::NoResults.user_message(), NO_RESULTS_ANSWER);
    let msg = Error::GenerationFailed("timeout".to_string()).user_message();
    assert!(msg.starts_with("I found relevant information but encountered an error generating the response"));
    assert!(msg.ends_with("timeout"));
}

#[test]
fn expand_path_resolves_env_and_home() {
    std::env::set_var("REPORTDB_TEST_DIR", "/data/reports");
    assert_eq!(reportdb_core::config::expand_path("$REPORTDB_TEST_DIR/lance"), std::path::PathBuf::from("/data/reports/lance"));
    assert!(!reportdb_core::config::expand_path("~/x").to_string_lossy().starts_with('~'));
}

#[test]
fn pending_images_carry_page_context() {
    let report: ReportJson = serde_json::from_value(serde_json::json!({
        "pages": [
            { "paragraphs": ["One.", "Two.", "Three.", "Four."],
              "images": [{ "base64_data": "data:image/png;base64,AAAA", "image_id": "img_1" }, { "base64_data": "" }] },
            { "page_number": 9, "images": [{ "base64_data": "data:image/png;base64,BBBB" }] }
        ]
    }))
    .unwrap();
    let pending = DataProcessor::new().pending_images(&report);
    assert_eq!(pending.len(), 2, "images without data are ignored");
    assert_eq!(pending[0].page_number, 1);
    assert_eq!(pending[0].image_id, "img_1");
    assert_eq!(pending[0].context, "One. Two. Three.");
    assert_eq!(pending[1].page_number, 9);
    assert_eq!(pending[1].image_id, "page_009_image_001");
    assert_eq!(pending[1].context, "");
}

#[test]
fn image_draft_labels_non_empty_parts() {
    let report: ReportJson = serde_json::from_value(serde_json::json!({
        "pages": [{ "page_number": 4, "paragraphs": ["x".repeat(250)], "images": [{ "base64_data": "data:," }] }]
    }))
    .unwrap();
    let processor = DataProcessor::new();
    let image = &processor.pending_images(&report)[0];
    let analysis = ImageAnalysis {
        description: "Bar chart of quarterly revenue".into(),
        ocr_text: "Q1 Q2 Q3".into(),
        data_extracted: "Q3 up 12%".into(),
        ..ImageAnalysis::default()
    };
    let draft = processor.image_draft(image, &analysis);
    assert_eq!(draft.collection, Collection::Text);
    assert_eq!(draft.page_number, 4);
    assert!(!draft.table.is_present());
    let expected = format!(
        "{} Image description: Bar chart of quarterly revenue. Text in image: Q1 Q2 Q3. Data found: Q3 up 12%. Page 4 context: {}",
        IMAGE_MARKER,
        "x".repeat(200)
    );
    assert_eq!(draft.text, expected);
}
