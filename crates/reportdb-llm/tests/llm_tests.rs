use reportdb_core::config::GenerationSettings;
use reportdb_core::traits::Generator;
use reportdb_llm::{parse_chat_response, OpenAiGenerator};

#[test]
fn request_uses_settings_and_single_user_message() {
    let settings = GenerationSettings { model: "small-model".into(), max_tokens: 42, temperature: 0.3, ..GenerationSettings::default() };
    let generator = OpenAiGenerator::new("key", &settings).expect("client");
    let body = serde_json::to_value(generator.request("What was uptime?")).unwrap();
    assert_eq!(body["model"], "small-model");
    assert_eq!(body["max_tokens"], 42);
    assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(body["messages"][0]["content"], "What was uptime?");
}

#[test]
fn parses_first_choice() {
    let body = r#"{"choices":[{"message":{"role":"assistant","content":"  Uptime was 99.95%. \n"}},{"message":{"content":"second"}}]}"#;
    assert_eq!(parse_chat_response(body).unwrap(), "Uptime was 99.95%.");
}

#[test]
fn rejects_empty_or_missing_content() {
    assert!(parse_chat_response(r#"{"choices":[]}"#).is_err());
    assert!(parse_chat_response(r#"{"choices":[{"message":{"content":null}}]}"#).is_err());
    assert!(parse_chat_response(r#"{"choices":[{"message":{"content":"   "}}]}"#).is_err());
    assert!(parse_chat_response("not json").is_err());
}

#[tokio::test]
async fn unreachable_endpoint_is_an_error() {
    let settings = GenerationSettings { api_base: "http://127.0.0.1:9".into(), timeout_ms: 500, ..GenerationSettings::default() };
    let generator = OpenAiGenerator::new("key", &settings).expect("client");
    assert!(generator.generate("hello").await.is_err());
}
