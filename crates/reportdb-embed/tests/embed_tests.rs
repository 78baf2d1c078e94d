use reportdb_core::config::{EmbeddingProviderKind, EmbeddingSettings};
use reportdb_core::traits::Embedder;
use reportdb_embed::{clean_input, embedder_from_settings, HashedEmbedder, OpenAiEmbedder};

fn cosine(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

#[test]
fn clean_input_flattens_newlines_and_rejects_blank() {
    assert_eq!(clean_input("  revenue\ngrowth \n").as_deref(), Some("revenue growth"));
    assert_eq!(clean_input(" \n\t "), None);
    assert_eq!(clean_input(""), None);
}

#[tokio::test]
async fn hashed_embedder_shapes_and_determinism() {
    let embedder = HashedEmbedder::new(256);
    let v1 = embedder.embed("customer service accuracy").await.expect("embed").expect("vector");
    let v2 = embedder.embed("Customer service accuracy").await.expect("embed").expect("vector");

    assert_eq!(v1.len(), 256);
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6, "token hashing ignores case"); }

    let related = embedder.embed("service accuracy").await.expect("embed").expect("vector");
    let unrelated = embedder.embed("inventory collection").await.expect("embed").expect("vector");
    assert!(cosine(&v1, &related) > cosine(&v1, &unrelated));
}

#[tokio::test]
async fn hashed_embedder_returns_none_for_blank_text() {
    let embedder = HashedEmbedder::new(8);
    assert!(embedder.embed("   ").await.expect("embed").is_none());
    let batch = embedder.embed_batch(&["a b".to_string(), "".to_string()]).await.expect("batch");
    assert!(batch[0].is_some());
    assert!(batch[1].is_none());
}

#[tokio::test]
async fn openai_embedder_skips_request_for_blank_text() {
    let settings = EmbeddingSettings { api_base: "http://127.0.0.1:9".to_string(), ..EmbeddingSettings::default() };
    let embedder = OpenAiEmbedder::new("test-key", &settings).expect("client");
    assert_eq!(embedder.dim(), 1536);
    assert!(embedder.embed("\n  \n").await.expect("no request is sent").is_none());
    let batch = embedder.embed_batch(&["".to_string(), " ".to_string()]).await.expect("no request is sent");
    assert_eq!(batch, vec![None, None]);
}

#[test]
fn fake_embeddings_flag_overrides_provider() {
    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");
    let settings = EmbeddingSettings { provider: EmbeddingProviderKind::Local, dimension: 32, ..EmbeddingSettings::default() };
    let embedder = embedder_from_settings(&settings).expect("embedder");
    assert_eq!(embedder.dim(), 32);
}
