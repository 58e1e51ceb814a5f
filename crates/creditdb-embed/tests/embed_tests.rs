use creditdb_core::config::EmbeddingConfig;
use creditdb_core::traits::Embedder;
use creditdb_embed::{load_embedder, FakeEmbedder};

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[test]
fn fake_embedder_shapes_and_determinism() {
    let config = EmbeddingConfig {
        fake: true,
        dim: 256,
        ..Default::default()
    };
    let embedder = load_embedder(&config).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 256, "embedding dim follows config");

    // Norm approximately 1.0
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    // Deterministic for same input
    for (a, b) in v1.iter().zip(v2.iter()) {
        assert!((a - b).abs() <= 1e-6);
    }
}

#[test]
fn fake_embedder_similarity_tracks_token_overlap() {
    let e = FakeEmbedder::new(512);
    let embs = e
        .embed_batch(&[
            "water use reduction requirements".to_string(),
            "Water use reduction requirements!".to_string(),
            "recycled construction materials".to_string(),
        ])
        .expect("embed");
    assert!(
        cosine(&embs[0], &embs[1]) > 0.999,
        "case and punctuation do not matter"
    );
    assert!(cosine(&embs[0], &embs[2]) < cosine(&embs[0], &embs[1]));
}

#[test]
fn empty_batch_is_empty() {
    let e = FakeEmbedder::new(8);
    assert!(e.embed_batch(&[]).expect("embed").is_empty());
}
