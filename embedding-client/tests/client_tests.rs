use embedding_client::{EmbeddingClient, EmbeddingConfig, Provider};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> EmbeddingConfig {
    EmbeddingConfig {
        base_url: server.uri(),
        provider: Provider::Ollama,
        explicit_endpoint: None,
        model_name: "nomic-embed-text".to_string(),
        ..EmbeddingConfig::default()
    }
}

#[tokio::test]
async fn native_batch_endpoint_returns_normalised_vectors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "models": [{"name": "nomic-embed-text"}],
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "embeddings": [[3.0, 4.0]],
        })))
        .mount(&server)
        .await;

    let client = EmbeddingClient::new(config_for(&server), true);
    let out = client
        .get_embeddings(&["hello world".to_string()])
        .await
        .expect("embedding call succeeds");

    assert_eq!(out.len(), 1);
    let norm = (out[0][0] * out[0][0] + out[0][1] * out[0][1]).sqrt();
    assert!((norm - 1.0).abs() < 1e-6, "expected unit-length vector, got {:?}", out[0]);
}

#[tokio::test]
async fn falls_back_to_legacy_endpoint_when_native_batch_missing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "models": [{"name": "nomic-embed-text"}],
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "embedding": [1.0, 0.0],
        })))
        .mount(&server)
        .await;

    let client = EmbeddingClient::new(config_for(&server), true);
    let out = client
        .get_embeddings(&["a".to_string(), "b".to_string()])
        .await
        .expect("embedding call succeeds via legacy endpoint");

    assert_eq!(out.len(), 2);
    assert_eq!(out[0], vec![1.0, 0.0]);
}

#[tokio::test]
async fn unreachable_server_degrades_to_zero_vectors() {
    let config = EmbeddingConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        ..EmbeddingConfig::default()
    };
    let client = EmbeddingClient::new(config.clone(), true);

    let out = client
        .get_embeddings(&["one".to_string(), "two".to_string()])
        .await
        .expect("degraded path still returns Ok");

    assert_eq!(out.len(), 2);
    assert!(out.iter().all(|v| v.iter().all(|c| *c == 0.0)));
    assert_eq!(out[0].len(), config.fallback_dim);
}

#[tokio::test]
async fn disabled_client_always_returns_zero_vectors() {
    let client = EmbeddingClient::new(EmbeddingConfig::default(), false);
    let out = client
        .get_embeddings(&["x".to_string()])
        .await
        .expect("disabled client never errors");
    assert!(out[0].iter().all(|c| *c == 0.0));
}
