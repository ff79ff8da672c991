use axum::{http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};

use catalog_sync::clients::{embed_or_zero, EmbeddingProvider, EmbeddingsServiceClient};
use catalog_sync::models::SyncError;

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_embed_sends_weighted_text_and_reads_vector() {
    let app = Router::new().route(
        "/graphql",
        post(|Json(body): Json<Value>| async move {
            let input = &body["variables"]["input"];
            let text = input["weightedTexts"][0]["text"].as_str().unwrap_or_default();
            if text != "Phone, Good battery" || input["strategy"] != json!("WEIGHTED_SUM") {
                return (StatusCode::BAD_REQUEST, Json(json!({"error": "unexpected input"})));
            }
            (
                StatusCode::OK,
                Json(json!({"data": {"buildQueryEmbedding": {"vector": [0.1, 0.2, 0.3], "dimension": 3}}})),
            )
        }),
    );
    let base = serve(app).await;

    let client = EmbeddingsServiceClient::new(format!("{}/", base), 2_000, 3).unwrap();
    let vector = client.embed("Phone, Good battery").await.unwrap();
    assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    assert!(!embed_or_zero(&client, "Phone, Good battery").await.is_fallback());
}

#[tokio::test]
async fn test_embed_error_status() {
    let app = Router::new().route("/graphql", post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "model loading") }));
    let base = serve(app).await;

    let client = EmbeddingsServiceClient::new(base, 2_000, 3).unwrap();
    let err = client.embed("anything").await.unwrap_err();
    assert!(matches!(err, SyncError::Embedding(_)));
    let msg = format!("{}", err);
    assert!(msg.contains("status=503"));
    assert!(msg.contains("model loading"));
}

#[tokio::test]
async fn test_embed_graphql_errors_fall_back_to_zero_vector() {
    let app = Router::new().route(
        "/graphql",
        post(|| async { Json(json!({"data": null, "errors": [{"message": "text too long"}]})) }),
    );
    let base = serve(app).await;

    let client = EmbeddingsServiceClient::new(base, 2_000, 4).unwrap();
    let err = client.embed("x").await.unwrap_err();
    assert!(format!("{}", err).contains("text too long"));

    let outcome = embed_or_zero(&client, "x").await;
    assert!(outcome.is_fallback());
    assert_eq!(outcome.into_vector(), vec![0.0; 4]);
}

#[tokio::test]
async fn test_wrong_dimension_falls_back() {
    let app = Router::new().route(
        "/graphql",
        post(|| async { Json(json!({"data": {"buildQueryEmbedding": {"vector": [1.0, 2.0], "dimension": 2}}})) }),
    );
    let base = serve(app).await;

    let client = EmbeddingsServiceClient::new(base, 2_000, 384).unwrap();
    let outcome = embed_or_zero(&client, "short").await;
    assert!(outcome.is_fallback());
    assert_eq!(outcome.into_vector().len(), 384);
}
