use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use seekr_core::extract::RawDocument;
use seekr_core::index::DocumentMap;
use seekr_core::persist::save_documents;
use seekr_core::{BatchIndex, BuilderConfig, DocMeta, IndexBuilder, IndexPaths, Posting, StorageEngine};
use seekr_server::{build_app, ServerOptions};
use serde_json::Value;
use tempfile::tempdir;
use tower::ServiceExt;

fn build_tiny_index(dir: &std::path::Path) {
    let config = BuilderConfig { simhash_threshold: 1.0, ..Default::default() };
    let mut builder = IndexBuilder::open(IndexPaths::new(dir), config, true).unwrap();
    builder
        .build(vec![
            RawDocument::new(
                "https://rust.example",
                "<html><head><title>Rust</title></head><body><p>rust systems programming with rust</p></body></html>",
            ),
            RawDocument::new("https://learn.example", "<p>learning rust while cooking dinner</p>"),
            RawDocument::new("https://garden.example", "<p>gardening tips for early spring</p>"),
        ])
        .unwrap();
    builder.close().unwrap();
}

fn app(dir: &std::path::Path) -> Router {
    build_app(dir, ServerOptions::default()).unwrap()
}

async fn call(app: Router, uri: &str) -> (StatusCode, Bytes) {
    let req = Request::get(uri).body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, body) = call(app(dir.path()), "/search?q=rust&k=5").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["query"], "rust");
    assert_eq!(json["total_hits"], 2);
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["doc_id"], 0);
    assert_eq!(arr[0]["url"], "https://rust.example");
    assert_eq!(arr[0]["title"], "Rust");
    assert_eq!(arr[1]["doc_id"], 1);
    assert!(arr[0]["score"].as_f64().unwrap() > arr[1]["score"].as_f64().unwrap());
}

#[tokio::test]
async fn k_is_clamped_to_at_least_one() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, body) = call(app(dir.path()), "/search?q=rust&k=0").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_hits"], 2);
    assert_eq!(json["results"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unmatched_query_is_empty_not_an_error() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, body) = call(app(dir.path()), "/search?q=zeppelin").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_hits"], 0);
    assert!(json["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn doc_endpoint_resolves_ids() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = app(dir.path());

    let (status, body) = call(app.clone(), "/doc/2").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["url"], "https://garden.example");
    assert_eq!(json["duplicate"], false);

    let (status, _) = call(app.clone(), "/doc/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn dangling_document_id_is_a_server_error() {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    let mut engine = StorageEngine::new(paths.clone());
    engine.open(true).unwrap();
    let batch: BatchIndex = [("cat", vec![Posting::new(7, 1.0)])].into_iter().collect();
    engine.set(batch).unwrap();
    engine.close().unwrap();
    let mut documents = DocumentMap::new();
    documents.insert(0, DocMeta { url: "https://only.example".into(), title: None, duplicate: false });
    save_documents(&paths, &documents).unwrap();
    let app = app(dir.path());

    let (status, body) = call(app.clone(), "/search?q=cat").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().contains('7'));

    let (status, _) = call(app, "/doc/7").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_requests_get_json_errors() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = app(dir.path());

    for uri in ["/search", "/search?q=rust&k=many", "/doc/abc"] {
        let (status, body) = call(app.clone(), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert!(json["error"].is_string(), "{uri}");
    }
}

#[test]
fn unbuilt_index_is_rejected() {
    let dir = tempdir().unwrap();
    assert!(build_app(dir.path(), ServerOptions::default()).is_err());
}
