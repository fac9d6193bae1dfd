#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use labelhub_pipeline::memory::{MemoryCatalog, MemoryUploadQueue};
use labelhub_pipeline::upload::process_claimed;
use labelhub_pipeline::{Assembler, IngestService, PipelineConfig, UploadQueue};
use labelhub_storage::local::LocalStorage;
use tempfile::TempDir;
use tower::ServiceExt;

use labelhub_api::config::ServerConfig;
use labelhub_api::router::build_app_router;
use labelhub_api::state::AppState;

/// Chunk size small enough that a few bytes produce several chunks.
pub const TEST_CHUNK_SIZE: u64 = 4;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
    }
}

/// The full application over in-memory persistence and a local object store
/// in temporary directories.
pub struct TestApp {
    pub catalog: Arc<MemoryCatalog>,
    pub queue: Arc<MemoryUploadQueue>,
    pub storage: Arc<LocalStorage>,
    pub pipeline: PipelineConfig,
    router: Router,
    extract_root: TempDir,
    _staging: TempDir,
    _cache: TempDir,
    _remote: TempDir,
}

impl TestApp {
    /// Build the app with the given annotators registered in order.
    pub fn new(annotators: &[&str]) -> Self {
        let staging = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        let remote = TempDir::new().unwrap();

        let catalog = Arc::new(MemoryCatalog::new());
        for id in annotators {
            catalog.add_annotator(id, id);
        }
        let queue = Arc::new(MemoryUploadQueue::new(3));
        let storage = Arc::new(LocalStorage::new(remote.path()));

        let extract_root = TempDir::new().unwrap();
        let pipeline = PipelineConfig {
            extract_root: extract_root.path().to_path_buf(),
            staging_root: staging.path().to_path_buf(),
            cache_root: cache.path().to_path_buf(),
            cache_root_name: "assembled-images".to_string(),
            chunk_size: TEST_CHUNK_SIZE,
            max_attempts: 3,
        };

        let config = test_config();
        let state = AppState {
            catalog: catalog.clone(),
            queue: queue.clone(),
            ingest: IngestService::new(catalog.clone(), queue.clone(), pipeline.clone()),
            assembler: Assembler::new(catalog.clone(), storage.clone(), pipeline.clone()),
            pipeline: Arc::new(pipeline.clone()),
            config: Arc::new(config.clone()),
        };
        let router = build_app_router(state, &config);

        Self {
            catalog,
            queue,
            storage,
            pipeline,
            router,
            extract_root,
            _staging: staging,
            _cache: cache,
            _remote: remote,
        }
    }

    pub fn app(&self) -> Router {
        self.router.clone()
    }

    /// Create an extraction directory holding the given files.
    pub async fn extract(&self, batch: &str, files: &[(&str, &[u8])]) -> PathBuf {
        let dir = self.extract_root.path().join(batch);
        tokio::fs::create_dir_all(&dir).await.unwrap();
        for (name, bytes) in files {
            tokio::fs::write(dir.join(name), bytes).await.unwrap();
        }
        dir
    }

    /// Run every queued upload to completion, as a worker would.
    pub async fn drain_uploads(&self) -> usize {
        let mut delivered = 0;
        while let Some(claimed) = self.queue.claim("test-worker").await.unwrap() {
            process_claimed(self.queue.as_ref(), self.storage.as_ref(), &claimed)
                .await
                .unwrap();
            delivered += 1;
        }
        delivered
    }
}

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(
        app,
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    json_request(app, Method::POST, uri, body).await
}

pub async fn put_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    json_request(app, Method::PUT, uri, body).await
}

async fn json_request(
    app: Router,
    method: Method,
    uri: &str,
    body: serde_json::Value,
) -> Response<Body> {
    send(
        app,
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
