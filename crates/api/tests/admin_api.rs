use std::sync::Arc;

use indexsync_api::app::services::{JobDeps, build_registry};
use indexsync_catalog::{ProductDocument, ProductRow};
use indexsync_infra::checkpoint::InMemoryCheckpointStore;
use indexsync_infra::jobs::{ManualScheduler, Registry};
use indexsync_infra::sink::InMemoryDocumentSink;
use indexsync_infra::source::InMemoryCatalogSource;
use reqwest::StatusCode;
use serde_json::{Value, json};

struct TestServer {
    base_url: String,
    registry: Arc<Registry>,
    scheduler: Arc<ManualScheduler>,
    source: Arc<InMemoryCatalogSource>,
    product_sink: Arc<InMemoryDocumentSink<ProductDocument>>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let source = Arc::new(InMemoryCatalogSource::new());
        let product_sink = Arc::new(InMemoryDocumentSink::<ProductDocument>::new());
        let mut deps = JobDeps::in_memory(store);
        deps.products = source.clone();
        deps.prices = source.clone();
        deps.product_sink = product_sink.clone();

        let scheduler = Arc::new(ManualScheduler::new());
        let registry = build_registry(scheduler.clone(), &deps).await.unwrap();

        // Same router as prod, bound to an ephemeral port.
        let app = indexsync_api::app::build_app(registry.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            registry,
            scheduler,
            source,
            product_sink,
            handle,
        }
    }

    async fn post(&self, path: &str, body: Option<Value>) -> (StatusCode, Value) {
        let client = reqwest::Client::new();
        let mut req = client.post(format!("{}{}", self.base_url, path));
        if let Some(body) = body {
            req = req.json(&body);
        }
        let res = req.send().await.unwrap();
        let status = res.status();
        (status, res.json().await.unwrap())
    }

    async fn jobs(&self) -> Vec<Value> {
        let res = reqwest::get(format!("{}/jobs", self.base_url)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        res.json().await.unwrap()
    }

    async fn job(&self, name: &str) -> Value {
        self.jobs()
            .await
            .into_iter()
            .find(|j| j["name"] == name)
            .unwrap_or_else(|| panic!("job {name} not listed"))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn lists_jobs_sorted_with_camel_case_fields() {
    let srv = TestServer::spawn().await;
    let jobs = srv.jobs().await;

    let names: Vec<_> = jobs.iter().map(|j| j["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["crawlPrice", "products", "redisCache", "stockPrice", "watch"]);

    let products = &jobs[1];
    assert_eq!(products["triggerExpression"], "0 */5 * * * *");
    assert_eq!(products["batchLimit"], 1000);
    assert_eq!(products["status"], 0);
    assert_eq!(products["lastRun"], "");
    assert_eq!(products["intervalMs"], 0);
    assert_eq!(products["retryCount"], 0);
}

#[tokio::test]
async fn pause_and_resume_report_messages() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv.post("/jobs/products/resume", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Job resumed");
    assert_eq!(srv.job("products").await["status"], 1);
    assert_eq!(srv.scheduler.attached_count(), 1);

    let (_, body) = srv.post("/jobs/products/pause", None).await;
    assert_eq!(body["message"], "Job paused");
    assert_eq!(srv.job("products").await["status"], 0);
    assert_eq!(srv.scheduler.attached_count(), 0);

    // Pausing again is a no-op.
    let (_, body) = srv.post("/jobs/products/pause", None).await;
    assert_eq!(body["message"], "Job paused");
}

#[tokio::test]
async fn unknown_job_is_reported_in_the_message() {
    let srv = TestServer::spawn().await;
    let (status, body) = srv.post("/jobs/nope/pause", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "job not found: nope");
}

#[tokio::test]
async fn update_accepts_string_batch_limit() {
    let srv = TestServer::spawn().await;
    let (_, body) = srv
        .post(
            "/jobs/update",
            Some(json!({"name": "stockPrice", "triggerExpression": "*/15 * * * * *", "batchLimit": "250"})),
        )
        .await;
    assert_eq!(body["message"], "Job updated");

    let job = srv.job("stockPrice").await;
    assert_eq!(job["triggerExpression"], "*/15 * * * * *");
    assert_eq!(job["batchLimit"], 250);
    assert_eq!(job["status"], 1);
}

#[tokio::test]
async fn rejected_updates_leave_the_job_untouched() {
    let srv = TestServer::spawn().await;

    let (_, body) = srv
        .post(
            "/jobs/update",
            Some(json!({"name": "watch", "triggerExpression": "every minute", "batchLimit": 10})),
        )
        .await;
    assert!(body["message"].as_str().unwrap().contains("invalid trigger expression"));

    let (_, body) = srv
        .post(
            "/jobs/update",
            Some(json!({"name": "watch", "triggerExpression": "0 * * * * *", "batchLimit": "ten"})),
        )
        .await;
    assert!(body["message"].as_str().unwrap().starts_with("invalid batch limit ten"));

    let job = srv.job("watch").await;
    assert_eq!(job["triggerExpression"], "0 * * * * *");
    assert_eq!(job["status"], 0);
    assert_eq!(srv.scheduler.attached_count(), 0);
}

#[tokio::test]
async fn malformed_update_body_is_a_bad_request() {
    let srv = TestServer::spawn().await;
    let res = reqwest::Client::new()
        .post(format!("{}/jobs/update", srv.base_url))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn resumed_job_runs_and_reports_through_the_listing() {
    let srv = TestServer::spawn().await;
    srv.source.upsert_product(ProductRow {
        pid: 7,
        product_name: "lm358".to_string(),
        brand: "TI".to_string(),
        brand_id: 1,
        category_id: 5,
        parent_id: 2,
        is_deleted: false,
    });

    srv.post("/jobs/products/resume", None).await;
    let handle = srv.registry.trigger_handle("products").unwrap();
    assert!(srv.scheduler.fire(handle).await);

    assert_eq!(srv.product_sink.ids(), vec!["7"]);
    let job = srv.job("products").await;
    assert_eq!(job["status"], 1);
    assert_ne!(job["lastRun"], "");
    assert!(job["description"].as_str().unwrap().contains("upserted 1 documents"));
}
