mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use common::{document_insights, services, test_config, MockBackend};
use strategy_insights::api::{create_router, AppState};

const BOUNDARY: &str = "insights-test-boundary";

struct TestApp {
    router: Router,
    _dir: tempfile::TempDir,
}

impl TestApp {
    fn new(backend: MockBackend) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let services = services(&config, Arc::new(backend));
        Self {
            router: create_router(AppState::new(services)),
            _dir: dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn json(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn create_project(&self) -> String {
        let (status, body) = self
            .json(
                "POST",
                "/api/v1/projects",
                json!({"title": "Spring campaign", "clientName": "Acme", "clientIndustry": "Retail"}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn upload(&self, project_id: &str, user: Option<&str>, files: &[&str]) -> (StatusCode, Value) {
        let mut payload = String::new();
        for name in files {
            payload.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\nContent-Type: application/pdf\r\n\r\nsample bytes\r\n"
            ));
        }
        payload.push_str(&format!("--{BOUNDARY}--\r\n"));

        let mut request = Request::post(format!("/api/v1/projects/{}/documents", project_id)).header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
        if let Some(user) = user {
            request = request.header("x-user-id", user);
        }
        self.send(request.body(Body::from(payload)).unwrap()).await
    }

    async fn wait_for_completion(&self, project_id: &str) -> Value {
        for _ in 0..200 {
            let (_, body) = self
                .get(&format!("/api/v1/projects/{}/analysis/status", project_id))
                .await;
            if body["data"]["status"] == "completed" || body["data"]["status"] == "error" {
                return body["data"].clone();
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("analysis did not finish");
    }
}

#[tokio::test]
async fn health_endpoints_respond() {
    let app = TestApp::new(MockBackend::failing());

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.get("/health/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["ai_api_key"], "configured");
}

#[tokio::test]
async fn project_validation_and_lookup_errors() {
    let app = TestApp::new(MockBackend::failing());

    let (status, body) = app
        .json(
            "POST",
            "/api/v1/projects",
            json!({"title": "Launch", "clientName": "Acme", "clientWebsite": "ftp://acme.test"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["retriable"], false);

    let (status, body) = app.get("/api/v1/projects/does-not-exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "PROJECT_NOT_FOUND");

    let id = app.create_project().await;
    let (status, body) = app.get("/api/v1/projects").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"][0]["id"], id.as_str());

    let (status, body) = app
        .json(
            "PATCH",
            &format!("/api/v1/projects/{}/status", id),
            json!({"status": "completed"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "completed");
}

#[tokio::test]
async fn upload_requires_identity_and_filters_files() {
    let app = TestApp::new(MockBackend::failing());
    let id = app.create_project().await;

    let (status, body) = app.upload(&id, None, &["plan.pdf"]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTHENTICATION_ERROR");

    let (status, body) = app.upload(&id, Some("user-1"), &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, body) = app
        .upload(&id, Some("user-1"), &["plan.pdf", "Brand Strategy.pdf", "virus.exe"])
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["uploaded"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["rejected"][0]["name"], "virus.exe");

    let (_, body) = app.get(&format!("/api/v1/projects/{}/documents", id)).await;
    let documents = body["data"].as_array().unwrap();
    assert_eq!(documents[0]["name"], "Brand Strategy.pdf");

    let document_id = documents[1]["id"].as_str().unwrap();
    let request = Request::delete(format!("/api/v1/projects/{}/documents/{}", id, document_id))
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Removing it again still succeeds
    let request = Request::delete(format!("/api/v1/projects/{}/documents/{}", id, document_id))
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn analysis_review_and_presentation_flow() {
    let app = TestApp::new(MockBackend::with_documents(document_insights()));
    let id = app.create_project().await;

    let (status, body) = app
        .json("POST", &format!("/api/v1/projects/{}/analysis/documents", id), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "no documents yet: {}", body);

    app.upload(&id, Some("user-1"), &["plan.pdf"]).await;
    let (status, body) = app
        .json("POST", &format!("/api/v1/projects/{}/analysis/documents", id), json!({}))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["data"]["status"], "processing");

    let finished = app.wait_for_completion(&id).await;
    assert_eq!(finished["status"], "completed");
    assert_eq!(finished["progress"], 100);

    let (_, body) = app.get(&format!("/api/v1/projects/{}/insights", id)).await;
    assert_eq!(body["data"]["usingFallbackData"], false);
    let insights = body["data"]["insights"].as_array().unwrap();
    assert_eq!(insights.len(), 3);
    let generated = insights
        .iter()
        .find(|i| i["category"] == "key_narratives")
        .and_then(|i| i["id"].as_str())
        .unwrap()
        .to_string();

    for (insight, decision) in [("ins-1", "accepted"), ("ins-2", "accepted"), (generated.as_str(), "rejected")] {
        let (status, _) = app
            .json(
                "PUT",
                &format!("/api/v1/projects/{}/review/{}", id, insight),
                json!({"status": decision}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = app.get(&format!("/api/v1/projects/{}/review", id)).await;
    let stats = &body["data"]["stats"];
    assert_eq!(stats["accepted"], 2);
    assert_eq!(stats["rejected"], 1);
    assert_eq!(stats["pending"], 0);
    // (90 + 74) / 2
    assert_eq!(stats["overallConfidence"], 82);

    let (status, body) = app
        .json(
            "PUT",
            &format!("/api/v1/projects/{}/review/unknown", id),
            json!({"status": "accepted"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);

    let (_, body) = app.get(&format!("/api/v1/projects/{}/presentation", id)).await;
    let sections = body["data"].as_array().unwrap();
    assert_eq!(sections.len(), 2);
    assert_eq!(sections[0]["category"], "audience_gaps");
    assert_eq!(sections[1]["category"], "gaming_opportunities");
}

#[tokio::test]
async fn website_analysis_requires_a_website() {
    let app = TestApp::new(MockBackend::failing());
    let id = app.create_project().await;

    let (status, body) = app
        .json("POST", &format!("/api/v1/projects/{}/analysis/website", id), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = app.get(&format!("/api/v1/projects/{}/analysis/status", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "idle");
}
