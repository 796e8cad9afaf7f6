//! HTTP server for Sentinel.
//!
//! Exposes entry/exit capture, session and event-log queries, pending
//! ledger retries, and photo retrieval over a JSON API, backed by an
//! [`EventPipeline`](sentinel_pipeline::EventPipeline).

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::{
    LedgerSection, PipelineSection, SentinelConfig, ServerSection, StorageBackend, StorageSection,
};
pub use error::{ServerError, ServerResult};
pub use router::{build_router, AppState};
pub use server::SentinelServer;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use serde_json::{json, Value};
    use sha2::{Digest, Sha256};
    use tower::util::ServiceExt;

    const PIN: &str = "ABC123";

    async fn server() -> SentinelServer {
        let config = SentinelConfig {
            facilities: vec![PIN.into()],
            ..SentinelConfig::default()
        };
        SentinelServer::from_config(config).await.unwrap()
    }

    fn capture(pin: &str, value: f64, image: &[u8]) -> Value {
        json!({
            "companyPin": pin,
            "descriptor": vec![value; 128],
            "image": BASE64.encode(image),
        })
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = server().await.router();
        let (status, body) = call(&app, "GET", "/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn info_endpoint() {
        let app = server().await.router();
        let (status, body) = call(&app, "GET", "/v1/info", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "sentinel-server");
    }

    #[tokio::test]
    async fn entry_returns_created_with_sha256_photo_hash() {
        let app = server().await.router();
        let (status, body) = call(
            &app,
            "POST",
            "/api/sessions/entry",
            Some(capture(PIN, 0.0, b"entry-photo")),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["photoHash"], hex::encode(Sha256::digest(b"entry-photo")));
        assert_eq!(body["ledger"]["status"], "confirmed");
        assert!(body["ledgerRef"].as_str().unwrap().starts_with("0x"));
        assert!(body["sessionId"].is_string());
        assert!(body["storageRef"].is_string());
    }

    #[tokio::test]
    async fn exit_closes_matching_session() {
        let app = server().await.router();
        let (_, entry) = call(
            &app,
            "POST",
            "/api/sessions/entry",
            Some(capture(PIN, 0.0, b"in")),
        )
        .await;
        let (status, exit) = call(
            &app,
            "POST",
            "/api/sessions/exit",
            Some(capture(PIN, 0.01, b"out")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(exit["sessionId"], entry["sessionId"]);
        assert_eq!(exit["sessionStatus"], "closed");
        assert!(exit["matchDistance"].as_f64().unwrap() <= 0.55);
        assert!(exit["ledgerRef"].is_string());
    }

    #[tokio::test]
    async fn exit_without_candidates_is_not_found_with_null_distance() {
        let app = server().await.router();
        let (status, body) = call(
            &app,
            "POST",
            "/api/sessions/exit",
            Some(capture(PIN, 0.0, b"stranger")),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
        assert!(body["bestDistance"].is_null());
        assert!(body["storageRef"].is_string());
    }

    #[tokio::test]
    async fn exit_beyond_threshold_reports_observed_distance() {
        let app = server().await.router();
        call(&app, "POST", "/api/sessions/entry", Some(capture(PIN, 0.0, b"in"))).await;
        let (status, body) = call(
            &app,
            "POST",
            "/api/sessions/exit",
            Some(capture(PIN, 0.1, b"out")),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let observed = body["bestDistance"].as_f64().unwrap();
        assert!((observed - (128.0f64 * 0.01).sqrt()).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unknown_facility_is_unauthorized() {
        let app = server().await.router();
        let (status, body) = call(
            &app,
            "POST",
            "/api/sessions/entry",
            Some(capture("ZZZ999", 0.0, b"in")),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "auth_error");
    }

    #[tokio::test]
    async fn malformed_requests_are_bad_requests() {
        let app = server().await.router();

        let mut bad_image = capture(PIN, 0.0, b"in");
        bad_image["image"] = json!("not base64!!");
        let (status, body) = call(&app, "POST", "/api/sessions/entry", Some(bad_image)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");

        let short = json!({ "companyPin": PIN, "descriptor": [0.1, 0.2], "image": BASE64.encode(b"x") });
        let (status, _) = call(&app, "POST", "/api/sessions/entry", Some(short)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let no_image = json!({ "companyPin": PIN, "descriptor": vec![0.0; 128] });
        let (status, _) = call(&app, "POST", "/api/sessions/exit", Some(no_image)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let request = Request::builder()
            .method("POST")
            .uri("/api/sessions/entry")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn data_url_images_are_accepted() {
        let app = server().await.router();
        let mut body = capture(PIN, 0.0, b"in");
        body["image"] = json!(format!("data:image/jpeg;base64,{}", BASE64.encode(b"in")));
        let (status, receipt) = call(&app, "POST", "/api/sessions/entry", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(receipt["photoHash"], hex::encode(Sha256::digest(b"in")));
    }

    #[tokio::test]
    async fn stored_image_is_served_with_cache_headers() {
        let app = server().await.router();
        let (_, receipt) = call(
            &app,
            "POST",
            "/api/sessions/entry",
            Some(capture(PIN, 0.0, b"jpeg-bytes")),
        )
        .await;
        let uri = format!("/api/sessions/image/{}", receipt["storageRef"].as_str().unwrap());
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "public, max-age=31536000"
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"jpeg-bytes");

        let (status, _) = call(&app, "GET", "/api/sessions/image/bm0000", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&app, "GET", "/api/sessions/image/bad.id", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn recent_sessions_are_filtered_and_limited() {
        let server = SentinelServer::from_config(SentinelConfig {
            facilities: vec![PIN.into(), "XYZ999".into()],
            ..SentinelConfig::default()
        })
        .await
        .unwrap();
        let app = server.router();
        for (pin, image) in [(PIN, b"a"), (PIN, b"b"), ("XYZ999", b"c")] {
            call(&app, "POST", "/api/sessions/entry", Some(capture(pin, 0.0, image))).await;
        }

        let (status, all) = call(&app, "GET", "/api/sessions/recent", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(all.as_array().unwrap().len(), 3);

        let (_, filtered) = call(&app, "GET", "/api/sessions/recent?companyPin=ABC123", None).await;
        let filtered = filtered.as_array().unwrap();
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|s| s["companyPin"] == PIN));

        let (_, limited) = call(&app, "GET", "/api/sessions/recent?limit=1", None).await;
        assert_eq!(limited.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn event_log_and_ledger_status() {
        let app = server().await.router();
        let (_, entry) = call(&app, "POST", "/api/sessions/entry", Some(capture(PIN, 0.0, b"in"))).await;
        call(&app, "POST", "/api/sessions/exit", Some(capture(PIN, 0.0, b"out"))).await;

        let uri = format!("/api/events/session/{}", entry["sessionId"].as_str().unwrap());
        let (status, events) = call(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        let events = events.as_array().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["eventType"], "EXIT");
        assert_eq!(events[1]["eventType"], "ENTRY");

        let (_, recent) = call(&app, "GET", "/api/events/recent", None).await;
        assert_eq!(recent.as_array().unwrap().len(), 2);

        let (_, status_body) = call(&app, "GET", "/api/events/status", None).await;
        assert_eq!(status_body["totalEvents"], 2);
        assert_eq!(status_body["confirmedEvents"], 2);
        assert_eq!(status_body["pendingEvents"], 0);
    }

    #[tokio::test]
    async fn ledger_outage_exit_is_accepted_and_retryable() {
        let server = server().await;
        let app = server.router();
        let (_, entry) = call(&app, "POST", "/api/sessions/entry", Some(capture(PIN, 0.0, b"in"))).await;

        server.ledger_network().set_offline(true);
        let (status, exit) = call(&app, "POST", "/api/sessions/exit", Some(capture(PIN, 0.0, b"out"))).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(exit["ledger"]["status"], "pending");
        assert_eq!(exit["sessionStatus"], "open");
        assert!(exit["ledgerRef"].is_null());

        let (_, pending) = call(&app, "GET", "/api/events/pending", None).await;
        assert_eq!(pending.as_array().unwrap().len(), 1);

        server.ledger_network().set_offline(false);
        let uri = format!("/api/events/{}/retry", exit["eventId"]);
        let (status, retried) = call(&app, "POST", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(retried["processed"], true);

        let (_, sessions) = call(&app, "GET", "/api/sessions/recent", None).await;
        let session = &sessions.as_array().unwrap()[0];
        assert_eq!(session["sessionId"], entry["sessionId"]);
        assert_eq!(session["status"], "closed");

        let (status, _) = call(&app, "POST", "/api/events/9999/retry", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn filesystem_backend_serves_uploaded_photos() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SentinelConfig {
            facilities: vec![PIN.into()],
            ..SentinelConfig::default()
        };
        config.storage.backend = StorageBackend::Fs;
        config.storage.root = dir.path().join("objects");
        let app = SentinelServer::from_config(config).await.unwrap().router();

        let (status, receipt) = call(&app, "POST", "/api/sessions/entry", Some(capture(PIN, 0.0, b"on-disk"))).await;
        assert_eq!(status, StatusCode::CREATED);
        let storage_ref = receipt["storageRef"].as_str().unwrap();
        assert!(receipt["photoUrl"].as_str().unwrap().ends_with(storage_ref));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/sessions/image/{storage_ref}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
