// Integration tests for the HTTP API
//
// These drive the axum router in-process with tower's oneshot and fake
// speech-to-text / language-model services behind it.

mod common;

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration as ChronoDuration, Utc};
use common::{speech_wav, wait_for_terminal, FakeLanguage, FakeTranscriber, TestService};
use serde_json::Value;
use tower::ServiceExt;
use whsp::{create_router, AppState, ExportFormat, RecordingStatus};

fn router(t: &TestService) -> Router {
    create_router(AppState::new(t.service.clone()))
}

fn meeting_service() -> TestService {
    TestService::new(
        FakeTranscriber::replying("we agreed to ship on friday", 0.9),
        FakeLanguage::summarizing("- Decision: ship on Friday"),
    )
}

async fn send(app: &Router, method: Method, uri: &str, body: Body) -> Result<(StatusCode, Vec<u8>)> {
    let request = Request::builder().method(method).uri(uri).body(body)?;
    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, bytes.to_vec()))
}

async fn send_json(app: &Router, method: Method, uri: &str, body: Body) -> Result<(StatusCode, Value)> {
    let (status, bytes) = send(app, method, uri, body).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, value))
}

async fn upload(app: &Router, query: &str) -> Result<(StatusCode, Value)> {
    send_json(
        app,
        Method::POST,
        &format!("/recordings?{}", query),
        Body::from(speech_wav()),
    )
    .await
}

#[tokio::test]
async fn test_health_check() -> Result<()> {
    let t = meeting_service();
    let (status, body) = send(&router(&t), Method::GET, "/health", Body::empty()).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");

    Ok(())
}

#[tokio::test]
async fn test_upload_creates_recording() -> Result<()> {
    let t = meeting_service();
    let app = router(&t);

    let (status, created) = upload(&app, "format=wav&mode=meeting&durationSeconds=2.5").await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "uploaded");
    assert_eq!(created["mode"], "meeting");
    assert_eq!(created["format"], "wav");
    assert_eq!(created["durationSeconds"], 2.5);

    let id = created["id"].as_str().unwrap().to_string();
    let (status, fetched) =
        send_json(&app, Method::GET, &format!("/recordings/{}", id), Body::empty()).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], id.as_str());
    assert!(fetched["createdAt"].is_string());

    let (status, listed) =
        send_json(&app, Method::GET, "/recordings?mode=meeting", Body::empty()).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().map(Vec::len), Some(1));

    let (status, listed) =
        send_json(&app, Method::GET, "/recordings?status=completed", Body::empty()).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().map(Vec::len), Some(0));

    Ok(())
}

#[tokio::test]
async fn test_upload_validation_errors() -> Result<()> {
    let t = meeting_service();
    let app = router(&t);

    for query in [
        "format=wav&mode=podcast",
        "format=midi&mode=meeting",
        "format=wav",
        "format=wav&mode=custom",
    ] {
        let (status, body) = upload(&app, query).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "query {}", query);
        assert!(body["error"].is_string());
    }

    let (status, _) = send_json(
        &app,
        Method::POST,
        "/recordings?format=wav&mode=meeting",
        Body::empty(),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send_json(&app, Method::GET, "/recordings?status=paused", Body::empty()).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn test_process_results_and_export_flow() -> Result<()> {
    let t = meeting_service();
    let app = router(&t);

    let (_, created) = upload(&app, "format=wav&mode=meeting").await?;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, accepted) = send_json(
        &app,
        Method::POST,
        &format!("/recordings/{}/process", id),
        Body::empty(),
    )
    .await?;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(accepted["status"], "processing");

    let uuid = id.parse()?;
    assert_eq!(
        wait_for_terminal(&t.service, uuid).await?,
        RecordingStatus::Completed
    );

    let (status, results) = send_json(
        &app,
        Method::GET,
        &format!("/recordings/{}/results", id),
        Body::empty(),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(results["status"], "completed");
    assert_eq!(results["transcript"]["rawText"], "we agreed to ship on friday");
    assert_eq!(results["summary"]["mode"], "meeting");
    assert_eq!(results["lowConfidence"], false);
    assert!(results["transcript"]["processingTime"]
        .as_str()
        .is_some_and(|t| t.ends_with('s')));

    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/recordings/{}/exports", id))
        .header("content-type", "application/json")
        .body(Body::from(r#"{"format":"markdown"}"#))?;
    let response = app.clone().oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let export: Value = serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await?)?;
    assert_eq!(export["format"], "markdown");
    let download_url = export["downloadUrl"].as_str().unwrap().to_string();
    let export_id = export["exportId"].as_str().unwrap().to_string();
    assert_eq!(download_url, format!("/exports/{}/download", export_id));

    let request = Request::builder().uri(&download_url).body(Body::empty())?;
    let response = app.clone().oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-expires-at"));
    assert_eq!(
        response.headers()["content-type"],
        ExportFormat::Markdown.content_type()
    );
    let document = to_bytes(response.into_body(), usize::MAX).await?;
    let metadata = whsp::export::parse_front_matter(std::str::from_utf8(&document)?)?;
    assert_eq!(metadata.recording_id, uuid);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/exports/{}", export_id),
        Body::empty(),
    )
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::GET, &download_url, Body::empty()).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/exports/{}", export_id),
        Body::empty(),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_export_errors() -> Result<()> {
    let t = meeting_service();
    let app = router(&t);

    let (_, created) = upload(&app, "format=wav&mode=meeting").await?;
    let id = created["id"].as_str().unwrap().to_string();

    let export = |format: &str| {
        Request::builder()
            .method(Method::POST)
            .uri(format!("/recordings/{}/exports", id))
            .header("content-type", "application/json")
            .body(Body::from(format!(r#"{{"format":"{}"}}"#, format)))
    };

    // Not completed yet
    let response = app.clone().oneshot(export("pdf")?).await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app.clone().oneshot(export("docx")?).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn test_expired_download_is_gone() -> Result<()> {
    let t = meeting_service();
    let app = router(&t);

    let (_, created) = upload(&app, "format=wav&mode=meeting").await?;
    let id = created["id"].as_str().unwrap().parse()?;
    t.service.process(id).await?;
    wait_for_terminal(&t.service, id).await?;

    let recording = t.service.get(id).await?;
    let stale = t
        .service
        .exports()
        .store_at(
            &recording,
            ExportFormat::Rtf,
            b"{\\rtf1 stale}".to_vec(),
            Utc::now() - ChronoDuration::minutes(20),
        )
        .await?;

    let (status, body) = send_json(
        &app,
        Method::GET,
        &format!("/exports/{}/download", stale.id),
        Body::empty(),
    )
    .await?;
    assert_eq!(status, StatusCode::GONE);
    assert!(body["error"].as_str().is_some_and(|e| e.contains("expired")));

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/exports/{}/download", uuid::Uuid::new_v4()),
        Body::empty(),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_process_conflicts_and_missing_recordings() -> Result<()> {
    let t = meeting_service();
    let app = router(&t);

    let missing = uuid::Uuid::new_v4();
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/recordings/{}/process", missing),
        Body::empty(),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, created) = upload(&app, "format=wav&mode=meeting").await?;
    let id = created["id"].as_str().unwrap().to_string();
    let uri = format!("/recordings/{}/process", id);

    let (status, _) = send(&app, Method::POST, &uri, Body::empty()).await?;
    assert_eq!(status, StatusCode::ACCEPTED);
    wait_for_terminal(&t.service, id.parse()?).await?;

    let (status, body) = send_json(&app, Method::POST, &uri, Body::empty()).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());

    Ok(())
}

#[tokio::test]
async fn test_failed_results_name_the_stage() -> Result<()> {
    let t = TestService::new(
        FakeTranscriber::unavailable(),
        FakeLanguage::summarizing("- unused"),
    );
    let app = router(&t);

    let (_, created) = upload(&app, "format=wav&mode=lecture").await?;
    let id = created["id"].as_str().unwrap().to_string();
    send(
        &app,
        Method::POST,
        &format!("/recordings/{}/process", id),
        Body::empty(),
    )
    .await?;
    wait_for_terminal(&t.service, id.parse()?).await?;

    let (status, results) = send_json(
        &app,
        Method::GET,
        &format!("/recordings/{}/results", id),
        Body::empty(),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(results["status"], "failed");
    assert_eq!(results["failedStage"], "transcription");
    assert_eq!(results["attempts"], 3);

    Ok(())
}

#[tokio::test]
async fn test_delete_recording() -> Result<()> {
    let t = meeting_service();
    let app = router(&t);

    let (_, created) = upload(&app, "format=wav&mode=meeting").await?;
    let id = created["id"].as_str().unwrap().to_string();
    let uri = format!("/recordings/{}", id);

    let (status, _) = send(&app, Method::DELETE, &uri, Body::empty()).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::GET, &uri, Body::empty()).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::DELETE, &uri, Body::empty()).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}
