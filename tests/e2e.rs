//! End-to-end tests: a full session against a mock conversion service.
//!
//! Each test starts a `wiremock` server that plays the service's side of
//! the HTTP contract, then drives a real `SessionController` (reqwest,
//! multipart upload, poll loop, atomic save) against it.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture

use futures::StreamExt;
use pdf2docx::{
    ClientConfig, ErrorKind, FailureFamily, PdfFile, SessionController, SessionPhase,
    SessionSnapshot, Severity,
};
use serde_json::{json, Value};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

// ── Test helpers ─────────────────────────────────────────────────────────────

const POLL_MS: u64 = 20;
const MIB: usize = 1024 * 1024;

fn job_json(id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "original_file_name": "Report.PDF",
        "file_size": 2 * MIB,
        "status": status,
        "conversion_type": "PDF_TO_WORD",
        "is_scanned_pdf": null,
        "error_message": null,
        "created_at": "2024-05-01T10:00:00",
        "completed_at": null
    })
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn session_for(server: &MockServer) -> SessionController {
    init_tracing();
    let config = ClientConfig::builder()
        .base_url(server.uri())
        .poll_interval_ms(POLL_MS)
        .request_timeout_secs(10)
        .build()
        .expect("valid config");
    SessionController::new(&config).expect("http client")
}

fn pdf(size: usize) -> PdfFile {
    let mut data = b"%PDF-1.7\n".to_vec();
    data.resize(size.max(data.len()), b' ');
    PdfFile::new("Report.PDF", Some("application/pdf"), data)
}

async fn mount_upload(server: &MockServer, body: Value) {
    Mock::given(method("POST"))
        .and(path("/api/conversions/"))
        .respond_with(ResponseTemplate::new(201).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

/// Queue status responses; each is served once, in order.
async fn mount_statuses(server: &MockServer, id: &str, bodies: Vec<ResponseTemplate>) {
    for body in bodies {
        Mock::given(method("GET"))
            .and(path(format!("/api/conversions/{id}/")))
            .respond_with(body)
            .up_to_n_times(1)
            .mount(server)
            .await;
    }
}

async fn requests(server: &MockServer, verb: &str, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r: &&Request| r.method.as_str() == verb && r.url.path() == route)
        .count()
}

async fn settle(session: &SessionController) -> SessionSnapshot {
    let mut updates = session.stream().until_settled();
    let mut last = session.snapshot();
    let drain = async {
        while let Some(s) = updates.next().await {
            last = s;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), drain)
        .await
        .expect("session did not settle");
    last
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn scanned_pdf_converts_and_downloads() {
    let server = MockServer::start().await;
    mount_upload(&server, job_json("job-1", "PENDING")).await;

    let mut done = job_json("job-1", "COMPLETED");
    done["is_scanned_pdf"] = json!(true);
    done["completed_at"] = json!("2024-05-01T10:00:09Z");
    mount_statuses(
        &server,
        "job-1",
        vec![
            ResponseTemplate::new(200).set_body_json(job_json("job-1", "PROCESSING")),
            ResponseTemplate::new(200).set_body_json(done),
        ],
    )
    .await;

    let docx = b"PK\x03\x04 word/document.xml".to_vec();
    Mock::given(method("GET"))
        .and(path("/api/conversions/job-1/download/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            docx.clone(),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let session = session_for(&server);
    assert_ok!(session.start(pdf(2 * MIB)).await);

    let uploaded = session.snapshot();
    assert_eq!(uploaded.upload_progress, 100);
    assert_eq!(uploaded.active_job.as_ref().unwrap().id, "job-1");
    assert!(uploaded.advisory.is_none());

    let last = settle(&session).await;
    assert_eq!(last.phase(), SessionPhase::Completed);
    assert!(last.active_job.as_ref().unwrap().ocr_applied());
    assert!(!last.polling);

    let out = tempfile::tempdir().unwrap();
    let job = last.completed_job().expect("completed");
    let saved = session.download(&job, out.path()).await.unwrap();

    assert_eq!(saved, out.path().join("Report.docx"));
    assert_eq!(std::fs::read(&saved).unwrap(), docx);

    tokio::time::sleep(Duration::from_millis(POLL_MS * 4)).await;
    assert_eq!(requests(&server, "POST", "/api/conversions/").await, 1);
    assert_eq!(requests(&server, "GET", "/api/conversions/job-1/").await, 2);
}

#[tokio::test]
async fn empty_file_makes_no_requests() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let empty = dir.path().join("empty.pdf");
    std::fs::write(&empty, b"").unwrap();

    let session = session_for(&server);
    let file = PdfFile::from_path(&empty).await.unwrap();
    let err = assert_err!(session.start(file).await);

    assert_eq!(err.kind, ErrorKind::EmptyFile);
    assert_eq!(session.snapshot().last_error, Some(err));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn oversized_file_makes_no_requests() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let big = dir.path().join("big.pdf");
    let f = std::fs::File::create(&big).unwrap();
    f.set_len(100 * MIB as u64 + 1).unwrap();
    drop(f);

    let session = session_for(&server);
    let file = PdfFile::from_path(&big).await.unwrap();
    let err = assert_err!(session.start(file).await);
    assert_eq!(err.kind, ErrorKind::FileTooLarge);
    assert!(err.message.contains("100MB"));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn password_protected_job_fails_for_good() {
    let server = MockServer::start().await;
    mount_upload(&server, job_json("job-2", "PENDING")).await;

    let mut failed = job_json("job-2", "FAILED");
    failed["error_message"] = json!("Password required");
    mount_statuses(
        &server,
        "job-2",
        vec![
            ResponseTemplate::new(200).set_body_json(job_json("job-2", "PROCESSING")),
            ResponseTemplate::new(200).set_body_json(failed),
        ],
    )
    .await;

    let session = session_for(&server);
    assert_ok!(session.start(pdf(4096)).await);
    let last = settle(&session).await;

    assert_eq!(last.phase(), SessionPhase::Failed);
    let failure = last.failure.as_ref().unwrap();
    assert_eq!(failure.family, Some(FailureFamily::PasswordProtected));
    assert!(failure.message.contains("password-protected"));
    assert!(!last.download_available());
    assert!(session.completed_job().is_none());

    tokio::time::sleep(Duration::from_millis(POLL_MS * 5)).await;
    assert_eq!(requests(&server, "GET", "/api/conversions/job-2/").await, 2);
    assert_eq!(
        requests(&server, "GET", "/api/conversions/job-2/download/").await,
        0
    );
}

#[tokio::test]
async fn rejected_upload_uses_server_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/conversions/"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "detail": "PDF is password protected" })),
        )
        .mount(&server)
        .await;

    let session = session_for(&server);
    let err = assert_err!(session.start(pdf(4096)).await);

    assert_eq!(err.kind, ErrorKind::PasswordProtected);
    assert_eq!(err.severity, Severity::Warning);
    assert_eq!(session.snapshot().phase(), SessionPhase::Failed);
    assert_eq!(requests(&server, "GET", "/api/conversions/job-1/").await, 0);
}

#[tokio::test]
async fn server_error_while_polling_stops_the_loop() {
    let server = MockServer::start().await;
    mount_upload(&server, job_json("job-3", "PENDING")).await;
    mount_statuses(
        &server,
        "job-3",
        vec![
            ResponseTemplate::new(500).set_body_json(json!({ "detail": "worker crashed" })),
            ResponseTemplate::new(200).set_body_json(job_json("job-3", "COMPLETED")),
        ],
    )
    .await;

    let session = session_for(&server);
    assert_ok!(session.start(pdf(4096)).await);
    let last = settle(&session).await;

    let err = last.last_error.as_ref().unwrap();
    assert_eq!(err.kind, ErrorKind::ServerError);
    assert_eq!(err.message, "worker crashed");
    assert!(!last.polling);

    tokio::time::sleep(Duration::from_millis(POLL_MS * 5)).await;
    assert_eq!(requests(&server, "GET", "/api/conversions/job-3/").await, 1);
}

#[tokio::test]
async fn reset_stops_polling_and_clears_state() {
    let server = MockServer::start().await;
    mount_upload(&server, job_json("job-4", "PENDING")).await;
    Mock::given(method("GET"))
        .and(path("/api/conversions/job-4/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_json("job-4", "PROCESSING")))
        .mount(&server)
        .await;

    let session = session_for(&server);
    assert_ok!(session.start(pdf(4096)).await);
    tokio::time::sleep(Duration::from_millis(POLL_MS * 3)).await;

    session.reset();
    let polled = requests(&server, "GET", "/api/conversions/job-4/").await;
    tokio::time::sleep(Duration::from_millis(POLL_MS * 5)).await;

    assert_eq!(session.snapshot(), SessionSnapshot::default());
    // At most the fetch that was already in flight.
    assert!(requests(&server, "GET", "/api/conversions/job-4/").await <= polled + 1);
}

#[tokio::test]
async fn unreachable_service_is_a_network_error() {
    // Bind then drop a listener so nothing answers on the port.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = ClientConfig::builder()
        .base_url(format!("http://127.0.0.1:{port}"))
        .connect_timeout_secs(2)
        .build()
        .unwrap();
    let session = SessionController::new(&config).unwrap();

    let err = assert_err!(session.start(pdf(4096)).await);
    assert_eq!(err.kind, ErrorKind::NetworkError);
}
