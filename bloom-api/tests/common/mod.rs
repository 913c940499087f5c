//! Shared helpers for bloom-api integration tests
#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::post,
    Json, Router,
};
use bloom_api::{build_router, AppState};
use bloom_common::config::ServerConfig;
use http_body_util::BodyExt;
use rust_xlsxwriter::Workbook;
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;

/// Nothing listens here, so Python calls fail fast
pub const UNREACHABLE_PYTHON_URL: &str = "http://127.0.0.1:9";

pub const SALES_WORKBOOK: &str = "Sales_20240101_120000_000.xlsx";

pub const REGIONAL_WORKBOOK: &str = "Regional_20240101_120000_000.xlsx";

pub struct TestApp {
    pub app: Router,
    pub config: ServerConfig,
    _root: tempfile::TempDir,
}

pub fn test_app() -> TestApp {
    test_app_with(|_| {})
}

pub fn test_app_with(customize: impl FnOnce(&mut ServerConfig)) -> TestApp {
    let root = tempfile::tempdir().expect("Failed to create temp dir");
    let mut config = ServerConfig::for_root(root.path());
    config.python_base_url = UNREACHABLE_PYTHON_URL.to_string();
    config.python_timeout_secs = 2;
    customize(&mut config);
    config.ensure_directories().expect("Failed to create data dirs");

    let state = AppState::new(config.clone()).expect("Failed to build state");
    TestApp {
        app: build_router(state),
        config,
        _root: root,
    }
}

impl TestApp {
    pub async fn request(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&json).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request("GET", uri, None).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    /// POST a single file as `multipart/form-data`
    pub async fn upload(&self, file_name: &str, contents: &[u8]) -> (StatusCode, Value) {
        let boundary = "bloom-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(contents);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri("/api/files/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Place the sales fixture in uploads/ and return its name
    pub fn install_sales_workbook(&self) -> String {
        write_sales_workbook(&self.config.uploads_dir().join(SALES_WORKBOOK));
        SALES_WORKBOOK.to_string()
    }

    /// Place the two-sheet regional fixture in uploads/ and return its name
    pub fn install_regional_workbook(&self) -> String {
        write_regional_workbook(&self.config.uploads_dir().join(REGIONAL_WORKBOOK));
        REGIONAL_WORKBOOK.to_string()
    }
}

/// Python backend stand-in: answers `POST /api/concatenate-sheets` with a fixed body
pub struct PythonStub {
    pub base_url: String,
    /// Last request body the stub received
    pub received: Arc<Mutex<Option<Value>>>,
}

pub async fn spawn_python_stub(answer: Value) -> PythonStub {
    let received = Arc::new(Mutex::new(None));
    let seen = received.clone();
    let app = Router::new().route(
        "/api/concatenate-sheets",
        post(move |Json(body): Json<Value>| {
            let answer = answer.clone();
            let seen = seen.clone();
            async move {
                *seen.lock().unwrap() = Some(body);
                Json(answer)
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    PythonStub {
        base_url: format!("http://{}", addr),
        received,
    }
}

/// Two sheets: `Q1` with 4 weeks of data and an empty `Notes` sheet
pub fn write_sales_workbook(path: &Path) {
    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet();
    sheet.set_name("Q1").unwrap();
    let headers = [
        "Region",
        "Channel",
        "Week",
        "Volume Acme",
        "Volume Globex",
        "Price Acme",
        "RPI Acme vs Globex",
    ];
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string(0, col as u16, *header).unwrap();
    }
    let rows: [(&str, &str, f64, f64, f64, f64); 4] = [
        ("North", "Retail", 1.0, 100.0, 80.0, 2.5),
        ("South", "Online", 2.0, 120.0, 85.0, 2.4),
        ("North", "Online", 3.0, 140.0, 90.0, 2.3),
        ("East", "Retail", 4.0, 160.0, 95.0, 2.2),
    ];
    for (i, (region, channel, week, acme, globex, price)) in rows.iter().enumerate() {
        let row = (i + 1) as u32;
        sheet.write_string(row, 0, *region).unwrap();
        sheet.write_string(row, 1, *channel).unwrap();
        sheet.write_number(row, 2, *week).unwrap();
        sheet.write_number(row, 3, *acme).unwrap();
        sheet.write_number(row, 4, *globex).unwrap();
        sheet.write_number(row, 5, *price).unwrap();
        sheet.write_number(row, 6, price / 2.0).unwrap();
    }

    let notes = workbook.add_worksheet();
    notes.set_name("Notes").unwrap();

    workbook.save(path).unwrap();
}

/// `Q1` has Region/Volume Acme, `Q2` has Store/Volume Acme
pub fn write_regional_workbook(path: &Path) {
    let mut workbook = Workbook::new();

    for (sheet_name, dimension, values) in [
        ("Q1", "Region", ["North", "South"]),
        ("Q2", "Store", ["Downtown", "Airport"]),
    ] {
        let sheet = workbook.add_worksheet();
        sheet.set_name(sheet_name).unwrap();
        sheet.write_string(0, 0, dimension).unwrap();
        sheet.write_string(0, 1, "Volume Acme").unwrap();
        for (i, value) in values.iter().enumerate() {
            let row = (i + 1) as u32;
            sheet.write_string(row, 0, *value).unwrap();
            sheet.write_number(row, 1, 10.0 * (i + 1) as f64).unwrap();
        }
    }

    workbook.save(path).unwrap();
}
