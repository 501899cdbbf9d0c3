//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use ldgradnja_api::{AppState, build_app};
use ldgradnja_converter::ConversionProcessor;
use ldgradnja_core::config::AppConfig;

/// Stand-in for `dwg2dxf`: writes `<input-stem>.dxf` next to the input.
pub const COPY_SCRIPT: &str = "cp \"$1\" \"${1%.dwg}.dxf\"";

/// Stand-in for a `dwg2dxf` that rejects the input.
pub const FAIL_SCRIPT: &str = "echo 'Invalid DWG header' >&2; exit 1";

/// Smallest DXF the renderer accepts; used as "DWG" content with the copy
/// script so hop 1 yields a renderable DXF.
pub const MINIMAL_DXF: &str = "0\nSECTION\n2\nENTITIES\n0\nLINE\n8\n0\n10\n0.0\n20\n0.0\n30\n0.0\n11\n4.0\n21\n3.0\n31\n0.0\n0\nENDSEC\n0\nEOF\n";

const BOUNDARY: &str = "ldgradnja-test-boundary";

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Application state behind the router
    pub state: AppState,
    /// Scratch root: `work/` is the converter temp root, `static/` the bundle
    pub root: TempDir,
}

impl TestApp {
    /// App whose converter copies the input to a `.dxf`.
    pub fn new() -> Self {
        Self::with_script(COPY_SCRIPT)
    }

    /// App whose converter runs `script` through `sh -c` with the input as `$1`.
    pub fn with_script(script: &str) -> Self {
        let script = script.to_string();
        Self::build(move |config, _| {
            config.converter.command = "sh".to_string();
            config.converter.args = vec![
                "-c".to_string(),
                script,
                "sh".to_string(),
                "{input}".to_string(),
            ];
        })
    }

    /// App built from the default configuration after `configure` ran.
    ///
    /// Defaults are adjusted for tests: temp root inside the scratch dir, no
    /// frontend bundle, and an API-key variable nobody sets.
    pub fn build(configure: impl FnOnce(&mut AppConfig, &Path)) -> Self {
        let root = tempfile::tempdir().expect("tempdir");

        let mut config = AppConfig::default();
        config.converter.temp_root = Some(root.path().join("work"));
        config.converter.command = "sh".to_string();
        config.converter.args = vec![
            "-c".to_string(),
            COPY_SCRIPT.to_string(),
            "sh".to_string(),
            "{input}".to_string(),
        ];
        config.frontend.static_dir = root.path().join("static");
        config.proxy.api_key_env = "LDGRADNJA_TEST_UNSET_API_KEY".to_string();
        configure(&mut config, root.path());

        let processor = ConversionProcessor::new(&config.converter).expect("processor");
        let state = AppState::with_processor(config, processor).expect("state");
        let router = build_app(state.clone());

        Self {
            router,
            state,
            root,
        }
    }

    /// Converter temp root.
    pub fn work_dir(&self) -> PathBuf {
        self.state.processor.temp_root().to_path_buf()
    }

    /// Entries left in the converter temp root.
    pub fn leftover_work_dirs(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.work_dir())
            .expect("read work dir")
            .map(|e| e.expect("entry").path())
            .collect()
    }

    /// Send a request through the router.
    pub async fn send(&self, req: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024 * 1024)
            .await
            .expect("Failed to read body");

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// GET `path`.
    pub async fn get(&self, path: &str) -> TestResponse {
        let req = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .expect("Failed to build request");
        self.send(req).await
    }

    /// POST a multipart upload with `bytes` in field `field`.
    pub async fn upload_field(
        &self,
        path: &str,
        field: &str,
        filename: &str,
        bytes: &[u8],
    ) -> TestResponse {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(field, filename, bytes)))
            .expect("Failed to build request");
        self.send(req).await
    }

    /// POST a multipart upload in the `file` field.
    pub async fn upload(&self, path: &str, filename: &str, bytes: &[u8]) -> TestResponse {
        self.upload_field(path, "file", filename, bytes).await
    }
}

/// Single-part `multipart/form-data` body.
pub fn multipart_body(field: &str, filename: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + 256);
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Raw body
    pub body: Bytes,
}

impl TestResponse {
    /// Body parsed as JSON, `Null` if it is not JSON.
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    /// Header value as text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// `detail` of an error body.
    pub fn detail(&self) -> String {
        self.json()["detail"].as_str().unwrap_or_default().to_string()
    }
}
