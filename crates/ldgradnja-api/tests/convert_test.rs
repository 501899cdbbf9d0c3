//! Conversion endpoint tests. The external converter is replaced by small
//! `sh` scripts, so these run on Unix only.

#![cfg(unix)]

mod helpers;

use axum::http::StatusCode;
use helpers::{FAIL_SCRIPT, MINIMAL_DXF, TestApp};

const DXF: &str = "/convert/dwg-to-dxf";
const SVG: &str = "/convert/dwg-to-svg";

#[tokio::test]
async fn test_wrong_extension_rejected() {
    let app = TestApp::new();

    for name in ["plan.dxf", "plan.pdf", "plandwg", "plan.dwg.zip"] {
        let res = app.upload(DXF, name, b"AC1032").await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST, "{name}");
        assert_eq!(res.json()["error"], "VALIDATION_ERROR");
        assert_eq!(res.detail(), "Fajl mora biti .dwg format");
    }
    assert!(app.leftover_work_dirs().is_empty());
}

#[tokio::test]
async fn test_missing_file_field_rejected() {
    let app = TestApp::new();

    let res = app
        .upload_field(SVG, "attachment", "plan.dwg", b"AC1032")
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.detail(), "Fajl mora biti .dwg format");
}

#[tokio::test]
async fn test_oversized_upload_rejected() {
    let app = TestApp::build(|config, _| {
        config.converter.max_upload_bytes = 1024 * 1024;
    });

    let payload = vec![0u8; 1024 * 1024 + 16];
    let res = app.upload(DXF, "plan.dwg", &payload).await;

    assert_eq!(res.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(res.json()["error"], "PAYLOAD_TOO_LARGE");
    assert_eq!(res.detail(), "Fajl je prevelik (max 1MB)");
    assert!(app.leftover_work_dirs().is_empty());
}

#[tokio::test]
async fn test_body_over_transport_limit_rejected() {
    let app = TestApp::build(|config, _| {
        config.converter.max_upload_bytes = 1024 * 1024;
    });

    let payload = vec![0u8; 3 * 1024 * 1024];
    let res = app.upload(DXF, "plan.dwg", &payload).await;

    assert_eq!(res.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(app.leftover_work_dirs().is_empty());
}

#[tokio::test]
async fn test_dwg_to_dxf_success() {
    let app = TestApp::new();

    let res = app.upload(DXF, "Plan.DWG", b"AC1032 drawing bytes").await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.header("content-type"), Some("application/dxf"));
    assert_eq!(
        res.header("content-disposition"),
        Some("attachment; filename=\"Plan.dxf\"")
    );
    assert_eq!(&res.body[..], b"AC1032 drawing bytes");
    assert!(res.header("x-fallback").is_none());
    assert!(app.leftover_work_dirs().is_empty());
}

#[tokio::test]
async fn test_dwg_to_dxf_alternate_output_name() {
    let app = TestApp::with_script("cp \"$1\" \"$(dirname \"$1\")/converted.DXF\"; exit 3");

    let res = app.upload(DXF, "kuca.dwg", b"AC1027").await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(&res.body[..], b"AC1027");
    assert_eq!(
        res.header("content-disposition"),
        Some("attachment; filename=\"kuca.dxf\"")
    );
}

#[tokio::test]
async fn test_dwg_to_dxf_failure() {
    let app = TestApp::with_script(FAIL_SCRIPT);

    let res = app.upload(DXF, "plan.dwg", b"garbage").await;

    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.json()["error"], "CONVERSION_FAILED");
    assert_eq!(res.detail(), "Konverzija nije uspjela: Invalid DWG header");
    assert!(app.leftover_work_dirs().is_empty());
}

#[tokio::test]
async fn test_dwg_to_dxf_failure_without_diagnostic() {
    let app = TestApp::with_script("exit 1");

    let res = app.upload(DXF, "plan.dwg", b"garbage").await;

    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        res.detail(),
        "Konverzija nije uspjela: Nepoznata greska pri konverziji"
    );
}

#[tokio::test]
async fn test_missing_converter_binary() {
    let app = TestApp::build(|config, _| {
        config.converter.command = "ldgradnja-test-no-dwg2dxf".to_string();
        config.converter.args = vec!["{input}".to_string()];
    });

    let res = app.upload(DXF, "plan.dwg", b"AC1032").await;

    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(res.detail().contains("ldgradnja-test-no-dwg2dxf"));
    assert!(app.leftover_work_dirs().is_empty());
}

#[tokio::test]
async fn test_conversion_timeout() {
    let app = TestApp::build(|config, _| {
        config.converter.args = vec![
            "-c".to_string(),
            "sleep 5".to_string(),
            "sh".to_string(),
            "{input}".to_string(),
        ];
        config.converter.timeout_seconds = 1;
    });

    let res = app.upload(DXF, "plan.dwg", b"AC1032").await;

    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.json()["error"], "CONVERSION_TIMEOUT");
    assert_eq!(
        res.detail(),
        "Konverzija je prekinuta: isteklo je vrijeme (1s)"
    );
    assert!(app.leftover_work_dirs().is_empty());
}

#[tokio::test]
async fn test_dwg_to_svg_success() {
    let app = TestApp::new();

    let res = app.upload(SVG, "Plan.dwg", MINIMAL_DXF.as_bytes()).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.header("content-type"), Some("image/svg+xml"));
    assert_eq!(
        res.header("content-disposition"),
        Some("inline; filename=\"Plan.svg\"")
    );
    assert!(res.header("x-fallback").is_none());
    let svg = std::str::from_utf8(&res.body).expect("utf8");
    assert!(svg.contains("<svg"));
    assert!(svg.contains("<path"));
    assert!(app.leftover_work_dirs().is_empty());
}

#[tokio::test]
async fn test_dwg_to_svg_falls_back_to_dxf() {
    let app = TestApp::new();
    let unrenderable = b"AC1032 this is not DXF text\n";

    let res = app.upload(SVG, "Plan.dwg", unrenderable).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.header("content-type"), Some("application/dxf"));
    assert_eq!(res.header("x-fallback"), Some("true"));
    assert!(!res.header("x-error").unwrap_or_default().is_empty());
    assert_eq!(
        res.header("content-disposition"),
        Some("attachment; filename=\"Plan.dxf\"")
    );
    assert_eq!(&res.body[..], unrenderable);
    assert!(app.leftover_work_dirs().is_empty());
}

#[tokio::test]
async fn test_dwg_to_svg_first_hop_failure() {
    let app = TestApp::with_script(FAIL_SCRIPT);

    let res = app.upload(SVG, "plan.dwg", MINIMAL_DXF.as_bytes()).await;

    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.json()["error"], "CONVERSION_FAILED");
    assert_eq!(
        res.detail(),
        "DWG konverzija u DXF nije uspjela: Invalid DWG header"
    );
    assert!(res.header("x-fallback").is_none());
    assert_eq!(app.state.processor.metrics().fallbacks, 0);
}

#[tokio::test]
async fn test_concurrent_conversions_are_isolated() {
    let app = TestApp::new();

    let uploads = (0..5).map(|i| {
        let app = &app;
        async move {
            let bytes = format!("drawing number {i}").into_bytes();
            let res = app.upload(DXF, &format!("plan-{i}.dwg"), &bytes).await;
            (i, bytes, res)
        }
    });
    let results = futures::future::join_all(uploads).await;

    for (i, bytes, res) in results {
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body.to_vec(), bytes);
        assert_eq!(
            res.header("content-disposition"),
            Some(format!("attachment; filename=\"plan-{i}.dxf\"").as_str())
        );
    }
    assert!(app.leftover_work_dirs().is_empty());
    assert_eq!(app.state.processor.metrics().succeeded, 5);
}
