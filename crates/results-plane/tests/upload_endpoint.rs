mod common;

use axum::http::{Request, StatusCode};
use axum::body::Body;
use common::{json, Harness};
use tower::util::ServiceExt; // for oneshot

const BOUNDARY: &str = "XBOUNDARYX";

fn multipart(field: &str, filename: &str, content: &str) -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: text/csv\r\n\r\n{content}\r\n--{BOUNDARY}--\r\n"
    );
    Request::builder().method("POST").uri("/upload")
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body)).unwrap()
}

#[tokio::test]
async fn upload_stores_file_and_returns_key() {
    let h = Harness::new();
    let res = h.app().oneshot(multipart("file", "sales.csv", "a,b\n1,2\n")).await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let v = json(res).await;
    let key = v["storage_key"].as_str().unwrap();
    assert!(key.ends_with("_sales.csv"), "{key}");
    assert_eq!(v["original_filename"], "sales.csv");
    assert_eq!(v["size_bytes"], 8);
    assert_eq!(h.uploads.get(key).as_deref(), Some(&b"a,b\n1,2\n"[..]));
    assert!(h.results.keys().is_empty());
}

#[tokio::test]
async fn upload_rejects_missing_parts() {
    let h = Harness::new();
    let res = h.app().oneshot(Request::builder().method("POST").uri("/upload").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = h.app().oneshot(multipart("other", "sales.csv", "a")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(res).await["message"], "No file part");
}

#[tokio::test]
async fn upload_rejects_empty_filename_and_payload() {
    let h = Harness::new();
    let res = h.app().oneshot(multipart("file", "", "a,b\n")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(res).await["message"], "missing filename");

    let res = h.app().oneshot(multipart("file", "empty.csv", "")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(res).await["code"], "bad_request");
    assert!(h.uploads.keys().is_empty());
}
