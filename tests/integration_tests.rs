use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use reel::services::upload::{Clock, MediaStore, UploadPolicy};
use reel::web::{self, AppState, UPLOAD_FIELD};
use reel::Config;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "reel-test-boundary";

const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

fn png_bytes(len: usize, fill: u8) -> Vec<u8> {
    let mut data = PNG_MAGIC.to_vec();
    data.resize(len, fill);
    data
}

fn jpeg_bytes(len: usize) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
    data.resize(len, 0x42);
    data
}

fn mp4_bytes(len: usize) -> Vec<u8> {
    let mut data = vec![
        0x00, 0x00, 0x00, 0x18, b'f', b't', b'y', b'p', b'm', b'p', b'4', b'2', 0x00, 0x00, 0x00,
        0x00, b'm', b'p', b'4', b'2', b'i', b's', b'o', b'm',
    ];
    data.resize(len, 0x11);
    data
}

struct Part<'a> {
    field: &'a str,
    filename: Option<&'a str>,
    data: &'a [u8],
}

fn file_part<'a>(filename: &'a str, data: &'a [u8]) -> Part<'a> {
    Part {
        field: UPLOAD_FIELD,
        filename: Some(filename),
        data,
    }
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part.filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n",
                    part.field, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                    part.field
                )
                .as_bytes(),
            ),
        }
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

fn stored_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|rd| {
            rd.filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

struct FixedClock(i64);

impl Clock for FixedClock {
    fn now_nanos(&self) -> i64 {
        self.0
    }
}

struct TestApp {
    _dir: TempDir,
    upload_dir: PathBuf,
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        Self::build(|_| {}, None)
    }

    fn with_max_upload(size: &str) -> Self {
        let size = size.to_string();
        Self::build(move |config| config.media.max_upload_size = size, None)
    }

    fn with_clock(stamp: i64) -> Self {
        Self::build(|_| {}, Some(stamp))
    }

    fn build(configure: impl FnOnce(&mut Config), stamp: Option<i64>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let upload_dir = dir.path().join("uploads");
        std::fs::create_dir_all(&upload_dir).unwrap();

        let mut config = Config::default();
        config.media.upload_dir = upload_dir.clone();
        config.media.max_request_size = "1GB".to_string();
        configure(&mut config);
        config.validate().unwrap();

        let policy = UploadPolicy::new(config.media.max_upload_bytes().unwrap());
        let mut store = MediaStore::new(upload_dir.clone(), policy);
        if let Some(stamp) = stamp {
            store = store.with_clock(Arc::new(FixedClock(stamp)));
        }

        let state = AppState::with_store(config, store).unwrap();
        let router = web::router(Arc::new(state)).unwrap();

        Self {
            _dir: dir,
            upload_dir,
            router,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

mod upload_tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_redirects_and_stores_identical_bytes() {
        let app = TestApp::with_clock(1_700_000_000_123_456_789);
        let data = png_bytes(4000, 9);

        let response = app.send(upload_request(&[file_part("cat.png", &data)])).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response
                .headers()
                .get(header::LOCATION)
                .map(|v| v.to_str().unwrap()),
            Some("/")
        );

        assert_eq!(stored_files(&app.upload_dir), vec!["1700000000123456789.png"]);
        let stored = std::fs::read(app.upload_dir.join("1700000000123456789.png")).unwrap();
        assert_eq!(stored, data);
    }

    #[tokio::test]
    async fn test_upload_accepts_each_media_kind() {
        let app = TestApp::new();
        let png = png_bytes(600, 1);
        let jpeg = jpeg_bytes(700);
        let mp4 = mp4_bytes(800);

        let response = app
            .send(upload_request(&[
                file_part("a.png", &png),
                file_part("b.jpg", &jpeg),
                file_part("c.mp4", &mp4),
            ]))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let files = stored_files(&app.upload_dir);
        assert_eq!(files.len(), 3);
        assert!(files.iter().any(|f| f.ends_with(".png")));
        assert!(files.iter().any(|f| f.ends_with(".jpg")));
        assert!(files.iter().any(|f| f.ends_with(".mp4")));
    }

    #[tokio::test]
    async fn test_get_upload_is_method_not_allowed() {
        let app = TestApp::new();

        let response = app.send(get("/upload")).await;

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body_text(response).await, "Invalid request method");
        assert!(stored_files(&app.upload_dir).is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_type_is_rejected() {
        let app = TestApp::new();
        let gif = b"GIF89a\x01\x00\x01\x00\x80\x00\x00".to_vec();

        let response = app.send(upload_request(&[file_part("anim.png", &gif)])).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_text(response).await,
            "The provided file format is not allowed. Please upload an MP4, JPEG, or PNG file"
        );
        assert!(stored_files(&app.upload_dir).is_empty());
    }

    #[tokio::test]
    async fn test_oversized_file_is_rejected() {
        let app = TestApp::with_max_upload("1KB");
        let data = png_bytes(4096, 3);

        let response = app.send(upload_request(&[file_part("huge.png", &data)])).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_text(response).await,
            "The uploaded file is too big: huge.png. Please use a file less than 1KB in size"
        );
        assert!(stored_files(&app.upload_dir).is_empty());
    }

    #[tokio::test]
    async fn test_file_at_limit_is_accepted() {
        let app = TestApp::with_max_upload("1KB");
        let data = png_bytes(1024, 3);

        let response = app.send(upload_request(&[file_part("exact.png", &data)])).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(stored_files(&app.upload_dir).len(), 1);
    }

    #[tokio::test]
    async fn test_failing_part_keeps_earlier_parts() {
        let app = TestApp::new();
        let good = png_bytes(600, 5);
        let bad = b"not an image at all".to_vec();
        let later = jpeg_bytes(600);

        let response = app
            .send(upload_request(&[
                file_part("first.png", &good),
                file_part("second.png", &bad),
                file_part("third.jpg", &later),
            ]))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let files = stored_files(&app.upload_dir);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with(".png"));
        assert_eq!(std::fs::read(app.upload_dir.join(&files[0])).unwrap(), good);
    }

    #[tokio::test]
    async fn test_other_fields_are_ignored() {
        let app = TestApp::new();
        let data = png_bytes(600, 2);

        let response = app
            .send(upload_request(&[
                Part {
                    field: "caption",
                    filename: None,
                    data: b"holiday",
                },
                Part {
                    field: "attachment",
                    filename: Some("x.png"),
                    data: &data,
                },
                file_part("kept.png", &data),
            ]))
            .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(stored_files(&app.upload_dir).len(), 1);
    }

    #[tokio::test]
    async fn test_empty_file_input_is_skipped() {
        let app = TestApp::new();

        let response = app.send(upload_request(&[file_part("", b"")])).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(stored_files(&app.upload_dir).is_empty());
    }

    #[tokio::test]
    async fn test_m4v_with_mp4_compatible_brand_is_accepted() {
        let app = TestApp::with_clock(99);
        let mut data = vec![
            0x00, 0x00, 0x00, 0x1C, b'f', b't', b'y', b'p', b'M', b'4', b'V', b' ', 0x00, 0x00,
            0x00, 0x01, b'M', b'4', b'V', b' ', b'm', b'p', b'4', b'2', b'i', b's', b'o', b'm',
        ];
        data.resize(700, 0x11);

        let response = app.send(upload_request(&[file_part("trailer.mp4", &data)])).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(stored_files(&app.upload_dir), vec!["99.mp4"]);
    }

    #[tokio::test]
    async fn test_missing_extension_uses_sniffed_kind() {
        let app = TestApp::with_clock(7);
        let data = jpeg_bytes(900);

        let response = app.send(upload_request(&[file_part("camera-upload", &data)])).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(stored_files(&app.upload_dir), vec!["7.jpg"]);
    }

    #[tokio::test]
    async fn test_coincident_timestamps_produce_distinct_files() {
        let app = TestApp::with_clock(1234);
        let first = png_bytes(600, 1);
        let second = png_bytes(600, 2);

        let response = app.send(upload_request(&[file_part("one.png", &first)])).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let response = app.send(upload_request(&[file_part("two.png", &second)])).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        assert_eq!(stored_files(&app.upload_dir), vec!["1234-1.png", "1234.png"]);
        assert_eq!(std::fs::read(app.upload_dir.join("1234.png")).unwrap(), first);
        assert_eq!(std::fs::read(app.upload_dir.join("1234-1.png")).unwrap(), second);
    }

    #[tokio::test]
    async fn test_non_multipart_body_is_rejected() {
        let app = TestApp::new();
        let request = Request::builder()
            .method("POST")
            .uri("/upload")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();

        let response = app.send(request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(stored_files(&app.upload_dir).is_empty());
    }
}

mod listing_tests {
    use super::*;

    #[tokio::test]
    async fn test_index_lists_uploaded_file_once() {
        let app = TestApp::with_clock(99);
        let data = png_bytes(1500, 4);

        let response = app.send(upload_request(&[file_part("pic.png", &data)])).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let response = app.send(get("/")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .map(|v| v.to_str().unwrap()),
            Some("text/html; charset=utf-8")
        );

        let html = body_text(response).await;
        assert_eq!(html.matches("<li>").count(), 1);
        assert!(html.contains("99.png"));
    }

    #[tokio::test]
    async fn test_index_empty_library() {
        let app = TestApp::new();

        let response = app.send(get("/")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Nothing uploaded yet."));
    }

    #[tokio::test]
    async fn test_index_skips_non_media_files() {
        let app = TestApp::new();
        std::fs::write(app.upload_dir.join("readme.txt"), b"hi").unwrap();
        std::fs::write(app.upload_dir.join("old.png"), png_bytes(64, 0)).unwrap();

        let html = body_text(app.send(get("/")).await).await;

        assert_eq!(html.matches("<li>").count(), 1);
        assert!(html.contains("old.png"));
        assert!(!html.contains("readme.txt"));
    }

    #[tokio::test]
    async fn test_index_missing_directory_is_server_error() {
        let app = TestApp::new();
        std::fs::remove_dir_all(&app.upload_dir).unwrap();

        let response = app.send(get("/")).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(response).await.contains("uploads"));
    }

    #[tokio::test]
    async fn test_responses_carry_security_headers() {
        let app = TestApp::new();

        let response = app.send(get("/")).await;

        assert_eq!(
            response
                .headers()
                .get("x-content-type-options")
                .map(|v| v.to_str().unwrap()),
            Some("nosniff")
        );
    }
}

mod retrieval_tests {
    use super::*;

    #[tokio::test]
    async fn test_uploaded_file_is_served_back() {
        let app = TestApp::with_clock(555);
        let data = png_bytes(3000, 8);

        app.send(upload_request(&[file_part("round.png", &data)])).await;

        let response = app.send(get("/videos/555.png")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .map(|v| v.to_str().unwrap()),
            Some("image/png")
        );
        assert_eq!(body_bytes(response).await, data);
    }

    #[tokio::test]
    async fn test_mp4_is_served_with_video_type() {
        let app = TestApp::with_clock(556);
        let data = mp4_bytes(2048);

        app.send(upload_request(&[file_part("clip.mp4", &data)])).await;

        let response = app.send(get("/videos/556.mp4")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .map(|v| v.to_str().unwrap()),
            Some("video/mp4")
        );
        assert_eq!(body_bytes(response).await, data);
    }

    #[tokio::test]
    async fn test_range_request_returns_partial_content() {
        let app = TestApp::new();
        let data = png_bytes(1000, 6);
        std::fs::write(app.upload_dir.join("range.png"), &data).unwrap();

        let request = Request::builder()
            .uri("/videos/range.png")
            .header(header::RANGE, "bytes=0-7")
            .body(Body::empty())
            .unwrap();
        let response = app.send(request).await;

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(body_bytes(response).await, PNG_MAGIC.to_vec());
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let app = TestApp::new();

        let response = app.send(get("/videos/nothing.png")).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_path_traversal_is_not_served() {
        let app = TestApp::new();
        std::fs::write(app.upload_dir.parent().unwrap().join("secret.png"), b"x").unwrap();

        let response = app.send(get("/videos/../secret.png")).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
