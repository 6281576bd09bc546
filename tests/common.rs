#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, Response, header},
};
use dropshelf::{config::Config, session, state::AppState};
use http_body_util::BodyExt;
use std::path::PathBuf;
use tempfile::TempDir;

pub const SECRET: &str = "integration-test-secret";
pub const ADMIN: &str = "admin";
pub const PASSWORD: &str = "hunter2";

/// Served root is `<tmp>/share`; the config file lives inside it so the
/// listing has something to hide. `<tmp>/outside` sits next to the root.
pub struct TestApp {
    pub state: AppState,
    pub tmp: TempDir,
}

impl TestApp {
    pub fn root(&self) -> PathBuf {
        self.state.root.clone()
    }

    pub fn outside(&self) -> PathBuf {
        self.tmp.path().join("outside")
    }
}

pub async fn setup() -> TestApp {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("share");
    std::fs::create_dir_all(&root).unwrap();
    std::fs::create_dir_all(tmp.path().join("outside")).unwrap();
    std::fs::write(tmp.path().join("outside/secret.txt"), "top secret").unwrap();

    let config = Config {
        root_dir: root.clone(),
        title: "Test Shelf".to_string(),
        username: ADMIN.to_string(),
        password: PASSWORD.to_string(),
        secret_key: SECRET.to_string(),
        ..Config::default()
    };
    let config_path = root.join("config.yaml");
    config.save(&config_path).unwrap();

    let state = AppState::new(config, &config_path).await.unwrap();
    TestApp { state, tmp }
}

pub fn cookie_for(identity: &str) -> String {
    format!("session={}", session::issue(identity, SECRET))
}

pub fn admin_cookie() -> String {
    cookie_for(ADMIN)
}

/// A validly signed session for someone other than the admin.
pub fn member_cookie() -> String {
    cookie_for("visitor")
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut req = Request::builder().uri(uri);
    if let Some(c) = cookie {
        req = req.header(header::COOKIE, c);
    }
    req.body(Body::empty()).unwrap()
}

pub fn post_form(uri: &str, fields: &[(&str, &str)], cookie: Option<&str>) -> Request<Body> {
    let body = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields)
        .finish();
    let mut req = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(c) = cookie {
        req = req.header(header::COOKIE, c);
    }
    req.body(Body::from(body)).unwrap()
}

/// Multipart upload request with an optional `directory` field first and
/// one `files` part per entry.
pub fn upload_request(
    files: &[(&str, &[u8])],
    directory: Option<&str>,
    cookie: Option<&str>,
) -> Request<Body> {
    let boundary = "----DropshelfTestBoundary";
    let mut body = Vec::new();
    if let Some(dir) = directory {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"directory\"\r\n\r\n");
        body.extend_from_slice(dir.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    for (name, content) in files {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n")
                .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    let mut req = Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        );
    if let Some(c) = cookie {
        req = req.header(header::COOKIE, c);
    }
    req.body(Body::from(body)).unwrap()
}

pub async fn body_bytes(resp: Response<Body>) -> Vec<u8> {
    resp.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_string(resp: Response<Body>) -> String {
    String::from_utf8(body_bytes(resp).await).unwrap()
}

pub fn location(resp: &Response<Body>) -> &str {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}
