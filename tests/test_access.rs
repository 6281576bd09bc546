mod common;

use axum::http::{StatusCode, header};
use dropshelf::{build_router, session};
use tower::ServiceExt;

#[tokio::test]
async fn anonymous_upload_redirects_to_login() {
    let app = common::setup().await;
    let router = build_router(app.state.clone());

    let resp = router.oneshot(common::get("/upload", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(common::location(&resp), "/login");
}

#[tokio::test]
async fn anonymous_upload_post_redirects_to_login() {
    let app = common::setup().await;
    let router = build_router(app.state.clone());

    let req = common::upload_request(&[("a.txt", b"x")], None, None);
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(common::location(&resp), "/login");
    assert!(!app.root().join("a.txt").exists());
}

#[tokio::test]
async fn signed_in_users_see_upload_form() {
    let app = common::setup().await;
    let router = build_router(app.state.clone());

    for cookie in [common::admin_cookie(), common::member_cookie()] {
        let resp = router
            .clone()
            .oneshot(common::get("/upload", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = common::body_string(resp).await;
        assert!(body.contains("enctype=\"multipart/form-data\""));
        assert!(body.contains("name=\"files\""));
    }
}

#[tokio::test]
async fn delete_requires_admin() {
    let app = common::setup().await;
    std::fs::write(app.root().join("keep.txt"), "x").unwrap();
    let router = build_router(app.state.clone());

    let anon = router
        .clone()
        .oneshot(common::post_form("/delete", &[("filename", "keep.txt")], None))
        .await
        .unwrap();
    assert_eq!(anon.status(), StatusCode::UNAUTHORIZED);

    let member = common::member_cookie();
    let resp = router
        .oneshot(common::post_form(
            "/delete",
            &[("filename", "keep.txt")],
            Some(&member),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(app.root().join("keep.txt").exists());
}

#[tokio::test]
async fn login_sets_session_cookie() {
    let app = common::setup().await;
    let router = build_router(app.state.clone());

    let resp = router
        .oneshot(common::post_form(
            "/login",
            &[("username", common::ADMIN), ("password", common::PASSWORD)],
            None,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(common::location(&resp), "/upload");

    let cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(cookie.starts_with("session=admin:"));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Max-Age=86400"));

    let token = cookie
        .trim_start_matches("session=")
        .split(';')
        .next()
        .unwrap();
    assert_eq!(session::verify(token, common::SECRET).unwrap(), "admin");
}

#[tokio::test]
async fn wrong_credentials_rerender_form() {
    let app = common::setup().await;
    let router = build_router(app.state.clone());

    let resp = router
        .oneshot(common::post_form(
            "/login",
            &[("username", "admin"), ("password", "wrong")],
            None,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get(header::SET_COOKIE).is_none());
    let body = common::body_string(resp).await;
    assert!(body.contains("Incorrect username or password"));
    assert!(body.contains("value=\"admin\""));
}

#[tokio::test]
async fn login_page_skipped_when_signed_in() {
    let app = common::setup().await;
    let router = build_router(app.state.clone());

    let anon = router.clone().oneshot(common::get("/login", None)).await.unwrap();
    assert_eq!(anon.status(), StatusCode::OK);

    let cookie = common::admin_cookie();
    let resp = router
        .oneshot(common::get("/login", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(common::location(&resp), "/upload");
}

#[tokio::test]
async fn logout_clears_cookie() {
    let app = common::setup().await;
    let router = build_router(app.state.clone());

    let cookie = common::admin_cookie();
    let resp = router
        .oneshot(common::get("/logout", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(common::location(&resp), "/");
    let set = resp
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(set.starts_with("session=;"));
    assert!(set.contains("Max-Age=0"));
}

#[tokio::test]
async fn forged_or_stale_sessions_are_anonymous() {
    let app = common::setup().await;
    let router = build_router(app.state.clone());

    let forged = format!("session={}", session::issue("admin", "guessed-key"));
    let old = chrono::Utc::now().timestamp() - 2 * 24 * 3600;
    let stale = format!("session={}", session::issue_at("admin", old, common::SECRET));

    for cookie in [forged, stale, "session=admin:123:abc".to_string()] {
        let resp = router
            .clone()
            .oneshot(common::get("/upload", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER, "{cookie}");
        assert_eq!(common::location(&resp), "/login");
    }
}
