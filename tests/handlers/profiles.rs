use axum::{body::Body, http::{Request, StatusCode}};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::json;
use tower::ServiceExt;

use crate::common::*;

#[tokio::test]
async fn test_signup_returns_key_once_and_rejects_duplicates() {
    let test = create_test_app_state();
    let app = test.app();

    let signup = |email: &str| {
        Request::builder()
            .method("POST")
            .uri("/auth/signup")
            .header("Content-Type", "application/json")
            .body(Body::from(json!({ "email": email, "name": "New User" }).to_string()))
            .unwrap()
    };

    let (status, body) = send(&app, signup("new@example.com")).await;
    assert_eq!(status, StatusCode::CREATED);
    let key = body["api_key"].as_str().unwrap().to_string();
    assert!(key.starts_with("tb_"));

    let (status, me) = send(&app, get("/me", &key)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["user"]["email"], "new@example.com");
    assert_eq!(me["profile"]["name"], "New User");

    let (status, _) = send(&app, signup("NEW@example.com")).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_profile_update_sets_and_clears_fields() {
    let test = create_test_app_state();
    let (user, key) = create_test_user(&test.conn(), "dev@example.com", "Dev");
    let app = test.app();

    let (status, body) = send(
        &app,
        json_request("PUT", "/me/profile", &key, json!({ "bio": "Rustacean", "location": "Lisbon" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bio"], "Rustacean");

    let (_, body) = send(&app, json_request("PUT", "/me/profile", &key, json!({ "location": null }))).await;
    assert!(body["location"].is_null());
    assert_eq!(body["bio"], "Rustacean");

    let (status, public) = send(&app, get(&format!("/profiles/{}", user.id), &key)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(public["bio"], "Rustacean");
    assert_eq!(public["name"], "Dev");
}

#[tokio::test]
async fn test_skills_add_list_delete() {
    let test = create_test_app_state();
    let (_, key) = create_test_user(&test.conn(), "dev@example.com", "Dev");
    let app = test.app();

    let (status, skill) = send(
        &app,
        json_request("POST", "/me/skills", &key, json!({ "name": "Rust", "proficiency": "expert" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        &app,
        json_request("POST", "/me/skills", &key, json!({ "name": "rust", "proficiency": "beginner" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, skills) = send(&app, get("/me/skills", &key)).await;
    assert_eq!(skills.as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        delete(&format!("/me/skills/{}", skill["id"].as_str().unwrap()), &key),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, skills) = send(&app, get("/me/skills", &key)).await;
    assert!(skills.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_resume_upload_stores_file_and_records_url() {
    let test = create_test_app_state();
    let (user, key) = create_test_user(&test.conn(), "dev@example.com", "Dev");
    let app = test.app();
    let pdf = b"%PDF-1.7 tiny resume";

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/me/resume",
            &key,
            json!({
                "file_name": "My CV.pdf",
                "content_type": "application/pdf",
                "data_base64": BASE64.encode(pdf),
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let expected_url = format!("{}/storage/resumes/{}/My_CV.pdf", TEST_BASE_URL, user.id);
    assert_eq!(body["resume_url"], expected_url.as_str());
    assert_eq!(body["size"], pdf.len());

    let profile = queries::get_profile(&test.conn(), &user.id).unwrap().unwrap();
    assert_eq!(profile.resume_url.as_deref(), Some(expected_url.as_str()));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/storage/resumes/{}/My_CV.pdf", user.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/pdf");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], pdf);
}

#[tokio::test]
async fn test_resume_upload_rejects_bad_type_and_oversize() {
    let test = create_test_app_state();
    let (_, key) = create_test_user(&test.conn(), "dev@example.com", "Dev");
    let app = test.app();

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/me/resume",
            &key,
            json!({ "file_name": "cv.png", "content_type": "image/png", "data_base64": BASE64.encode(b"png") }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let big = vec![b'x'; TEST_MAX_UPLOAD * 2];
    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/me/resume",
            &key,
            json!({ "file_name": "cv.pdf", "content_type": "application/pdf", "data_base64": BASE64.encode(&big) }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/me/resume",
            &key,
            json!({ "file_name": "cv.pdf", "content_type": "application/pdf", "data_base64": "!!not base64!!" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_storage_rejects_traversal() {
    let test = create_test_app_state();
    let app = test.app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/storage/resumes/..%2F..%2Fsecret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(matches!(
        response.status(),
        StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND
    ));
}
