use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;

use crate::common::*;

#[tokio::test]
async fn test_chat_without_ai_key_is_unavailable() {
    let test = create_test_app_state();
    let (_, key) = create_test_user(&test.conn(), "me@example.com", "Me");
    let app = test.app();

    let (status, _) = send(&app, json_request("POST", "/assistant/chat", &key, json!({ "message": "hi" }))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_chat_replies_and_caches_identical_prompts() {
    let generator = EchoGenerator::new();
    let test = create_test_app_state_with_assistant(generator.clone());
    let (_, key) = create_test_user(&test.conn(), "me@example.com", "Me");
    let app = test.app();

    let request = || {
        json_request(
            "POST",
            "/assistant/chat",
            &key,
            json!({ "message": "suggest a stack", "context": "web app" }),
        )
    };

    let (status, body) = send(&app, request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], "echo: suggest a stack [web app]");
    assert_eq!(body["cached"], false);

    let (_, body) = send(&app, request()).await;
    assert_eq!(body["cached"], true);
    assert_eq!(generator.calls(), 1);

    let (status, _) = send(&app, json_request("POST", "/assistant/chat", &key, json!({ "message": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_rate_limit_maps_to_unavailable() {
    let test = create_test_app_state_with_assistant(Arc::new(RateLimitedGenerator));
    let (_, key) = create_test_user(&test.conn(), "me@example.com", "Me");
    let app = test.app();

    let (status, body) = send(&app, json_request("POST", "/assistant/chat", &key, json!({ "message": "hi" }))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("rate limited"));
}

#[tokio::test]
async fn test_recommendations_rank_by_skill_overlap() {
    let test = create_test_app_state();
    let key = {
        let conn = test.conn();
        let (owner, _) = create_test_user(&conn, "owner@example.com", "Owner");
        let (dev, key) = create_test_user(&conn, "dev@example.com", "Dev");
        for name in ["Rust", "SQL"] {
            queries::create_skill(
                &conn,
                &dev.id,
                &CreateSkill {
                    name: name.into(),
                    proficiency: Proficiency::Advanced,
                },
            )
            .unwrap();
        }

        let with_skills = |name: &str, skills: &[&str]| CreateProject {
            required_skills: skills.iter().map(|s| s.to_string()).collect(),
            ..project_input(name)
        };
        queries::create_project(&conn, &owner.id, &with_skills("Partial", &["rust", "figma"])).unwrap();
        queries::create_project(&conn, &owner.id, &with_skills("Best", &["RUST", "sql"])).unwrap();
        queries::create_project(&conn, &owner.id, &with_skills("None", &["figma"])).unwrap();
        // Own projects are never recommended
        queries::create_project(&conn, &dev.id, &with_skills("Mine", &["rust", "sql"])).unwrap();
        key
    };
    let app = test.app();

    let (status, body) = send(&app, get("/recommendations/projects", &key)).await;
    assert_eq!(status, StatusCode::OK);
    let recs = body.as_array().unwrap();
    let names: Vec<&str> = recs.iter().map(|r| r["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Best", "Partial"]);
    assert_eq!(recs[0]["score"], 2);
    assert_eq!(recs[1]["matched_skills"], json!(["rust"]));
}
