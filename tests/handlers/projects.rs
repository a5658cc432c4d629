use axum::http::StatusCode;
use serde_json::json;

use teamboard::realtime::{ChangeKind, RowFilter, Subscription, Table};

use crate::common::*;

#[tokio::test]
async fn test_create_project_makes_owner_an_active_member() {
    let test = create_test_app_state();
    let (owner, key) = create_test_user(&test.conn(), "owner@example.com", "Owner");
    let app = test.app();

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/projects",
            &key,
            json!({ "name": "Demo", "status": "planning", "team_size": 1 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "Demo");
    assert_eq!(body["owner_id"], owner.id.as_str());
    let project_id = body["id"].as_str().unwrap().to_string();

    let (status, list) = send(&app, get("/projects?mine=true", &key)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, members) = send(&app, get(&format!("/projects/{}/members", project_id), &key)).await;
    assert_eq!(status, StatusCode::OK);
    let members = members.as_array().unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["user_id"], owner.id.as_str());
    assert_eq!(members[0]["role"], "owner");
    assert_eq!(members[0]["status"], "active");
}

#[tokio::test]
async fn test_create_project_validates_input() {
    let test = create_test_app_state();
    let (_, key) = create_test_user(&test.conn(), "owner@example.com", "Owner");
    let app = test.app();

    let (status, _) = send(&app, json_request("POST", "/projects", &key, json!({ "name": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        json_request("POST", "/projects", &key, json!({ "name": "X", "team_size": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        json_request("POST", "/projects", &key, json!({ "name": "X", "status": "bogus" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_renders_every_visible_project() {
    let test = create_test_app_state();
    let (owner, key) = {
        let conn = test.conn();
        let (owner, key) = create_test_user(&conn, "owner@example.com", "Owner");
        for i in 0..5 {
            create_test_project(&conn, &owner.id, &format!("Project {}", i));
        }
        (owner, key)
    };
    let app = test.app();

    let (status, body) = send(&app, get("/projects", &key)).await;
    assert_eq!(status, StatusCode::OK);
    let projects = body.as_array().unwrap();
    assert_eq!(projects.len(), 5);
    assert!(projects.iter().all(|p| p["owner_id"] == owner.id.as_str()));
}

#[tokio::test]
async fn test_search_returns_all_and_only_matches() {
    let test = create_test_app_state();
    let key = {
        let conn = test.conn();
        let (owner, key) = create_test_user(&conn, "owner@example.com", "Owner");
        create_test_project(&conn, &owner.id, "Rust Compiler");
        create_test_project(&conn, &owner.id, "Garden Planner");
        let input = CreateProject {
            description: Some("A TRUSTworthy ledger".into()),
            ..project_input("Ledger")
        };
        queries::create_project(&conn, &owner.id, &input).unwrap();
        key
    };
    let app = test.app();

    let (status, body) = send(&app, get("/projects?q=rust", &key)).await;
    assert_eq!(status, StatusCode::OK);
    let mut names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    names.sort();
    assert_eq!(names, vec!["Ledger", "Rust Compiler"]);

    let (_, body) = send(&app, get("/projects?q=nothing", &key)).await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_list_filters_by_status() {
    let test = create_test_app_state();
    let key = {
        let conn = test.conn();
        let (owner, key) = create_test_user(&conn, "owner@example.com", "Owner");
        create_test_project(&conn, &owner.id, "Planned");
        let input = CreateProject {
            status: ProjectStatus::Active,
            ..project_input("Running")
        };
        queries::create_project(&conn, &owner.id, &input).unwrap();
        key
    };
    let app = test.app();

    let (status, body) = send(&app, get("/projects?status=active", &key)).await;
    assert_eq!(status, StatusCode::OK);
    let projects = body.as_array().unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0]["name"], "Running");
}

#[tokio::test]
async fn test_update_and_delete_require_roles() {
    let test = create_test_app_state();
    let (project, owner_key, member_key) = {
        let conn = test.conn();
        let (owner, owner_key) = create_test_user(&conn, "owner@example.com", "Owner");
        let (member, member_key) = create_test_user(&conn, "member@example.com", "Member");
        let project = create_test_project(&conn, &owner.id, "Demo");
        add_active_member(&conn, &project.id, &member.id);
        (project, owner_key, member_key)
    };
    let app = test.app();
    let uri = format!("/projects/{}", project.id);

    let (status, _) = send(&app, json_request("PUT", &uri, &member_key, json!({ "name": "Hijack" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        json_request("PUT", &uri, &owner_key, json!({ "name": "Renamed", "description": "now with text" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Renamed");
    assert_eq!(body["description"], "now with text");

    let (status, _) = send(&app, delete(&uri, &member_key)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, delete(&uri, &owner_key)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, get(&uri, &owner_key)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_publishes_removal_of_tasks_and_members() {
    let test = create_test_app_state();
    let (project, task, member, owner_key) = {
        let conn = test.conn();
        let (owner, owner_key) = create_test_user(&conn, "owner@example.com", "Owner");
        let (helper, _) = create_test_user(&conn, "helper@example.com", "Helper");
        let project = create_test_project(&conn, &owner.id, "Doomed");
        let member = add_active_member(&conn, &project.id, &helper.id);
        let task = create_test_task(&conn, &project.id, &owner.id, "Orphan", TaskStatus::Todo);
        (project, task, member, owner_key)
    };

    let mut tasks = test.state.events.subscribe(Subscription::table(Table::Tasks));
    let mut members = test.state.events.subscribe(
        Subscription::table(Table::TeamMembers).filter(RowFilter::eq("user_id", member.user_id.clone())),
    );
    let mut projects = test.state.events.subscribe(Subscription::table(Table::Projects));

    let app = test.app();
    let (status, _) = send(&app, delete(&format!("/projects/{}", project.id), &owner_key)).await;
    assert_eq!(status, StatusCode::OK);

    let event = tasks.recv().await.unwrap();
    assert_eq!(event.kind, ChangeKind::Delete);
    assert_eq!(event.id, task.id);

    let event = members.recv().await.unwrap();
    assert_eq!(event.kind, ChangeKind::Delete);
    assert_eq!(event.id, member.id);

    let event = projects.recv().await.unwrap();
    assert_eq!(event.kind, ChangeKind::Delete);
    assert_eq!(event.id, project.id);

    assert!(queries::get_task_by_id(&test.conn(), &task.id).unwrap().is_none());
}

#[tokio::test]
async fn test_malformed_body_reports_details() {
    let test = create_test_app_state();
    let (_, key) = create_test_user(&test.conn(), "me@example.com", "Me");
    let app = test.app();

    let (status, body) = send(&app, json_request("POST", "/projects", &key, json!({ "team_size": 2 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid JSON body");
    assert!(body["details"].as_str().unwrap().contains("name"));
}
