use std::time::Duration;

use axum::http::StatusCode;
use futures_util::StreamExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use teamboard::realtime::{ChangeKind, RowFilter, Subscription, Table};

use crate::common::*;

/// Read SSE frames until one carries a `data:` line, and parse it.
async fn next_event(stream: &mut (impl futures_util::Stream<Item = Result<axum::body::Bytes, axum::Error>> + Unpin)) -> Value {
    let mut buffer = String::new();
    loop {
        let chunk = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended")
            .unwrap();
        buffer.push_str(std::str::from_utf8(&chunk).unwrap());
        if let Some(line) = buffer.lines().find(|l| l.starts_with("data:")) {
            return serde_json::from_str(line.trim_start_matches("data:").trim()).unwrap();
        }
    }
}

#[tokio::test]
async fn test_sse_streams_task_status_changes() {
    let test = create_test_app_state();
    let (project, task, key) = {
        let conn = test.conn();
        let (owner, key) = create_test_user(&conn, "owner@example.com", "Owner");
        let project = create_test_project(&conn, &owner.id, "Demo");
        let task = create_test_task(&conn, &project.id, &owner.id, "Live", TaskStatus::Todo);
        (project, task, key)
    };
    let app = test.app();

    let response = app
        .clone()
        .oneshot(get(
            &format!("/realtime/tasks?filter=project_id=eq.{}", project.id),
            &key,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/event-stream");
    let mut stream = response.into_body().into_data_stream();

    let (status, _) = send(
        &app,
        json_request(
            "PATCH",
            &format!("/tasks/{}/status", task.id),
            &key,
            json!({ "status": "in_progress" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let event = next_event(&mut stream).await;
    assert_eq!(event["table"], "tasks");
    assert_eq!(event["kind"], "update");
    assert_eq!(event["id"], task.id.as_str());
    assert_eq!(event["record"]["status"], "in_progress");
}

#[tokio::test]
async fn test_realtime_rejects_unknown_table_and_bad_filter() {
    let test = create_test_app_state();
    let (_, key) = create_test_user(&test.conn(), "me@example.com", "Me");
    let app = test.app();

    let response = app.clone().oneshot(get("/realtime/secrets", &key)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(get("/realtime/tasks?filter=project_id", &key))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_task_feed_for_foreign_project_is_forbidden() {
    let test = create_test_app_state();
    let (project, outsider_key) = {
        let conn = test.conn();
        let (owner, _) = create_test_user(&conn, "owner@example.com", "Owner");
        let (_, outsider_key) = create_test_user(&conn, "outsider@example.com", "Outsider");
        (create_test_project(&conn, &owner.id, "Demo"), outsider_key)
    };
    let app = test.app();

    let response = app
        .oneshot(get(
            &format!("/realtime/tasks?filter=project_id=eq.{}", project.id),
            &outsider_key,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_join_request_publishes_member_and_notification_events() {
    let test = create_test_app_state();
    let (owner, project, joiner_key) = {
        let conn = test.conn();
        let (owner, _) = create_test_user(&conn, "owner@example.com", "Owner");
        let (_, joiner_key) = create_test_user(&conn, "joiner@example.com", "Joiner");
        let project = create_test_project(&conn, &owner.id, "Demo");
        (owner, project, joiner_key)
    };

    let mut members = test.state.events.subscribe(
        Subscription::table(Table::TeamMembers).filter(RowFilter::eq("project_id", project.id.clone())),
    );
    let mut owner_inbox = test
        .state
        .events
        .subscribe(Subscription::table(Table::Notifications).filter(RowFilter::eq("user_id", owner.id.clone())));

    let app = test.app();
    let (status, _) = send(
        &app,
        json_request("POST", &format!("/projects/{}/join", project.id), &joiner_key, json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let event = members.recv().await.unwrap();
    assert_eq!(event.kind, ChangeKind::Insert);
    assert_eq!(event.record["status"], "pending");

    let event = owner_inbox.recv().await.unwrap();
    assert_eq!(event.kind, ChangeKind::Insert);
    assert_eq!(event.record["kind"], "join_request");
}

#[tokio::test]
async fn test_project_feed_hides_private_projects_from_outsiders() {
    let test = create_test_app_state();
    let (owner_key, outsider_key) = {
        let conn = test.conn();
        let (_, owner_key) = create_test_user(&conn, "owner@example.com", "Owner");
        let (_, outsider_key) = create_test_user(&conn, "outsider@example.com", "Outsider");
        (owner_key, outsider_key)
    };
    let app = test.app();

    let response = app
        .clone()
        .oneshot(get("/realtime/projects", &outsider_key))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let mut stream = response.into_body().into_data_stream();

    let (status, private) = send(
        &app,
        json_request(
            "POST",
            "/projects",
            &owner_key,
            json!({ "name": "Secret Plan", "visibility": "private" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(
        &app,
        json_request("POST", "/projects", &owner_key, json!({ "name": "Open Source" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let event = next_event(&mut stream).await;
    assert_eq!(event["record"]["name"], "Open Source");
    assert_ne!(event["id"], private["id"]);
}

#[tokio::test]
async fn test_owner_sees_own_private_project_created_after_subscribing() {
    let test = create_test_app_state();
    let (_, owner_key) = create_test_user(&test.conn(), "owner@example.com", "Owner");
    let app = test.app();

    let response = app.clone().oneshot(get("/realtime/projects", &owner_key)).await.unwrap();
    let mut stream = response.into_body().into_data_stream();

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/projects",
            &owner_key,
            json!({ "name": "Secret Plan", "visibility": "private" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let event = next_event(&mut stream).await;
    assert_eq!(event["record"]["name"], "Secret Plan");
}

#[tokio::test]
async fn test_member_feed_is_limited_to_own_projects_and_own_rows() {
    let test = create_test_app_state();
    let (owner_key, outsider_key, public) = {
        let conn = test.conn();
        let (owner, owner_key) = create_test_user(&conn, "owner@example.com", "Owner");
        let (_, outsider_key) = create_test_user(&conn, "outsider@example.com", "Outsider");
        let public = create_test_project(&conn, &owner.id, "Open");
        (owner_key, outsider_key, public)
    };
    let app = test.app();

    let response = app
        .clone()
        .oneshot(get("/realtime/team_members", &outsider_key))
        .await
        .unwrap();
    let mut stream = response.into_body().into_data_stream();

    // Owner row of a project the outsider is not in
    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/projects",
            &owner_key,
            json!({ "name": "Secret Plan", "visibility": "private" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, request) = send(
        &app,
        json_request("POST", &format!("/projects/{}/join", public.id), &outsider_key, json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let event = next_event(&mut stream).await;
    assert_eq!(event["id"], request["id"]);
    assert_eq!(event["record"]["status"], "pending");

    let response = app
        .oneshot(get(
            &format!("/realtime/team_members?filter=project_id=eq.{}", public.id),
            &outsider_key,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_assignee_outside_project_receives_task_updates() {
    let test = create_test_app_state();
    let (owner_key, assignee_key, task) = {
        let conn = test.conn();
        let (owner, owner_key) = create_test_user(&conn, "owner@example.com", "Owner");
        let (assignee, assignee_key) = create_test_user(&conn, "assignee@example.com", "Assignee");
        let project = create_test_project(&conn, &owner.id, "Demo");
        let task = create_test_task(&conn, &project.id, &owner.id, "Handed over", TaskStatus::Todo);
        queries::update_task(
            &conn,
            &task.id,
            &UpdateTask {
                assignee_id: Some(Some(assignee.id.clone())),
                ..Default::default()
            },
        )
        .unwrap();
        (owner_key, assignee_key, task)
    };
    let app = test.app();

    let response = app.clone().oneshot(get("/realtime/tasks", &assignee_key)).await.unwrap();
    let mut stream = response.into_body().into_data_stream();

    let (status, _) = send(
        &app,
        json_request(
            "PATCH",
            &format!("/tasks/{}/status", task.id),
            &owner_key,
            json!({ "status": "completed" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let event = next_event(&mut stream).await;
    assert_eq!(event["id"], task.id.as_str());
    assert_eq!(event["record"]["status"], "completed");
}
