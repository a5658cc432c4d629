use axum::http::StatusCode;

use crate::common::*;

#[tokio::test]
async fn test_dashboard_counts_live_data_only() {
    let test = create_test_app_state();
    let key = {
        let conn = test.conn();
        let (owner, key) = create_test_user(&conn, "owner@example.com", "Owner");
        let (joiner, _) = create_test_user(&conn, "joiner@example.com", "Joiner");
        let project = create_test_project(&conn, &owner.id, "Demo");
        create_test_task(&conn, &project.id, &owner.id, "A", TaskStatus::Todo);
        create_test_task(&conn, &project.id, &owner.id, "B", TaskStatus::Todo);
        create_test_task(&conn, &project.id, &owner.id, "C", TaskStatus::Completed);
        queries::create_join_request(&conn, &project.id, &joiner.id, None).unwrap();
        key
    };
    let app = test.app();

    let (status, body) = send(&app, get("/dashboard", &key)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["projects_owned"], 1);
    assert_eq!(body["active_memberships"], 1);
    assert_eq!(body["pending_requests"], 1);
    assert_eq!(body["unread_notifications"], 0);
    assert_eq!(body["tasks"]["todo"], 2);
    assert_eq!(body["tasks"]["completed"], 1);
    assert_eq!(body["tasks"]["in_progress"], 0);
}

#[tokio::test]
async fn test_dashboard_for_new_user_is_empty() {
    let test = create_test_app_state();
    let (_, key) = create_test_user(&test.conn(), "new@example.com", "New");
    let app = test.app();

    let (status, body) = send(&app, get("/dashboard", &key)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["projects_owned"], 0);
    assert_eq!(body["tasks"]["todo"], 0);
}
