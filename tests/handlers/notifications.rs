use axum::http::StatusCode;
use serde_json::json;

use teamboard::realtime::{ChangeKind, RowFilter, Subscription, Table};

use crate::common::*;

fn seed(conn: &rusqlite::Connection, user_id: &str, count: usize) -> Vec<Notification> {
    (0..count)
        .map(|i| {
            queries::create_notification(
                conn,
                &CreateNotification {
                    user_id: user_id.to_string(),
                    kind: NotificationKind::System,
                    title: format!("Notice {}", i),
                    message: "hello".into(),
                    project_id: None,
                },
            )
            .unwrap()
        })
        .collect()
}

#[tokio::test]
async fn test_list_and_paginate_notifications() {
    let test = create_test_app_state();
    let key = {
        let conn = test.conn();
        let (user, key) = create_test_user(&conn, "me@example.com", "Me");
        seed(&conn, &user.id, 3);
        key
    };
    let app = test.app();

    let (status, body) = send(&app, get("/notifications?limit=2", &key)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["limit"], 2);
    assert_eq!(body["items"].as_array().unwrap().len(), 2);

    let (_, body) = send(&app, get("/notifications?limit=2&offset=2", &key)).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_mark_read_and_unread_filter() {
    let test = create_test_app_state();
    let (notes, key, other_key) = {
        let conn = test.conn();
        let (user, key) = create_test_user(&conn, "me@example.com", "Me");
        let (_, other_key) = create_test_user(&conn, "other@example.com", "Other");
        (seed(&conn, &user.id, 2), key, other_key)
    };
    let app = test.app();
    let read_uri = format!("/notifications/{}/read", notes[0].id);

    let (status, _) = send(&app, json_request("POST", &read_uri, &other_key, json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, json_request("POST", &read_uri, &key, json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["read"], true);

    let (_, body) = send(&app, get("/notifications?unread=true", &key)).await;
    assert_eq!(body["total"], 1);

    let (status, body) = send(&app, json_request("POST", "/notifications/read-all", &key, json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], 1);

    let (_, body) = send(&app, get("/notifications?unread=true", &key)).await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn test_read_all_publishes_an_update_per_notification() {
    let test = create_test_app_state();
    let (user, notes, key) = {
        let conn = test.conn();
        let (user, key) = create_test_user(&conn, "me@example.com", "Me");
        let notes = seed(&conn, &user.id, 2);
        (user, notes, key)
    };
    let mut inbox = test
        .state
        .events
        .subscribe(Subscription::table(Table::Notifications).filter(RowFilter::eq("user_id", user.id.clone())));
    let app = test.app();

    let (status, body) = send(&app, json_request("POST", "/notifications/read-all", &key, json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], 2);

    let mut ids = Vec::new();
    for _ in 0..2 {
        let event = inbox.recv().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Update);
        assert_eq!(event.record["read"], true);
        ids.push(event.id);
    }
    let mut expected: Vec<String> = notes.iter().map(|n| n.id.clone()).collect();
    ids.sort();
    expected.sort();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_delete_notification_only_by_owner() {
    let test = create_test_app_state();
    let (notes, key, other_key) = {
        let conn = test.conn();
        let (user, key) = create_test_user(&conn, "me@example.com", "Me");
        let (_, other_key) = create_test_user(&conn, "other@example.com", "Other");
        (seed(&conn, &user.id, 1), key, other_key)
    };
    let app = test.app();
    let uri = format!("/notifications/{}", notes[0].id);

    let (status, _) = send(&app, delete(&uri, &other_key)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, delete(&uri, &key)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, get("/notifications", &key)).await;
    assert_eq!(body["total"], 0);
}
