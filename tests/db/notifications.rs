use crate::common::*;

fn notification_for(user_id: &str, title: &str) -> CreateNotification {
    CreateNotification {
        user_id: user_id.to_string(),
        kind: NotificationKind::System,
        title: title.to_string(),
        message: format!("{} body", title),
        project_id: None,
    }
}

#[test]
fn test_notifications_are_scoped_to_their_owner() {
    let test = create_test_app_state();
    let conn = test.conn();
    let (alice, _) = create_test_user(&conn, "alice@example.com", "Alice");
    let (bob, _) = create_test_user(&conn, "bob@example.com", "Bob");

    let note = queries::create_notification(&conn, &notification_for(&alice.id, "Hello")).unwrap();

    assert!(queries::get_notification(&conn, &note.id, &bob.id).unwrap().is_none());
    assert!(!queries::mark_notification_read(&conn, &note.id, &bob.id).unwrap());
    assert!(!queries::delete_notification(&conn, &note.id, &bob.id).unwrap());

    assert!(queries::mark_notification_read(&conn, &note.id, &alice.id).unwrap());
    let stored = queries::get_notification(&conn, &note.id, &alice.id).unwrap().unwrap();
    assert!(stored.read);
}

#[test]
fn test_unread_filter_and_mark_all() {
    let test = create_test_app_state();
    let conn = test.conn();
    let (alice, _) = create_test_user(&conn, "alice@example.com", "Alice");

    for title in ["One", "Two", "Three"] {
        queries::create_notification(&conn, &notification_for(&alice.id, title)).unwrap();
    }

    let (items, total) = queries::list_notifications_paginated(&conn, &alice.id, true, 2, 0).unwrap();
    assert_eq!(total, 3);
    assert_eq!(items.len(), 2);
    // Newest first
    assert_eq!(items[0].title, "Three");

    assert_eq!(queries::mark_all_notifications_read(&conn, &alice.id).unwrap().len(), 3);
    assert_eq!(queries::count_unread_notifications(&conn, &alice.id).unwrap(), 0);

    let (unread, total) = queries::list_notifications_paginated(&conn, &alice.id, true, 50, 0).unwrap();
    assert!(unread.is_empty());
    assert_eq!(total, 0);
}
