use crate::common::*;

#[test]
fn test_visible_tasks_cover_membership_and_assignment() {
    let test = create_test_app_state();
    let conn = test.conn();
    let (owner, _) = create_test_user(&conn, "owner@example.com", "Owner");
    let (outsider, _) = create_test_user(&conn, "outsider@example.com", "Outsider");
    let project = create_test_project(&conn, &owner.id, "Demo");

    let plain = create_test_task(&conn, &project.id, &owner.id, "Plain", TaskStatus::Todo);
    assert_eq!(
        queries::list_visible_tasks(&conn, &owner.id, &TaskFilter::default())
            .unwrap()
            .len(),
        1
    );
    assert!(
        queries::list_visible_tasks(&conn, &outsider.id, &TaskFilter::default())
            .unwrap()
            .is_empty()
    );

    // Assignment alone grants visibility
    let update = UpdateTask {
        assignee_id: Some(Some(outsider.id.clone())),
        ..Default::default()
    };
    assert!(queries::update_task(&conn, &plain.id, &update).unwrap());
    let visible = queries::list_visible_tasks(&conn, &outsider.id, &TaskFilter::default()).unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, plain.id);
}

#[test]
fn test_task_filters_combine() {
    let test = create_test_app_state();
    let conn = test.conn();
    let (owner, _) = create_test_user(&conn, "owner@example.com", "Owner");
    let first = create_test_project(&conn, &owner.id, "First");
    let second = create_test_project(&conn, &owner.id, "Second");

    create_test_task(&conn, &first.id, &owner.id, "A", TaskStatus::Todo);
    create_test_task(&conn, &first.id, &owner.id, "B", TaskStatus::Completed);
    create_test_task(&conn, &second.id, &owner.id, "C", TaskStatus::Todo);

    let filter = TaskFilter {
        project_id: Some(first.id.clone()),
        status: Some(TaskStatus::Todo),
        ..Default::default()
    };
    let tasks = queries::list_visible_tasks(&conn, &owner.id, &filter).unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "A");

    let by_project = TaskFilter {
        project_id: Some(second.id.clone()),
        ..Default::default()
    };
    assert_eq!(queries::list_visible_tasks(&conn, &owner.id, &by_project).unwrap().len(), 1);
}

#[test]
fn test_status_update_is_last_write_wins() {
    let test = create_test_app_state();
    let conn = test.conn();
    let (owner, _) = create_test_user(&conn, "owner@example.com", "Owner");
    let project = create_test_project(&conn, &owner.id, "Demo");
    let task = create_test_task(&conn, &project.id, &owner.id, "Race", TaskStatus::Todo);

    assert!(queries::update_task_status(&conn, &task.id, TaskStatus::InProgress).unwrap());
    assert!(queries::update_task_status(&conn, &task.id, TaskStatus::Pending).unwrap());

    let stored = queries::get_task_by_id(&conn, &task.id).unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Pending);

    assert!(!queries::update_task_status(&conn, "missing", TaskStatus::Todo).unwrap());
}

#[test]
fn test_update_task_clears_nullable_fields() {
    let test = create_test_app_state();
    let conn = test.conn();
    let (owner, _) = create_test_user(&conn, "owner@example.com", "Owner");
    let project = create_test_project(&conn, &owner.id, "Demo");
    let task = queries::create_task(
        &conn,
        &project.id,
        &owner.id,
        &CreateTask {
            title: "Dated".into(),
            description: Some("details".into()),
            status: TaskStatus::Todo,
            priority: TaskPriority::High,
            assignee_id: Some(owner.id.clone()),
            due_date: Some("2026-11-01".into()),
        },
    )
    .unwrap();

    let update = UpdateTask {
        description: Some(None),
        due_date: Some(None),
        ..Default::default()
    };
    queries::update_task(&conn, &task.id, &update).unwrap();

    let stored = queries::get_task_by_id(&conn, &task.id).unwrap().unwrap();
    assert_eq!(stored.description, None);
    assert_eq!(stored.due_date, None);
    assert_eq!(stored.assignee_id.as_deref(), Some(owner.id.as_str()));
    assert_eq!(stored.priority, TaskPriority::High);
}
