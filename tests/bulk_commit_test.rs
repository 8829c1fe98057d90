#[path = "common/mod.rs"]
mod common;

use common::{TicketBuilder, credentials, queue, store};
use ticketdesk::{
    BulkEditor, ChangeKey, Config, DeskError, ErrorKind, FieldValue, TicketField,
    TicketPriority, TicketStatus, TicketStore,
};

// ============================================================================
// Bulk edit and commit through the public API
// ============================================================================

#[tokio::test]
async fn test_bulk_priority_change_with_partial_failure() {
    let store = store(queue());
    store.fail_writes_for("3", ErrorKind::Rejected);
    let editor = BulkEditor::from_config(store.clone(), credentials(), queue(), &Config::default());

    editor.select("1").unwrap();
    editor.select("3").unwrap();
    let staged = editor
        .set_pending_value_for_selection(FieldValue::Priority(TicketPriority::High))
        .unwrap();
    assert_eq!(staged, 2);

    let report = editor.commit().await.unwrap();
    assert_eq!(
        report.succeeded,
        vec![ChangeKey::new("1", TicketField::Priority)]
    );
    assert_eq!(report.failed_ids().len(), 1);
    assert!(report.failed_ids().iter().any(|id| id.as_str() == "3"));
    assert!(report.failed[0].error.is_retryable());

    // 1 is committed locally and remotely
    assert_eq!(editor.ticket("1").unwrap().priority, TicketPriority::High);
    let remote = store.fetch_all(&*credentials()).await.unwrap();
    assert_eq!(remote[0].priority, TicketPriority::High);

    // 3 still shows High, but only as a pending value
    assert_eq!(
        editor.display_value("3", TicketField::Priority),
        Some(FieldValue::Priority(TicketPriority::High))
    );
    assert_eq!(
        editor.committed_value("3", TicketField::Priority),
        Some(FieldValue::Priority(TicketPriority::Medium))
    );
    assert_eq!(remote[2].priority, TicketPriority::Medium);
}

#[tokio::test]
async fn test_mixed_field_edits_commit_independently() {
    let store = store(queue());
    store.fail_writes_for("2", ErrorKind::Network);
    let editor = BulkEditor::new(store.clone(), credentials(), queue());

    editor
        .set_pending_value("1", FieldValue::Status(TicketStatus::InProgress))
        .unwrap();
    editor
        .set_pending_value("2", FieldValue::Status(TicketStatus::Resolved))
        .unwrap();
    // Already unassigned: nothing to stage
    editor
        .set_pending_value("3", FieldValue::AssignedTo(None))
        .unwrap();
    assert!(editor.pending_change("3", TicketField::AssignedTo).is_none());

    let report = editor.commit().await.unwrap();
    assert_eq!(report.succeeded.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].field, TicketField::Status);
    assert_eq!(editor.pending_changes().len(), 1);
    assert_eq!(
        editor.ticket("1").unwrap().status,
        TicketStatus::InProgress
    );
}

#[tokio::test]
async fn test_discard_after_failed_commit_restores_committed() {
    let store = store(queue());
    store.fail_writes_for("1", ErrorKind::Network);
    let editor = BulkEditor::new(store, credentials(), queue());

    editor
        .set_pending_value("1", FieldValue::Priority(TicketPriority::Critical))
        .unwrap();
    editor.commit().await.unwrap();
    assert!(editor.has_pending_changes());

    editor.discard("1");
    assert!(!editor.has_pending_changes());
    assert_eq!(
        editor.display_value("1", TicketField::Priority),
        Some(FieldValue::Priority(TicketPriority::Low))
    );
}

#[tokio::test]
async fn test_missing_token_fails_every_change_with_auth() {
    let store = store(queue());
    let empty = std::sync::Arc::new(ticketdesk::MemoryCredentials::new());
    let editor = BulkEditor::new(store.clone(), empty, queue());
    editor.select_all(["1", "2", "3"]);
    editor
        .set_pending_value_for_selection(FieldValue::Status(TicketStatus::Closed))
        .unwrap();

    let report = editor.commit().await.unwrap();
    assert_eq!(report.systemic_failure(), Some(ErrorKind::Auth));
    assert!(
        report
            .failed
            .iter()
            .all(|f| matches!(f.error, DeskError::Auth(_)))
    );
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn test_refetch_after_commit_reconciles() {
    let store = store(queue());
    let editor = BulkEditor::new(store.clone(), credentials(), queue());
    editor
        .set_pending_value("3", FieldValue::Priority(TicketPriority::High))
        .unwrap();
    editor.commit().await.unwrap();

    let fresh = store.fetch_all(&*credentials()).await.unwrap();
    editor.replace_tickets(fresh);
    assert!(!editor.has_pending_changes());
    assert_eq!(editor.ticket("3").unwrap().priority, TicketPriority::High);

    // A ticket that disappears upstream takes its selection with it.
    editor.select("4").unwrap();
    editor.replace_tickets(vec![TicketBuilder::new("1").build()]);
    assert!(editor.selection().is_empty());
}
