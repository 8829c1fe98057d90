#[path = "common/mod.rs"]
mod common;

use std::time::Duration;

use common::{TicketBuilder, credentials, queue, store, ts};
use ticketdesk::query::apply;
use ticketdesk::{
    Choice, Dashboard, ErrorKind, FilterSpec, RefreshOutcome, SortDirection, SortField,
    TicketPriority, TicketQueryBuilder, TicketStatus, ViewLifetime, sort_tickets,
};

// ============================================================================
// Dashboard loading and list views
// ============================================================================

#[tokio::test]
async fn test_dashboard_summary_from_store() {
    let store = store(queue());
    store.record_resolution("4", ts("2024-03-01T11:00:00Z"));
    let dashboard = Dashboard::new(store, credentials());
    let view = ViewLifetime::new();

    assert_eq!(
        dashboard.refresh(&view.handle()).await.unwrap(),
        RefreshOutcome::Applied
    );
    let snapshot = dashboard.snapshot().unwrap();
    let summary = &snapshot.summary;

    assert_eq!(summary.total, 4);
    assert_eq!(summary.resolution_rate, 0.25);
    assert_eq!(summary.sla_compliance, 1.0);
    assert_eq!(summary.by_category["Billing"], 1);
    assert_eq!(summary.by_priority[&TicketPriority::Critical], 1);
    assert_eq!(summary.by_assignee["Dana"], 1);
    // Resolution feed wins over the record's own timestamp: 2h, not 3h
    assert_eq!(summary.average_resolution_label(), "2.0 hours");
}

#[tokio::test]
async fn test_closed_view_never_receives_results() {
    let store = std::sync::Arc::new(
        ticketdesk::MemoryTicketStore::new(queue()).with_latency(Duration::from_millis(40)),
    );
    let dashboard = Dashboard::new(store, credentials());
    let view = ViewLifetime::new();
    let handle = view.handle();

    let refresh = dashboard.refresh(&handle);
    let close = async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        drop(view);
    };
    let (outcome, ()) = tokio::join!(refresh, close);

    assert_eq!(outcome.unwrap(), RefreshOutcome::Discarded);
    assert!(dashboard.snapshot().is_none());
}

#[tokio::test]
async fn test_read_failure_surfaces_error_kind() {
    let store = store(queue());
    store.fail_reads(Some(ErrorKind::Network));
    let dashboard = Dashboard::new(store, credentials());
    let view = ViewLifetime::new();

    let err = dashboard.refresh(&view.handle()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(err.user_message(), "Could not reach the ticket service. Please try again.");
}

#[test]
fn test_filter_then_sort_list_view() {
    let tickets = queue();
    let spec = FilterSpec::new().category("Technical");
    let visible = apply(&tickets, &spec);
    let sorted = sort_tickets(&visible, SortField::Priority, SortDirection::Desc);

    let ids: Vec<&str> = sorted.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["2", "4", "1"]);
}

#[test]
fn test_dropdown_choices_parse() {
    let status: Choice<TicketStatus> = "all".parse().unwrap();
    assert_eq!(status, Choice::All);
    let status: Choice<TicketStatus> = "in progress".parse().unwrap();
    assert_eq!(status, Choice::Only(TicketStatus::InProgress));
}

#[test]
fn test_query_builder_limit() {
    let mut tickets = queue();
    tickets.push(
        TicketBuilder::new("5")
            .priority(TicketPriority::Critical)
            .tag("network")
            .build(),
    );

    let query = TicketQueryBuilder::new()
        .with_spec(&FilterSpec::new().tag("network"))
        .with_sort(SortField::Id, SortDirection::Desc)
        .with_limit(1)
        .build();
    let result = query.apply(&tickets);
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].id.as_str(), "5");
}
