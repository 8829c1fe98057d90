//! Operational metrics derived from a ticket collection.
//!
//! Every function here is pure and total: no I/O, no panics, no NaN. Empty or
//! unmeasurable inputs produce zero (for rates) or `None` (for durations).
//!
//! A ticket's resolution instant is its `resolved_at`, falling back to
//! `updated_at`, and only for tickets whose status is Resolved. Creation time
//! is never used as a stand-in: Resolved tickets with neither timestamp are
//! counted in [`MetricsSummary::unmeasurable_resolved`] instead.

use std::collections::BTreeMap;

use jiff::{SignedDuration, Timestamp};
use serde::Serialize;

use crate::types::{Ticket, TicketPriority, TicketStatus};

/// Label used for tickets with no assignee in workload counts.
pub const UNASSIGNED: &str = "Unassigned";

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Ticket count per status. Every status is present, zero when absent.
pub fn counts_by_status(tickets: &[Ticket]) -> BTreeMap<TicketStatus, usize> {
    let mut counts: BTreeMap<TicketStatus, usize> =
        TicketStatus::ALL.iter().map(|s| (*s, 0)).collect();
    for ticket in tickets {
        *counts.entry(ticket.status).or_default() += 1;
    }
    counts
}

/// Ticket count per category, for categories that occur.
pub fn counts_by_category(tickets: &[Ticket]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for ticket in tickets {
        *counts.entry(ticket.category.clone()).or_default() += 1;
    }
    counts
}

/// Ticket count per priority. Every priority is present, zero when absent.
pub fn counts_by_priority(tickets: &[Ticket]) -> BTreeMap<TicketPriority, usize> {
    let mut counts: BTreeMap<TicketPriority, usize> =
        TicketPriority::ALL.iter().map(|p| (*p, 0)).collect();
    for ticket in tickets {
        *counts.entry(ticket.priority).or_default() += 1;
    }
    counts
}

/// Ticket count per assigned agent name.
pub fn counts_by_assignee(tickets: &[Ticket]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for ticket in tickets {
        let name = ticket
            .assigned_to
            .as_ref()
            .map_or(UNASSIGNED, |agent| agent.name.as_str());
        *counts.entry(name.to_string()).or_default() += 1;
    }
    counts
}

/// Fraction of tickets that are Resolved.
pub fn resolution_rate(tickets: &[Ticket]) -> f64 {
    let resolved = tickets
        .iter()
        .filter(|t| t.status == TicketStatus::Resolved)
        .count();
    ratio(resolved, tickets.len())
}

/// Mean creation-to-resolution time over measurable Resolved tickets.
pub fn average_resolution_time(tickets: &[Ticket]) -> Option<SignedDuration> {
    let durations: Vec<SignedDuration> = tickets
        .iter()
        .filter_map(Ticket::resolution_duration)
        .collect();
    if durations.is_empty() {
        return None;
    }
    let total_secs: f64 = durations.iter().map(|d| d.as_secs_f64()).sum();
    SignedDuration::try_from_secs_f64(total_secs / durations.len() as f64).ok()
}

/// Human-readable resolution time for dashboard cards.
pub fn format_resolution_time(duration: Option<SignedDuration>) -> String {
    match duration {
        None => "N/A".to_string(),
        Some(d) => {
            let hours = d.as_secs_f64() / 3600.0;
            if hours < 1.0 {
                format!("{:.0} min", d.as_secs_f64() / 60.0)
            } else if hours < 48.0 {
                format!("{hours:.1} hours")
            } else {
                format!("{:.1} days", hours / 24.0)
            }
        }
    }
}

/// Fraction of measurable Resolved tickets resolved within their SLA.
///
/// Tickets that are not resolved yet are neither compliant nor breaching and
/// are left out of both counts.
pub fn sla_compliance(tickets: &[Ticket]) -> f64 {
    let mut judged = 0;
    let mut compliant = 0;
    for ticket in tickets {
        if let Some(duration) = ticket.resolution_duration() {
            judged += 1;
            if duration <= ticket.sla {
                compliant += 1;
            }
        }
    }
    ratio(compliant, judged)
}

/// Unresolved tickets whose SLA window closed before `now`.
pub fn overdue_count(tickets: &[Ticket], now: Timestamp) -> usize {
    tickets
        .iter()
        .filter(|t| !t.status.is_terminal())
        .filter(|t| t.sla_deadline().is_some_and(|deadline| deadline < now))
        .count()
}

/// Snapshot of every dashboard metric for one ticket collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSummary {
    pub total: usize,
    pub by_status: BTreeMap<TicketStatus, usize>,
    pub by_category: BTreeMap<String, usize>,
    pub by_priority: BTreeMap<TicketPriority, usize>,
    pub by_assignee: BTreeMap<String, usize>,
    pub resolution_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_resolution_time: Option<SignedDuration>,
    pub sla_compliance: f64,
    pub overdue: usize,
    /// Resolved tickets with no usable resolution timestamp.
    pub unmeasurable_resolved: usize,
}

impl MetricsSummary {
    pub fn compute(tickets: &[Ticket], now: Timestamp) -> Self {
        let unmeasurable_resolved = tickets
            .iter()
            .filter(|t| t.status == TicketStatus::Resolved && t.resolution_duration().is_none())
            .count();

        Self {
            total: tickets.len(),
            by_status: counts_by_status(tickets),
            by_category: counts_by_category(tickets),
            by_priority: counts_by_priority(tickets),
            by_assignee: counts_by_assignee(tickets),
            resolution_rate: resolution_rate(tickets),
            average_resolution_time: average_resolution_time(tickets),
            sla_compliance: sla_compliance(tickets),
            overdue: overdue_count(tickets, now),
            unmeasurable_resolved,
        }
    }

    pub fn average_resolution_label(&self) -> String {
        format_resolution_time(self.average_resolution_time)
    }
}
