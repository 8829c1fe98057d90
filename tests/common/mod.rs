//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use jiff::{SignedDuration, Timestamp};
use ticketdesk::{
    AgentRef, MemoryCredentials, MemoryTicketStore, Ticket, TicketId, TicketPriority,
    TicketStatus,
};

pub fn ts(s: &str) -> Timestamp {
    s.parse().expect("test timestamp should be valid")
}

/// Builder for creating test tickets
pub struct TicketBuilder {
    ticket: Ticket,
}

impl TicketBuilder {
    /// Create a new ticket builder with the given ID
    pub fn new(id: &str) -> Self {
        Self {
            ticket: Ticket {
                id: TicketId::new(id),
                title: format!("Ticket {id}"),
                description: String::new(),
                category: "Technical".to_string(),
                priority: TicketPriority::Medium,
                status: TicketStatus::Open,
                created_at: ts("2024-03-01T09:00:00Z"),
                updated_at: None,
                resolved_at: None,
                assigned_to: None,
                tags: Vec::new(),
                sla: SignedDuration::from_hours(24),
            },
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.ticket.title = title.to_string();
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.ticket.category = category.to_string();
        self
    }

    pub fn priority(mut self, priority: TicketPriority) -> Self {
        self.ticket.priority = priority;
        self
    }

    pub fn status(mut self, status: TicketStatus) -> Self {
        self.ticket.status = status;
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.ticket.tags.push(tag.to_string());
        self
    }

    pub fn assigned(mut self, agent: &str) -> Self {
        self.ticket.assigned_to = Some(AgentRef::new(format!("agent-{agent}"), agent));
        self
    }

    pub fn sla_hours(mut self, hours: i64) -> Self {
        self.ticket.sla = SignedDuration::from_hours(hours);
        self
    }

    /// Mark resolved `hours` after creation.
    pub fn resolved_after(mut self, hours: i64) -> Self {
        self.ticket.status = TicketStatus::Resolved;
        self.ticket.resolved_at = Some(
            self.ticket
                .created_at
                .checked_add(SignedDuration::from_hours(hours))
                .expect("test timestamp in range"),
        );
        self
    }

    pub fn build(self) -> Ticket {
        self.ticket
    }
}

pub fn credentials() -> Arc<MemoryCredentials> {
    Arc::new(MemoryCredentials::new().with("auth_token", "Bearer abc123"))
}

pub fn store(tickets: Vec<Ticket>) -> Arc<MemoryTicketStore> {
    Arc::new(MemoryTicketStore::new(tickets))
}

/// A small mixed queue used across tests.
pub fn queue() -> Vec<Ticket> {
    vec![
        TicketBuilder::new("1")
            .title("Printer jammed")
            .priority(TicketPriority::Low)
            .tag("hardware")
            .build(),
        TicketBuilder::new("2")
            .title("VPN drops every hour")
            .priority(TicketPriority::Critical)
            .status(TicketStatus::InProgress)
            .tag("network")
            .assigned("Dana")
            .build(),
        TicketBuilder::new("3")
            .title("Refund request")
            .category("Billing")
            .priority(TicketPriority::Medium)
            .build(),
        TicketBuilder::new("4")
            .title("Password reset")
            .priority(TicketPriority::High)
            .sla_hours(8)
            .resolved_after(3)
            .build(),
    ]
}
