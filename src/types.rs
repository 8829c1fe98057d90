use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::DeskError;

/// Unique, immutable ticket identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for TicketId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TicketId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for TicketId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for TicketId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TicketId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum TicketPriority {
    Low,
    #[default]
    Medium,
    High,
    #[serde(alias = "Urgent")]
    Critical,
}

impl TicketPriority {
    pub const ALL: [TicketPriority; 4] = [
        TicketPriority::Low,
        TicketPriority::Medium,
        TicketPriority::High,
        TicketPriority::Critical,
    ];

    /// Severity rank: Low=1 through Critical=4.
    pub fn rank(&self) -> u8 {
        match self {
            TicketPriority::Low => 1,
            TicketPriority::Medium => 2,
            TicketPriority::High => 3,
            TicketPriority::Critical => 4,
        }
    }
}

enum_display_fromstr!(TicketPriority, DeskError::InvalidPriority, {
    Low => "Low",
    Medium => "Medium" | "normal",
    High => "High",
    Critical => "Critical" | "urgent",
});

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum TicketStatus {
    #[default]
    Open,
    #[serde(rename = "In Progress", alias = "in_progress", alias = "InProgress")]
    InProgress,
    Pending,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 5] = [
        TicketStatus::Open,
        TicketStatus::InProgress,
        TicketStatus::Pending,
        TicketStatus::Resolved,
        TicketStatus::Closed,
    ];

    /// Resolved or Closed: the ticket no longer counts against its SLA.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Resolved | TicketStatus::Closed)
    }
}

enum_display_fromstr!(TicketStatus, DeskError::InvalidStatus, {
    Open => "Open" | "new",
    InProgress => "In Progress" | "in_progress" | "in-progress" | "inprogress",
    Pending => "Pending" | "on hold" | "on_hold",
    Resolved => "Resolved",
    Closed => "Closed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Availability {
    #[default]
    Available,
    Busy,
    Away,
}

enum_display_fromstr!(Availability, DeskError::Validation, {
    Available => "Available" | "online",
    Busy => "Busy",
    Away => "Away" | "offline",
});

/// Reference to the agent a ticket is assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub availability: Availability,
}

impl AgentRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            department: String::new(),
            availability: Availability::default(),
        }
    }
}

/// Fields a ticket may be edited on after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TicketField {
    Priority,
    Status,
    AssignedTo,
}

impl fmt::Display for TicketField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TicketField::Priority => "priority",
            TicketField::Status => "status",
            TicketField::AssignedTo => "assignedTo",
        };
        f.pad(name)
    }
}

/// A value for one mutable field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Priority(TicketPriority),
    Status(TicketStatus),
    AssignedTo(Option<AgentRef>),
}

impl FieldValue {
    pub fn field(&self) -> TicketField {
        match self {
            FieldValue::Priority(_) => TicketField::Priority,
            FieldValue::Status(_) => TicketField::Status,
            FieldValue::AssignedTo(_) => TicketField::AssignedTo,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Priority(p) => write!(f, "{p}"),
            FieldValue::Status(s) => write!(f, "{s}"),
            FieldValue::AssignedTo(Some(agent)) => write!(f, "{}", agent.name),
            FieldValue::AssignedTo(None) => write!(f, "Unassigned"),
        }
    }
}

/// Canonical ticket record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: TicketId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<AgentRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub sla: SignedDuration,
}

impl Ticket {
    /// Current committed value of a mutable field.
    pub fn field_value(&self, field: TicketField) -> FieldValue {
        match field {
            TicketField::Priority => FieldValue::Priority(self.priority),
            TicketField::Status => FieldValue::Status(self.status),
            TicketField::AssignedTo => FieldValue::AssignedTo(self.assigned_to.clone()),
        }
    }

    /// Write a field value. Status and priority changes stamp `updated_at`.
    pub fn apply(&mut self, value: FieldValue, now: Timestamp) {
        match value {
            FieldValue::Priority(p) => {
                if self.priority != p {
                    self.priority = p;
                    self.updated_at = Some(now);
                }
            }
            FieldValue::Status(s) => {
                if self.status != s {
                    self.status = s;
                    self.updated_at = Some(now);
                }
            }
            FieldValue::AssignedTo(agent) => self.assigned_to = agent,
        }
    }

    /// Instant the ticket was resolved, if it is resolved and the service
    /// told us when.
    pub fn resolution_instant(&self) -> Option<Timestamp> {
        if self.status != TicketStatus::Resolved {
            return None;
        }
        self.resolved_at.or(self.updated_at)
    }

    /// Time from creation to resolution. `None` when unresolved, when no
    /// resolution instant is known, or when the timestamps are inverted.
    pub fn resolution_duration(&self) -> Option<SignedDuration> {
        let resolved = self.resolution_instant()?;
        let duration = resolved.duration_since(self.created_at);
        if duration.is_negative() {
            None
        } else {
            Some(duration)
        }
    }

    /// Instant the SLA window closes.
    pub fn sla_deadline(&self) -> Option<Timestamp> {
        self.created_at.checked_add(self.sla).ok()
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_priority_rank_is_severity_order() {
        let ranks: Vec<u8> = TicketPriority::ALL.iter().map(|p| p.rank()).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
        assert!(TicketPriority::Critical > TicketPriority::High);
        assert!(TicketPriority::Medium > TicketPriority::Low);
    }

    #[test]
    fn test_priority_parse_legacy_spellings() {
        assert_eq!(
            "urgent".parse::<TicketPriority>().unwrap(),
            TicketPriority::Critical
        );
        assert_eq!("HIGH".parse::<TicketPriority>().unwrap(), TicketPriority::High);
        assert!("p1".parse::<TicketPriority>().is_err());
    }

    #[test]
    fn test_status_parse_and_display() {
        for raw in ["In Progress", "in_progress", "in-progress", "INPROGRESS"] {
            assert_eq!(
                raw.parse::<TicketStatus>().unwrap(),
                TicketStatus::InProgress,
                "failed on {raw}"
            );
        }
        assert_eq!(TicketStatus::InProgress.to_string(), "In Progress");
        assert!(matches!(
            "archived".parse::<TicketStatus>(),
            Err(DeskError::InvalidStatus(_))
        ));
    }

    #[test]
    fn test_status_serde_uses_labels() {
        let json = serde_json::to_string(&TicketStatus::InProgress).unwrap();
        assert_eq!(json, "\"In Progress\"");
        let parsed: TicketStatus = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(parsed, TicketStatus::InProgress);
    }

    #[test]
    fn test_apply_stamps_updated_at_on_status_and_priority() {
        let now = ts("2024-03-02T10:00:00Z");
        let mut t = ticket("T-1", TicketPriority::Low, TicketStatus::Open);

        t.apply(FieldValue::AssignedTo(Some(AgentRef::new("a1", "Dana"))), now);
        assert_eq!(t.updated_at, None);

        t.apply(FieldValue::Priority(TicketPriority::High), now);
        assert_eq!(t.priority, TicketPriority::High);
        assert_eq!(t.updated_at, Some(now));
    }

    #[test]
    fn test_apply_same_value_leaves_updated_at() {
        let now = ts("2024-03-02T10:00:00Z");
        let mut t = ticket("T-1", TicketPriority::Low, TicketStatus::Open);
        t.apply(FieldValue::Status(TicketStatus::Open), now);
        assert_eq!(t.updated_at, None);
    }

    #[test]
    fn test_resolution_prefers_resolved_at() {
        let mut t = resolved_after("T-1", 10, 24);
        assert_eq!(t.resolution_duration(), Some(SignedDuration::from_hours(10)));

        t.resolved_at = Some(ts("2024-03-01T11:00:00Z"));
        assert_eq!(t.resolution_duration(), Some(SignedDuration::from_hours(2)));
    }

    #[test]
    fn test_resolution_unknown_without_timestamps() {
        let t = ticket("T-1", TicketPriority::Low, TicketStatus::Resolved);
        assert_eq!(t.resolution_instant(), None);
        assert_eq!(t.resolution_duration(), None);

        let mut open = resolved_after("T-2", 3, 24);
        open.status = TicketStatus::Open;
        assert_eq!(open.resolution_duration(), None);
    }

    #[test]
    fn test_inverted_timestamps_are_unmeasurable() {
        let mut t = ticket("T-1", TicketPriority::Low, TicketStatus::Resolved);
        t.updated_at = Some(ts("2024-02-01T00:00:00Z"));
        assert_eq!(t.resolution_duration(), None);
    }

    #[test]
    fn test_field_value_display() {
        assert_eq!(FieldValue::Priority(TicketPriority::High).to_string(), "High");
        assert_eq!(FieldValue::AssignedTo(None).to_string(), "Unassigned");
        assert_eq!(
            FieldValue::Status(TicketStatus::Resolved).field(),
            TicketField::Status
        );
    }
}
