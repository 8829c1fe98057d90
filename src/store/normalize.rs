//! Normalization of ticket service payloads into canonical [`Ticket`]s.
//!
//! The service has shipped several record shapes over time: `id` vs
//! `ticketId`, camelCase vs snake_case timestamps, assignees as objects or
//! bare names, SLAs as hours or duration strings, and bodies that are either
//! a bare array or wrapped in an envelope.
//!
//! A record may carry several spellings of the same field at once (a
//! document store's `_id` next to the service's `ticketId`). Each field is
//! read from the first key present in a fixed precedence list.

use jiff::civil;
use jiff::tz::TimeZone;
use jiff::{SignedDuration, Timestamp};
use serde_json::{Map, Value};

use crate::config::SlaPolicy;
use crate::error::{DeskError, Result};
use crate::types::{AgentRef, Ticket, TicketId, TicketPriority, TicketStatus};

const ENVELOPE_KEYS: &[&str] = &["tickets", "data", "items", "results"];

const ID_KEYS: &[&str] = &["id", "ticketId", "ticket_id", "_id"];
const TITLE_KEYS: &[&str] = &["title", "subject"];
const CREATED_KEYS: &[&str] = &["createdAt", "created_at"];
const UPDATED_KEYS: &[&str] = &["updatedAt", "updated_at"];
const RESOLVED_KEYS: &[&str] = &["resolvedAt", "resolved_at"];
const ASSIGNEE_KEYS: &[&str] = &["assignedTo", "assigned_to", "assignee"];
const SLA_KEYS: &[&str] = &["sla", "slaHours", "sla_hours"];

// The resolution feed names the ticket first and the record id last, and
// only falls back to `updatedAt` when no explicit resolution instant exists.
const RESOLUTION_ID_KEYS: &[&str] = &["ticketId", "ticket_id", "id", "_id"];
const RESOLUTION_AT_KEYS: &[&str] = &[
    "resolvedAt",
    "resolved_at",
    "updatedAt",
    "updated_at",
];

/// A resolution instant reported by `/tickets/resolution-times`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionRecord {
    pub ticket_id: TicketId,
    pub resolved_at: Timestamp,
}

/// One JSON record, read by key precedence.
struct Record<'a>(&'a Map<String, Value>);

impl<'a> Record<'a> {
    /// First non-null value among `keys`.
    fn first(&self, keys: &[&str]) -> Option<&'a Value> {
        keys.iter()
            .filter_map(|key| self.0.get(*key))
            .find(|value| !value.is_null())
    }

    fn text(&self, keys: &[&str]) -> Option<&'a str> {
        keys.iter()
            .filter_map(|key| self.0.get(*key).and_then(Value::as_str))
            .next()
    }

    fn id(&self, keys: &[&str]) -> Option<TicketId> {
        keys.iter()
            .filter_map(|key| self.0.get(*key))
            .find_map(id_from_value)
    }

    fn timestamp(&self, keys: &[&str]) -> Option<Timestamp> {
        keys.iter()
            .filter_map(|key| self.0.get(*key).and_then(Value::as_str))
            .find_map(parse_timestamp)
    }
}

/// Parse a timestamp of any precision the service emits.
///
/// Accepts RFC 3339 instants, naive date-times (taken as UTC) and bare dates
/// (UTC midnight).
pub fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = raw.parse::<Timestamp>() {
        return Some(ts);
    }
    if let Ok(dt) = raw.parse::<civil::DateTime>() {
        return dt.to_zoned(TimeZone::UTC).ok().map(|z| z.timestamp());
    }
    if let Ok(date) = raw.parse::<civil::Date>() {
        return date
            .to_zoned(TimeZone::UTC)
            .ok()
            .map(|z| z.timestamp());
    }
    None
}

/// Parse an SLA window: a number of hours, or a duration string such as
/// `"4h"` or `"PT4H"`.
pub fn parse_sla(value: &Value) -> Option<SignedDuration> {
    match value {
        Value::Number(n) => {
            let hours = n.as_f64()?;
            if !hours.is_finite() || hours < 0.0 {
                return None;
            }
            SignedDuration::try_from_secs_f64(hours * 3600.0).ok()
        }
        Value::String(s) => {
            let s = s.trim();
            if let Ok(hours) = s.parse::<f64>() {
                return parse_sla(&Value::from(hours));
            }
            s.parse::<SignedDuration>()
                .ok()
                .filter(|d| !d.is_negative())
        }
        _ => None,
    }
}

fn id_from_value(value: &Value) -> Option<TicketId> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(TicketId::new(s.trim())),
        Value::Number(n) => Some(TicketId::new(n.to_string())),
        _ => None,
    }
}

fn agent_from_value(value: &Value) -> Option<AgentRef> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(AgentRef::new(s.trim(), s.trim())),
        Value::Object(map) => {
            let str_field = |names: &[&str]| {
                names
                    .iter()
                    .find_map(|n| map.get(*n).and_then(Value::as_str))
                    .map(str::to_string)
            };
            let id = str_field(&["id", "_id", "agentId"])
                .or_else(|| map.get("id").and_then(Value::as_u64).map(|n| n.to_string()));
            let name = str_field(&["name", "fullName", "username"]);
            let (id, name) = match (id, name) {
                (Some(id), Some(name)) => (id, name),
                (Some(id), None) => (id.clone(), id),
                (None, Some(name)) => (name.clone(), name),
                (None, None) => return None,
            };
            Some(AgentRef {
                id,
                name,
                department: str_field(&["department"]).unwrap_or_default(),
                availability: str_field(&["availability", "status"])
                    .and_then(|a| a.parse().ok())
                    .unwrap_or_default(),
            })
        }
        _ => None,
    }
}

fn missing(label: &str, field: &str) -> DeskError {
    DeskError::Parse(format!("{label}: missing required field '{field}'"))
}

fn normalize_record(item: &Value, index: usize, sla_policy: &SlaPolicy) -> Result<Ticket> {
    let map = item.as_object().ok_or_else(|| {
        DeskError::Parse(format!(
            "record {index}: expected an object, got {}",
            json_type_name(item)
        ))
    })?;
    let record = Record(map);

    let id = record.id(ID_KEYS);
    let label = match &id {
        Some(id) => format!("ticket '{id}'"),
        None => format!("record {index}"),
    };
    let id = id.ok_or_else(|| missing(&label, "id"))?;

    let title = record
        .text(TITLE_KEYS)
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| missing(&label, "title"))?
        .to_string();
    let category = record
        .text(&["category"])
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| missing(&label, "category"))?
        .to_string();

    let priority: TicketPriority = record
        .text(&["priority"])
        .ok_or_else(|| missing(&label, "priority"))?
        .parse()
        .map_err(|e| DeskError::Parse(format!("{label}: {e}")))?;
    let status: TicketStatus = record
        .text(&["status"])
        .ok_or_else(|| missing(&label, "status"))?
        .parse()
        .map_err(|e| DeskError::Parse(format!("{label}: {e}")))?;

    let created_raw = record
        .text(CREATED_KEYS)
        .ok_or_else(|| missing(&label, "createdAt"))?;
    let created_at = parse_timestamp(created_raw).ok_or_else(|| {
        DeskError::Parse(format!("{label}: invalid createdAt '{created_raw}'"))
    })?;

    // Optional timestamps that fail to parse are treated as absent.
    let updated_at = record.timestamp(UPDATED_KEYS);
    let resolved_at = record.timestamp(RESOLVED_KEYS);

    let sla = record
        .first(SLA_KEYS)
        .and_then(parse_sla)
        .unwrap_or_else(|| sla_policy.window_for(priority));

    let tags = match record.first(&["tags"]) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };

    Ok(Ticket {
        id,
        title,
        description: record.text(&["description"]).unwrap_or_default().to_string(),
        category,
        priority,
        status,
        created_at,
        updated_at,
        resolved_at,
        assigned_to: record.first(ASSIGNEE_KEYS).and_then(agent_from_value),
        tags,
        sla,
    })
}

/// Unwrap `{tickets: [...]}`-style envelopes down to the record array.
fn unwrap_envelope(body: Value) -> Result<Vec<Value>> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => {
            for key in ENVELOPE_KEYS {
                if let Some(Value::Array(items)) = map.remove(*key) {
                    return Ok(items);
                }
            }
            Err(DeskError::Parse(
                "expected an array of records or an envelope with one".to_string(),
            ))
        }
        other => Err(DeskError::Parse(format!(
            "expected an array of records, got {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Normalize a `/tickets` response body. Any unusable record fails the
/// whole response.
pub fn normalize_tickets(body: Value, sla_policy: &SlaPolicy) -> Result<Vec<Ticket>> {
    unwrap_envelope(body)?
        .iter()
        .enumerate()
        .map(|(index, item)| normalize_record(item, index, sla_policy))
        .collect()
}

fn resolution_record(item: &Value) -> Option<ResolutionRecord> {
    let record = Record(item.as_object()?);
    Some(ResolutionRecord {
        ticket_id: record.id(RESOLUTION_ID_KEYS)?,
        resolved_at: record.timestamp(RESOLUTION_AT_KEYS)?,
    })
}

/// Normalize a `/tickets/resolution-times` response body. Entries without a
/// ticket id or a parseable instant are skipped.
pub fn normalize_resolution_times(body: Value) -> Result<Vec<ResolutionRecord>> {
    let items = unwrap_envelope(body)?;
    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match resolution_record(item) {
            Some(record) => records.push(record),
            None => tracing::warn!("skipping unusable resolution entry {index}: {item}"),
        }
    }
    Ok(records)
}
