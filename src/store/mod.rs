//! Ticket service access.
//!
//! [`TicketStore`] is the seam between the ticket core and the remote
//! service: one bulk read and one single-field write. [`HttpTicketStore`] is
//! the REST implementation. It keeps no state between calls beyond its HTTP
//! client and settings.
//!
//! # Security Note - Logging
//!
//! The Authorization header value is only ever handled through
//! [`AuthHeader`] and [`RedactedHeader`], both of which redact themselves when
//! formatted. Do not enable `reqwest=debug` logging in production.

pub mod credentials;
pub mod memory;
pub mod normalize;

use std::fmt;
use std::future::Future;

use reqwest::header;
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value, json};
use url::Url;

use crate::config::{Config, SlaPolicy};
use crate::error::{DeskError, Result};
use crate::types::{FieldValue, Ticket, TicketId};

pub use credentials::{
    AuthHeader, CredentialResolver, CredentialSource, EnvCredentials, MemoryCredentials,
    normalize_bearer,
};
pub use memory::MemoryTicketStore;
pub use normalize::{ResolutionRecord, normalize_resolution_times, normalize_tickets};

/// Common interface for ticket services
pub trait TicketStore: Send + Sync {
    /// Fetch every ticket visible to the principal.
    fn fetch_all(
        &self,
        credentials: &dyn CredentialSource,
    ) -> impl Future<Output = Result<Vec<Ticket>>> + Send;

    /// Persist a new value for one mutable field of one ticket.
    fn persist_field(
        &self,
        ticket_id: &TicketId,
        value: &FieldValue,
        credentials: &dyn CredentialSource,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Fetch known resolution instants.
    fn fetch_resolution_times(
        &self,
        credentials: &dyn CredentialSource,
    ) -> impl Future<Output = Result<Vec<ResolutionRecord>>> + Send;
}

/// Wrapper for the Authorization header that redacts the value when formatted.
struct RedactedHeader<'a> {
    auth: &'a AuthHeader,
}

impl<'a> RedactedHeader<'a> {
    fn new(auth: &'a AuthHeader) -> Self {
        Self { auth }
    }

    fn as_header_value(&self) -> Result<header::HeaderValue> {
        let mut value = header::HeaderValue::from_str(self.auth.expose())
            .map_err(|_| DeskError::Auth("access token contains invalid characters".into()))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Display for RedactedHeader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl fmt::Debug for RedactedHeader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedactedHeader")
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// Payload for a single-field update.
pub fn field_payload(ticket_id: &TicketId, value: &FieldValue) -> Value {
    let mut body = Map::new();
    body.insert("ticketId".to_string(), json!(ticket_id.as_str()));
    let (key, field_value) = match value {
        FieldValue::Priority(p) => ("priority", json!(p.to_string())),
        FieldValue::Status(s) => ("status", json!(s.to_string())),
        FieldValue::AssignedTo(agent) => {
            ("assignedTo", json!(agent.as_ref().map(|a| a.id.as_str())))
        }
    };
    body.insert(key.to_string(), field_value);
    Value::Object(body)
}

/// Map a non-success status to the error taxonomy.
fn status_error(status: StatusCode, body: &str) -> DeskError {
    let detail = server_message(body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string()
    });
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            DeskError::Auth(format!("HTTP {}: {}", status.as_u16(), detail))
        }
        _ => DeskError::Network(format!("HTTP {}: {}", status.as_u16(), detail)),
    }
}

fn server_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .or_else(|| value.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Interpret a write response: `{success: false, message}` is a rejection,
/// anything else (an acknowledgement or the updated record) is success.
fn check_write_ack(body: &str) -> Result<()> {
    if body.trim().is_empty() {
        return Ok(());
    }
    let value: Value = serde_json::from_str(body)
        .map_err(|e| DeskError::Parse(format!("update response: {e}")))?;
    if value.get("success").and_then(Value::as_bool) == Some(false) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("the service did not accept the change");
        return Err(DeskError::Rejected(message.to_string()));
    }
    Ok(())
}

/// REST ticket service client
pub struct HttpTicketStore {
    client: Client,
    base_url: Url,
    resolver: CredentialResolver,
    sla_policy: SlaPolicy,
}

impl HttpTicketStore {
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| DeskError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url()?,
            resolver: CredentialResolver::from_config(&config.credentials),
            sla_policy: config.sla.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| DeskError::Config(format!("invalid endpoint '{path}': {e}")))
    }

    async fn get_json(&self, path: &str, credentials: &dyn CredentialSource) -> Result<Value> {
        let auth = self.resolver.resolve(credentials)?;
        let url = self.endpoint(path)?;
        let auth_header = RedactedHeader::new(&auth);
        tracing::debug!("GET {url} (authorization: {auth_header})");

        let response = self
            .client
            .get(url)
            .header(header::AUTHORIZATION, auth_header.as_header_value()?)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::warn!("unparseable response from {path}: {e}");
            DeskError::Parse(format!("{path}: {e}"))
        })
    }
}

impl TicketStore for HttpTicketStore {
    async fn fetch_all(&self, credentials: &dyn CredentialSource) -> Result<Vec<Ticket>> {
        let body = self.get_json("tickets", credentials).await?;
        let tickets = normalize_tickets(body, &self.sla_policy).inspect_err(|e| {
            tracing::warn!("failed to normalize ticket list: {e}");
        })?;
        tracing::debug!("fetched {} tickets", tickets.len());
        Ok(tickets)
    }

    async fn persist_field(
        &self,
        ticket_id: &TicketId,
        value: &FieldValue,
        credentials: &dyn CredentialSource,
    ) -> Result<()> {
        let auth = self.resolver.resolve(credentials)?;
        let mut url = self.endpoint("tickets")?;
        url.path_segments_mut()
            .map_err(|_| DeskError::Config("api.base_url cannot hold a path".to_string()))?
            .push(ticket_id);
        let auth_header = RedactedHeader::new(&auth);
        tracing::debug!(
            "PATCH {url} {}={value} (authorization: {auth_header})",
            value.field()
        );

        let response = self
            .client
            .patch(url)
            .header(header::AUTHORIZATION, auth_header.as_header_value()?)
            .json(&field_payload(ticket_id, value))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        check_write_ack(&body)
    }

    async fn fetch_resolution_times(
        &self,
        credentials: &dyn CredentialSource,
    ) -> Result<Vec<ResolutionRecord>> {
        let body = self
            .get_json("tickets/resolution-times", credentials)
            .await?;
        normalize_resolution_times(body)
    }
}
