//! In-process [`TicketStore`] for offline use and tests.
//!
//! Behaves like the HTTP store from the caller's side: every call resolves
//! credentials first, writes are applied to the stored tickets, and failures
//! can be injected per ticket or for every read.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use jiff::Timestamp;
use parking_lot::Mutex;

use crate::error::{DeskError, ErrorKind, Result};
use crate::store::normalize::ResolutionRecord;
use crate::store::{CredentialResolver, CredentialSource, TicketStore};
use crate::types::{FieldValue, Ticket, TicketId};

fn injected(kind: ErrorKind, context: &str) -> DeskError {
    let message = format!("injected failure for {context}");
    match kind {
        ErrorKind::Auth => DeskError::Auth(message),
        ErrorKind::Network => DeskError::Network(message),
        ErrorKind::Parse => DeskError::Parse(message),
        ErrorKind::Validation => DeskError::Validation(message),
        ErrorKind::Rejected => DeskError::Rejected(message),
        ErrorKind::Busy => DeskError::CommitInProgress,
        ErrorKind::Config => DeskError::Config(message),
    }
}

/// Counts a call as in flight until dropped, including when the caller
/// abandons the future mid-call.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
pub struct MemoryTicketStore {
    resolver: CredentialResolver,
    tickets: Mutex<Vec<Ticket>>,
    resolution_times: Mutex<Vec<ResolutionRecord>>,
    write_failures: Mutex<HashMap<TicketId, ErrorKind>>,
    read_failure: Mutex<Option<ErrorKind>>,
    resolution_failure: Mutex<Option<ErrorKind>>,
    writes: Mutex<Vec<(TicketId, FieldValue)>>,
    latency: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MemoryTicketStore {
    pub fn new(tickets: Vec<Ticket>) -> Self {
        Self {
            tickets: Mutex::new(tickets),
            ..Default::default()
        }
    }

    pub fn with_resolver(mut self, resolver: CredentialResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_resolution_times(self, records: Vec<ResolutionRecord>) -> Self {
        *self.resolution_times.lock() = records;
        self
    }

    /// Delay every call, so tests can observe overlapping requests.
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock() = Some(latency);
        self
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    pub fn set_tickets(&self, tickets: Vec<Ticket>) {
        *self.tickets.lock() = tickets;
    }

    pub fn tickets(&self) -> Vec<Ticket> {
        self.tickets.lock().clone()
    }

    pub fn record_resolution(&self, ticket_id: impl Into<TicketId>, resolved_at: Timestamp) {
        self.resolution_times.lock().push(ResolutionRecord {
            ticket_id: ticket_id.into(),
            resolved_at,
        });
    }

    /// Make every write to `ticket_id` fail with `kind`.
    pub fn fail_writes_for(&self, ticket_id: impl Into<TicketId>, kind: ErrorKind) {
        self.write_failures.lock().insert(ticket_id.into(), kind);
    }

    pub fn clear_write_failures(&self) {
        self.write_failures.lock().clear();
    }

    pub fn fail_reads(&self, kind: Option<ErrorKind>) {
        *self.read_failure.lock() = kind;
    }

    pub fn fail_resolution_times(&self, kind: Option<ErrorKind>) {
        *self.resolution_failure.lock() = kind;
    }

    /// Writes that reached the store, successful or not, in arrival order.
    pub fn writes(&self) -> Vec<(TicketId, FieldValue)> {
        self.writes.lock().clone()
    }

    /// Calls currently in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed in flight at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    async fn tracked<T>(&self, call: impl FnOnce() -> Result<T>) -> Result<T> {
        let _in_flight = InFlight::enter(&self.in_flight, &self.peak_in_flight);
        self.simulate_latency().await;
        call()
    }
}

impl TicketStore for MemoryTicketStore {
    async fn fetch_all(&self, credentials: &dyn CredentialSource) -> Result<Vec<Ticket>> {
        self.resolver.resolve(credentials)?;
        self.tracked(|| match *self.read_failure.lock() {
            Some(kind) => Err(injected(kind, "ticket list")),
            None => Ok(self.tickets.lock().clone()),
        })
        .await
    }

    async fn persist_field(
        &self,
        ticket_id: &TicketId,
        value: &FieldValue,
        credentials: &dyn CredentialSource,
    ) -> Result<()> {
        self.resolver.resolve(credentials)?;
        self.tracked(|| {
            self.writes.lock().push((ticket_id.clone(), value.clone()));
            if let Some(kind) = self.write_failures.lock().get(ticket_id).copied() {
                return Err(injected(kind, &format!("ticket '{ticket_id}'")));
            }
            let mut tickets = self.tickets.lock();
            let ticket = tickets
                .iter_mut()
                .find(|t| &t.id == ticket_id)
                .ok_or_else(|| DeskError::Rejected(format!("ticket '{ticket_id}' not found")))?;
            ticket.apply(value.clone(), Timestamp::now());
            Ok(())
        })
        .await
    }

    async fn fetch_resolution_times(
        &self,
        credentials: &dyn CredentialSource,
    ) -> Result<Vec<ResolutionRecord>> {
        self.resolver.resolve(credentials)?;
        self.tracked(|| match *self.resolution_failure.lock() {
            Some(kind) => Err(injected(kind, "resolution times")),
            None => Ok(self.resolution_times.lock().clone()),
        })
        .await
    }
}
