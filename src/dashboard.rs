//! Dashboard data loading with view liveness.
//!
//! A view owns a [`ViewLifetime`] and passes [`ViewHandle`]s to the loads it
//! starts. When the view goes away the handles go dead, and any load that
//! completes afterwards is dropped instead of applied. A refresh that has
//! been overtaken by a later one on the same dashboard is dropped as well.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use jiff::Timestamp;
use parking_lot::Mutex;

use crate::error::Result;
use crate::metrics::MetricsSummary;
use crate::store::{CredentialSource, ResolutionRecord, TicketStore};
use crate::types::{Ticket, TicketId};

/// Liveness token owned by a view. Dropping it marks every handle dead.
#[derive(Debug)]
pub struct ViewLifetime {
    alive: Arc<AtomicBool>,
}

impl ViewLifetime {
    pub fn new() -> Self {
        Self {
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn handle(&self) -> ViewHandle {
        ViewHandle {
            alive: Arc::clone(&self.alive),
        }
    }

    pub fn teardown(&self) {
        self.alive.store(false, Ordering::Release);
    }
}

impl Default for ViewLifetime {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ViewLifetime {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[derive(Debug, Clone)]
pub struct ViewHandle {
    alive: Arc<AtomicBool>,
}

impl ViewHandle {
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied,
    /// The view went away, or a later refresh started, before the load
    /// finished.
    Discarded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub tickets: Vec<Ticket>,
    pub summary: MetricsSummary,
    pub loaded_at: Timestamp,
}

/// Fill in `resolved_at` from the dedicated resolution-times feed.
pub fn merge_resolution_times(tickets: &mut [Ticket], records: &[ResolutionRecord]) -> usize {
    let by_id: HashMap<&TicketId, Timestamp> = records
        .iter()
        .map(|r| (&r.ticket_id, r.resolved_at))
        .collect();
    let mut merged = 0;
    for ticket in tickets {
        if let Some(resolved_at) = by_id.get(&ticket.id) {
            ticket.resolved_at = Some(*resolved_at);
            merged += 1;
        }
    }
    merged
}

pub struct Dashboard<S> {
    store: Arc<S>,
    credentials: Arc<dyn CredentialSource>,
    snapshot: Mutex<Option<DashboardSnapshot>>,
    /// Bumped when a refresh starts; only the latest one may apply.
    generation: AtomicU64,
}

impl<S: TicketStore> Dashboard<S> {
    pub fn new(store: Arc<S>, credentials: Arc<dyn CredentialSource>) -> Self {
        Self {
            store,
            credentials,
            snapshot: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Last applied snapshot, if any.
    pub fn snapshot(&self) -> Option<DashboardSnapshot> {
        self.snapshot.lock().clone()
    }

    /// Load tickets and resolution times, then apply them if `view` is alive
    /// and no later refresh has started meanwhile.
    ///
    /// A ticket fetch failure is returned to a live view. Resolution times
    /// are best effort: when they fail the summary is built without them.
    pub async fn refresh(&self, view: &ViewHandle) -> Result<RefreshOutcome> {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let credentials = self.credentials.as_ref();
        let (tickets, resolution_times) = tokio::join!(
            self.store.fetch_all(credentials),
            self.store.fetch_resolution_times(credentials)
        );

        if !view.is_alive() {
            tracing::debug!("view closed during refresh, discarding result");
            return Ok(RefreshOutcome::Discarded);
        }
        if self.is_superseded(generation) {
            tracing::debug!("refresh {generation} overtaken by a later one, discarding result");
            return Ok(RefreshOutcome::Discarded);
        }

        let mut tickets = tickets?;
        match resolution_times {
            Ok(records) => {
                let merged = merge_resolution_times(&mut tickets, &records);
                tracing::debug!("merged {merged} resolution time(s)");
            }
            Err(e) => {
                tracing::warn!("resolution times unavailable, continuing without them: {e}");
            }
        }

        let loaded_at = Timestamp::now();
        let summary = MetricsSummary::compute(&tickets, loaded_at);
        let mut snapshot = self.snapshot.lock();
        if self.is_superseded(generation) {
            return Ok(RefreshOutcome::Discarded);
        }
        *snapshot = Some(DashboardSnapshot {
            tickets,
            summary,
            loaded_at,
        });
        Ok(RefreshOutcome::Applied)
    }

    fn is_superseded(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) != generation
    }
}
