//! Staged edits over the committed ticket snapshot.
//!
//! Edits are recorded as [`PendingChange`]s and never touch the committed
//! values until [`BulkEditor::commit`] has persisted them. Each pending change
//! is written independently: one ticket failing never blocks or rolls back
//! another.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::stream::{self, StreamExt};
use jiff::Timestamp;
use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{DeskError, ErrorKind, Result};
use crate::store::{CredentialSource, TicketStore};
use crate::types::{FieldValue, Ticket, TicketField, TicketId};

const DEFAULT_WRITE_LIMIT: usize = 5;

/// Identifies one field of one ticket.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChangeKey {
    pub ticket_id: TicketId,
    pub field: TicketField,
}

impl ChangeKey {
    pub fn new(ticket_id: impl Into<TicketId>, field: TicketField) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            field,
        }
    }
}

/// A proposed, not yet persisted, value for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChange {
    pub ticket_id: TicketId,
    pub field: TicketField,
    /// Committed value when the edit was staged.
    pub original: FieldValue,
    pub proposed: FieldValue,
}

impl PendingChange {
    pub fn key(&self) -> ChangeKey {
        ChangeKey::new(self.ticket_id.clone(), self.field)
    }
}

#[derive(Debug)]
pub struct FailedChange {
    pub ticket_id: TicketId,
    pub field: TicketField,
    pub error: DeskError,
}

/// Outcome of one commit, ordered by ticket id then field.
#[derive(Debug, Default)]
pub struct CommitReport {
    pub succeeded: Vec<ChangeKey>,
    pub failed: Vec<FailedChange>,
}

impl CommitReport {
    pub fn is_empty(&self) -> bool {
        self.succeeded.is_empty() && self.failed.is_empty()
    }

    pub fn succeeded_ids(&self) -> BTreeSet<TicketId> {
        self.succeeded.iter().map(|k| k.ticket_id.clone()).collect()
    }

    pub fn failed_ids(&self) -> BTreeSet<TicketId> {
        self.failed.iter().map(|f| f.ticket_id.clone()).collect()
    }

    /// The shared error kind when every change failed the same way, such as
    /// an expired token failing the whole batch.
    pub fn systemic_failure(&self) -> Option<ErrorKind> {
        if !self.succeeded.is_empty() {
            return None;
        }
        let mut kinds = self.failed.iter().map(|f| f.error.kind());
        let first = kinds.next()?;
        kinds.all(|k| k == first).then_some(first)
    }
}

#[derive(Debug, Default)]
struct EditorState {
    tickets: Vec<Ticket>,
    selection: BTreeSet<TicketId>,
    pending: BTreeMap<ChangeKey, PendingChange>,
}

impl EditorState {
    fn ticket(&self, id: &str) -> Option<&Ticket> {
        self.tickets.iter().find(|t| t.id.as_str() == id)
    }

    fn ticket_mut(&mut self, id: &str) -> Option<&mut Ticket> {
        self.tickets.iter_mut().find(|t| t.id.as_str() == id)
    }

    fn contains(&self, id: &str) -> bool {
        self.ticket(id).is_some()
    }

    fn stage(&mut self, id: &TicketId, value: FieldValue) -> Result<()> {
        let original = self
            .ticket(id)
            .map(|t| t.field_value(value.field()))
            .ok_or_else(|| unknown_ticket(id))?;
        let key = ChangeKey::new(id.clone(), value.field());
        if original == value {
            self.pending.remove(&key);
        } else {
            self.pending.insert(
                key,
                PendingChange {
                    ticket_id: id.clone(),
                    field: value.field(),
                    original,
                    proposed: value,
                },
            );
        }
        Ok(())
    }

    /// Promote a persisted value into the committed snapshot.
    fn promote(&mut self, change: &PendingChange, now: Timestamp) {
        let Some(ticket) = self.ticket_mut(&change.ticket_id) else {
            return;
        };
        ticket.apply(change.proposed.clone(), now);
        let committed = ticket.field_value(change.field);

        let key = change.key();
        let Some(current) = self.pending.get_mut(&key) else {
            return;
        };
        if current.proposed == change.proposed || current.proposed == committed {
            self.pending.remove(&key);
        } else {
            // Re-edited while the write was in flight; keep the newer proposal.
            current.original = committed;
        }
    }
}

fn unknown_ticket(id: &str) -> DeskError {
    DeskError::Validation(format!("unknown ticket '{id}'"))
}

/// Releases the busy flag when the commit finishes, fails or is dropped.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Selection, staged edits and commits for one session.
pub struct BulkEditor<S> {
    store: Arc<S>,
    credentials: Arc<dyn CredentialSource>,
    state: Mutex<EditorState>,
    busy: AtomicBool,
    write_limit: usize,
}

impl<S: TicketStore> BulkEditor<S> {
    pub fn new(
        store: Arc<S>,
        credentials: Arc<dyn CredentialSource>,
        tickets: Vec<Ticket>,
    ) -> Self {
        Self {
            store,
            credentials,
            state: Mutex::new(EditorState {
                tickets,
                ..Default::default()
            }),
            busy: AtomicBool::new(false),
            write_limit: DEFAULT_WRITE_LIMIT,
        }
    }

    pub fn from_config(
        store: Arc<S>,
        credentials: Arc<dyn CredentialSource>,
        tickets: Vec<Ticket>,
        config: &Config,
    ) -> Self {
        Self::new(store, credentials, tickets).with_write_limit(config.api.max_concurrent_writes)
    }

    /// Maximum number of writes in flight during a commit.
    pub fn with_write_limit(mut self, limit: usize) -> Self {
        self.write_limit = limit.max(1);
        self
    }

    // Selection

    pub fn select(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock();
        if !state.contains(id) {
            return Err(unknown_ticket(id));
        }
        state.selection.insert(TicketId::new(id));
        Ok(())
    }

    pub fn deselect(&self, id: &str) {
        self.state.lock().selection.remove(id);
    }

    /// Select every listed ticket that exists. Returns how many were added.
    pub fn select_all<I, T>(&self, visible: I) -> usize
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut state = self.state.lock();
        let mut added = 0;
        for id in visible {
            let id = id.as_ref();
            if state.contains(id) && state.selection.insert(TicketId::new(id)) {
                added += 1;
            }
        }
        added
    }

    pub fn clear_selection(&self) {
        self.state.lock().selection.clear();
    }

    pub fn selection(&self) -> BTreeSet<TicketId> {
        self.state.lock().selection.clone()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.state.lock().selection.contains(id)
    }

    // Staging

    /// Stage `value` for one ticket. No store call is made.
    pub fn set_pending_value(&self, id: &str, value: FieldValue) -> Result<()> {
        self.state.lock().stage(&TicketId::new(id), value)
    }

    /// Stage the same value for every selected ticket.
    pub fn set_pending_value_for_selection(&self, value: FieldValue) -> Result<usize> {
        let mut state = self.state.lock();
        if state.selection.is_empty() {
            return Err(DeskError::Validation("no tickets selected".to_string()));
        }
        let selected: Vec<TicketId> = state.selection.iter().cloned().collect();
        for id in &selected {
            state.stage(id, value.clone())?;
        }
        Ok(selected.len())
    }

    pub fn discard(&self, id: &str) {
        self.state
            .lock()
            .pending
            .retain(|key, _| key.ticket_id.as_str() != id);
    }

    pub fn discard_field(&self, id: &str, field: TicketField) {
        self.state.lock().pending.remove(&ChangeKey::new(id, field));
    }

    pub fn discard_all(&self) {
        self.state.lock().pending.clear();
    }

    // Reads

    /// The pending proposal if one exists, otherwise the committed value.
    pub fn display_value(&self, id: &str, field: TicketField) -> Option<FieldValue> {
        let state = self.state.lock();
        if let Some(change) = state.pending.get(&ChangeKey::new(id, field)) {
            return Some(change.proposed.clone());
        }
        state.ticket(id).map(|t| t.field_value(field))
    }

    pub fn committed_value(&self, id: &str, field: TicketField) -> Option<FieldValue> {
        self.state.lock().ticket(id).map(|t| t.field_value(field))
    }

    pub fn pending_change(&self, id: &str, field: TicketField) -> Option<PendingChange> {
        self.state
            .lock()
            .pending
            .get(&ChangeKey::new(id, field))
            .cloned()
    }

    pub fn pending_changes(&self) -> Vec<PendingChange> {
        self.state.lock().pending.values().cloned().collect()
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.state.lock().pending.is_empty()
    }

    pub fn ticket(&self, id: &str) -> Option<Ticket> {
        self.state.lock().ticket(id).cloned()
    }

    pub fn tickets(&self) -> Vec<Ticket> {
        self.state.lock().tickets.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Install a freshly fetched snapshot.
    ///
    /// Selection and pending changes for tickets that no longer exist are
    /// dropped, as are pending changes the new snapshot already satisfies.
    pub fn replace_tickets(&self, tickets: Vec<Ticket>) {
        let mut state = self.state.lock();
        state.tickets = tickets;

        let EditorState {
            tickets,
            selection,
            pending,
        } = &mut *state;
        selection.retain(|id| tickets.iter().any(|t| &t.id == id));
        pending.retain(|key, change| {
            let Some(ticket) = tickets.iter().find(|t| t.id == key.ticket_id) else {
                return false;
            };
            let committed = ticket.field_value(key.field);
            if committed == change.proposed {
                return false;
            }
            change.original = committed;
            true
        });
    }

    /// Persist every pending change.
    ///
    /// Writes run concurrently and independently. Successes are promoted into
    /// the committed snapshot and cleared; failures remain pending for retry.
    pub async fn commit(&self) -> Result<CommitReport> {
        let Some(_guard) = BusyGuard::acquire(&self.busy) else {
            return Err(DeskError::CommitInProgress);
        };

        let changes = self.pending_changes();
        if changes.is_empty() {
            return Ok(CommitReport::default());
        }
        tracing::debug!("committing {} pending change(s)", changes.len());

        let store = self.store.as_ref();
        let credentials = self.credentials.as_ref();
        let results: Vec<(PendingChange, Result<()>)> = stream::iter(changes)
            .map(|change| async move {
                let result = store
                    .persist_field(&change.ticket_id, &change.proposed, credentials)
                    .await;
                (change, result)
            })
            .buffer_unordered(self.write_limit)
            .collect()
            .await;

        let now = Timestamp::now();
        let mut report = CommitReport::default();
        {
            let mut state = self.state.lock();
            for (change, result) in results {
                match result {
                    Ok(()) => {
                        state.promote(&change, now);
                        report.succeeded.push(change.key());
                    }
                    Err(error) => {
                        tracing::warn!(
                            "failed to update {} of ticket {}: {}",
                            change.field,
                            change.ticket_id,
                            error
                        );
                        report.failed.push(FailedChange {
                            ticket_id: change.ticket_id,
                            field: change.field,
                            error,
                        });
                    }
                }
            }
        }

        report.succeeded.sort();
        report
            .failed
            .sort_by(|a, b| (&a.ticket_id, a.field).cmp(&(&b.ticket_id, b.field)));
        tracing::debug!(
            "commit finished: {} succeeded, {} failed",
            report.succeeded.len(),
            report.failed.len()
        );
        Ok(report)
    }
}
