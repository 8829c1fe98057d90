#[macro_use]
mod macros;

pub mod bulk;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod metrics;
pub mod query;
pub mod store;
pub mod types;

pub use bulk::{BulkEditor, ChangeKey, CommitReport, FailedChange, PendingChange};
pub use config::Config;
pub use dashboard::{Dashboard, DashboardSnapshot, RefreshOutcome, ViewHandle, ViewLifetime};
pub use error::{DeskError, ErrorKind, Result};
pub use metrics::MetricsSummary;
pub use query::{
    Choice, FilterSpec, SortDirection, SortField, TicketQuery, TicketQueryBuilder, sort_tickets,
};
pub use store::{
    CredentialResolver, CredentialSource, EnvCredentials, HttpTicketStore, MemoryCredentials,
    MemoryTicketStore, TicketStore,
};
pub use types::{
    AgentRef, Availability, FieldValue, Ticket, TicketField, TicketId, TicketPriority,
    TicketStatus,
};
