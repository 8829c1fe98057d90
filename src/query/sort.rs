//! Sort functions for tickets.
//!
//! All orderings are stable: tickets that compare equal keep their input
//! order in both directions, so re-sorting an unchanged list never shuffles
//! it.

use std::cmp::Ordering;

use crate::error::DeskError;
use crate::types::Ticket;

/// Sort field for ticket listing and queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Priority,
    Created,
    Updated,
    Id,
}

enum_display_fromstr!(SortField, DeskError::InvalidSortField, {
    Priority => "priority",
    Created => "created" | "createdAt" | "created_at",
    Updated => "updated" | "updatedAt" | "updated_at",
    Id => "id",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

enum_display_fromstr!(SortDirection, DeskError::Validation, {
    Asc => "asc" | "ascending",
    Desc => "desc" | "descending",
});

impl SortDirection {
    pub fn toggle(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// Ascending comparison on a single field. Missing values rank lowest.
fn compare_by(a: &Ticket, b: &Ticket, field: SortField) -> Ordering {
    match field {
        SortField::Priority => a.priority.rank().cmp(&b.priority.rank()),
        SortField::Created => a.created_at.cmp(&b.created_at),
        // `None < Some(_)`, so tickets never updated sort lowest.
        SortField::Updated => a.updated_at.cmp(&b.updated_at),
        SortField::Id => a.id.cmp(&b.id),
    }
}

/// Sort tickets in place by the specified field and direction
pub fn sort_tickets_in_place(tickets: &mut [Ticket], field: SortField, direction: SortDirection) {
    tickets.sort_by(|a, b| match direction {
        SortDirection::Asc => compare_by(a, b, field),
        SortDirection::Desc => compare_by(b, a, field),
    });
}

/// Return a sorted copy of `tickets`
pub fn sort_tickets(tickets: &[Ticket], field: SortField, direction: SortDirection) -> Vec<Ticket> {
    let mut sorted = tickets.to_vec();
    sort_tickets_in_place(&mut sorted, field, direction);
    sorted
}
