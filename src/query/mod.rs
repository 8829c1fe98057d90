//! Query builder pattern for filtering tickets.
//!
//! Filters are small trait objects composed with AND. A [`FilterSpec`] is the
//! plain-data form the UI holds (search box, dropdowns, tag chips) and turns
//! into the matching filters.

use std::collections::BTreeSet;
use std::str::FromStr;

use crate::error::DeskError;
use crate::types::{Ticket, TicketPriority, TicketStatus};

pub mod sort;

pub use sort::{SortDirection, SortField, sort_tickets, sort_tickets_in_place};

/// A dropdown selection: either "All" or one specific value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Choice<T> {
    #[default]
    All,
    Only(T),
}

impl<T> Choice<T> {
    pub fn as_only(&self) -> Option<&T> {
        match self {
            Choice::All => None,
            Choice::Only(value) => Some(value),
        }
    }
}

impl<T> From<Option<T>> for Choice<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Choice::All, Choice::Only)
    }
}

impl<T> FromStr for Choice<T>
where
    T: FromStr<Err = DeskError>,
{
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || unicase::eq_ascii(trimmed, "all") {
            Ok(Choice::All)
        } else {
            trimmed.parse().map(Choice::Only)
        }
    }
}

/// Trait for ticket filters
pub trait TicketFilter: Send + Sync {
    fn matches(&self, ticket: &Ticket) -> bool;
}

/// Case-insensitive substring match over id, title and description
pub struct TextFilter {
    needle: String,
}

impl TextFilter {
    pub fn new(text: &str) -> Self {
        Self {
            needle: text.trim().to_lowercase(),
        }
    }
}

impl TicketFilter for TextFilter {
    fn matches(&self, ticket: &Ticket) -> bool {
        if self.needle.is_empty() {
            return true;
        }
        [
            ticket.id.as_str(),
            ticket.title.as_str(),
            ticket.description.as_str(),
        ]
        .iter()
        .any(|haystack| haystack.to_lowercase().contains(&self.needle))
    }
}

/// Filter tickets by status
pub struct StatusFilter {
    target_status: TicketStatus,
}

impl StatusFilter {
    pub fn new(status: TicketStatus) -> Self {
        Self {
            target_status: status,
        }
    }
}

impl TicketFilter for StatusFilter {
    fn matches(&self, ticket: &Ticket) -> bool {
        ticket.status == self.target_status
    }
}

/// Filter tickets by priority
pub struct PriorityFilter {
    target_priority: TicketPriority,
}

impl PriorityFilter {
    pub fn new(priority: TicketPriority) -> Self {
        Self {
            target_priority: priority,
        }
    }
}

impl TicketFilter for PriorityFilter {
    fn matches(&self, ticket: &Ticket) -> bool {
        ticket.priority == self.target_priority
    }
}

/// Filter tickets by exact category
pub struct CategoryFilter {
    category: String,
}

impl CategoryFilter {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
        }
    }
}

impl TicketFilter for CategoryFilter {
    fn matches(&self, ticket: &Ticket) -> bool {
        ticket.category == self.category
    }
}

/// Matches tickets carrying any of the requested tags
pub struct TagFilter {
    tags: BTreeSet<String>,
}

impl TagFilter {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }
}

impl TicketFilter for TagFilter {
    fn matches(&self, ticket: &Ticket) -> bool {
        self.tags.is_empty() || ticket.tags.iter().any(|t| self.tags.contains(t))
    }
}

/// Plain-data filter selection. Every field is optional; set fields combine
/// with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub text: Option<String>,
    pub status: Choice<TicketStatus>,
    pub priority: Choice<TicketPriority>,
    pub category: Choice<String>,
    pub tags: BTreeSet<String>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn status(mut self, status: TicketStatus) -> Self {
        self.status = Choice::Only(status);
        self
    }

    pub fn priority(mut self, priority: TicketPriority) -> Self {
        self.priority = Choice::Only(priority);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Choice::Only(category.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// True when no field narrows the result.
    pub fn is_empty(&self) -> bool {
        self.text.as_deref().is_none_or(|t| t.trim().is_empty())
            && self.status == Choice::All
            && self.priority == Choice::All
            && self.category == Choice::All
            && self.tags.is_empty()
    }

    /// The filters this selection stands for.
    pub fn to_filters(&self) -> Vec<Box<dyn TicketFilter>> {
        let mut filters: Vec<Box<dyn TicketFilter>> = Vec::new();
        if let Some(text) = self.text.as_deref()
            && !text.trim().is_empty()
        {
            filters.push(Box::new(TextFilter::new(text)));
        }
        if let Choice::Only(status) = self.status {
            filters.push(Box::new(StatusFilter::new(status)));
        }
        if let Choice::Only(priority) = self.priority {
            filters.push(Box::new(PriorityFilter::new(priority)));
        }
        if let Choice::Only(category) = &self.category {
            filters.push(Box::new(CategoryFilter::new(category.clone())));
        }
        if !self.tags.is_empty() {
            filters.push(Box::new(TagFilter::new(self.tags.iter().cloned())));
        }
        filters
    }

    /// Whether a single ticket satisfies this selection.
    pub fn matches(&self, ticket: &Ticket) -> bool {
        self.to_filters().iter().all(|f| f.matches(ticket))
    }
}

/// Apply a filter selection, returning matching tickets in input order.
pub fn apply(tickets: &[Ticket], spec: &FilterSpec) -> Vec<Ticket> {
    let filters = spec.to_filters();
    tickets
        .iter()
        .filter(|t| filters.iter().all(|f| f.matches(t)))
        .cloned()
        .collect()
}

/// A built query: filters, then an optional sort, then an optional limit.
pub struct TicketQuery {
    filters: Vec<Box<dyn TicketFilter>>,
    sort: Option<(SortField, SortDirection)>,
    limit: Option<usize>,
}

impl TicketQuery {
    /// Apply this query. The input slice is left untouched.
    pub fn apply(&self, tickets: &[Ticket]) -> Vec<Ticket> {
        let mut filtered: Vec<Ticket> = tickets
            .iter()
            .filter(|t| self.filters.iter().all(|f| f.matches(t)))
            .cloned()
            .collect();

        if let Some((field, direction)) = self.sort {
            sort::sort_tickets_in_place(&mut filtered, field, direction);
        }

        if let Some(limit) = self.limit {
            filtered.truncate(limit);
        }

        filtered
    }
}

/// Query builder for filtering and sorting tickets
#[derive(Default)]
pub struct TicketQueryBuilder {
    filters: Vec<Box<dyn TicketFilter>>,
    sort: Option<(SortField, SortDirection)>,
    limit: Option<usize>,
}

impl TicketQueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter to the query (AND composition)
    pub fn with_filter(mut self, filter: Box<dyn TicketFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add every filter a selection stands for
    pub fn with_spec(mut self, spec: &FilterSpec) -> Self {
        self.filters.extend(spec.to_filters());
        self
    }

    pub fn with_sort(mut self, field: SortField, direction: SortDirection) -> Self {
        self.sort = Some((field, direction));
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn build(self) -> TicketQuery {
        TicketQuery {
            filters: self.filters,
            sort: self.sort,
            limit: self.limit,
        }
    }
}
