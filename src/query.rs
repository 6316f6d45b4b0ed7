// src/query.rs

use std::cmp::Ordering;

use mongodb::bson::{doc, oid::ObjectId, Document};
use serde::Deserialize;

use crate::models::Task;

/// Page size used when the client sends none, or nothing usable.
pub const DEFAULT_PAGE_SIZE: u64 = 5;
/// Larger page sizes are clamped to this.
pub const MAX_PAGE_SIZE: u64 = 100;
/// `status` value meaning "no status predicate".
pub const ALL_STATUSES: &str = "All";

/// Raw query string of `GET /todos`. Everything stays a string so that bad
/// numbers fall back to defaults instead of failing extraction.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ListParams {
    #[serde(rename = "searchTerm")]
    pub search_term: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    #[serde(rename = "sortOrder")]
    pub sort_order: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    Title,
    Description,
    Status,
}

impl SortField {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "createdAt" => Some(SortField::CreatedAt),
            "updatedAt" => Some(SortField::UpdatedAt),
            "title" => Some(SortField::Title),
            "description" => Some(SortField::Description),
            "status" => Some(SortField::Status),
            _ => None,
        }
    }

    /// Document field the sort applies to.
    pub fn field_name(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "createdAt",
            SortField::UpdatedAt => "updatedAt",
            SortField::Title => "title",
            SortField::Description => "description",
            SortField::Status => "status",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("asc") {
            SortDirection::Ascending
        } else {
            SortDirection::Descending
        }
    }

    fn as_i32(&self) -> i32 {
        match self {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        }
    }
}

/// The predicate part of a list query. Pagination never touches it, so the
/// same filter drives both the page fetch and the total count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFilter {
    owner: ObjectId,
    status: Option<String>,
    search: Option<String>,
}

impl TaskFilter {
    pub fn for_owner(owner: ObjectId) -> Self {
        TaskFilter {
            owner,
            status: None,
            search: None,
        }
    }

    pub fn owner(&self) -> ObjectId {
        self.owner
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    /// MongoDB filter. The owner clause is always present.
    pub fn to_document(&self) -> Document {
        let mut filter = doc! { "user": self.owner };
        if let Some(status) = &self.status {
            filter.insert("status", status.as_str());
        }
        if let Some(term) = &self.search {
            // Literal substring: metacharacters in the term must not act as regex.
            let pattern = regex::escape(term);
            filter.insert(
                "$or",
                vec![
                    doc! { "title": { "$regex": pattern.as_str(), "$options": "i" } },
                    doc! { "description": { "$regex": pattern.as_str(), "$options": "i" } },
                ],
            );
        }
        filter
    }

    /// Same predicate as `to_document`, evaluated in process.
    pub fn matches(&self, task: &Task) -> bool {
        if task.owner != self.owner {
            return false;
        }
        if let Some(status) = &self.status {
            if task.status.as_str() != status {
                return false;
            }
        }
        if let Some(term) = &self.search {
            let term = term.to_lowercase();
            return task.title.to_lowercase().contains(&term)
                || task.description.to_lowercase().contains(&term);
        }
        true
    }
}

/// Fully normalized list query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskQuery {
    pub filter: TaskFilter,
    pub sort_field: SortField,
    pub sort_direction: SortDirection,
    /// 1-based.
    pub page: u64,
    pub limit: u64,
}

impl TaskQuery {
    /// Capped at `i64::MAX`, the largest skip MongoDB accepts. Any page that
    /// far out is past the last one and comes back empty.
    pub fn skip(&self) -> u64 {
        (self.page - 1)
            .saturating_mul(self.limit)
            .min(i64::MAX as u64)
    }

    /// `_id` breaks ties so that equal sort keys still page deterministically.
    pub fn sort_document(&self) -> Document {
        let direction = self.sort_direction.as_i32();
        let mut sort = Document::new();
        sort.insert(self.sort_field.field_name(), direction);
        sort.insert("_id", direction);
        sort
    }

    /// In-process equivalent of `sort_document`.
    pub fn compare(&self, a: &Task, b: &Task) -> Ordering {
        let primary = match self.sort_field {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortField::Title => a.title.cmp(&b.title),
            SortField::Description => a.description.cmp(&b.description),
            SortField::Status => a.status.as_str().cmp(b.status.as_str()),
        };
        let ordering = primary.then_with(|| a.id.cmp(&b.id));
        match self.sort_direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }

    /// `ceil(total / limit)`; 0 when nothing matches.
    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.limit)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_positive(value: &Option<String>) -> Option<u64> {
    non_empty(value)
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|n| *n >= 1)
        .map(|n| n as u64)
}

/// Turns the client's parameters into a query scoped to `owner`.
///
/// Pure and deterministic: equal inputs give equal queries. Nothing in
/// `params` can remove or replace the owner clause.
pub fn build_query(owner: ObjectId, params: &ListParams) -> TaskQuery {
    let status = non_empty(&params.status)
        .filter(|s| *s != ALL_STATUSES)
        .map(str::to_string);
    let search = non_empty(&params.search_term).map(str::to_string);

    let sort_field = non_empty(&params.sort_by)
        .and_then(SortField::parse)
        .unwrap_or(SortField::CreatedAt);
    let sort_direction = non_empty(&params.sort_order)
        .map(SortDirection::parse)
        .unwrap_or(SortDirection::Descending);

    let page = parse_positive(&params.page).unwrap_or(1);
    let limit = parse_positive(&params.limit)
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .min(MAX_PAGE_SIZE);

    TaskQuery {
        filter: TaskFilter {
            owner,
            status,
            search,
        },
        sort_field,
        sort_direction,
        page,
        limit,
    }
}
