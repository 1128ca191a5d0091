//! Admin listing parameters: search, date window, ordering and paging.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Months, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::models::Submission;

pub const PER_PAGE: i64 = 20;

/// Raw query string of `GET /api/v1/admin/feedback`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    /// Case-insensitive substring over name, email and message.
    pub s: Option<String>,
    /// `today`, `yesterday`, `week`, `month` or `year`.
    pub date_filter: Option<String>,
    /// `id`, `name`, `email` or `created_at`.
    pub orderby: Option<String>,
    /// `ASC` or `DESC`.
    pub order: Option<String>,
    /// 1-based page number.
    pub paged: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFilter {
    Today,
    Yesterday,
    Week,
    Month,
    Year,
}

impl DateFilter {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "today" => Some(DateFilter::Today),
            "yesterday" => Some(DateFilter::Yesterday),
            "week" => Some(DateFilter::Week),
            "month" => Some(DateFilter::Month),
            "year" => Some(DateFilter::Year),
            _ => None,
        }
    }

    /// `[start, end)` in UTC; `end` is open for the rolling windows.
    pub fn range(&self, now: DateTime<Utc>) -> (DateTime<Utc>, Option<DateTime<Utc>>) {
        let midnight = Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::MIN));
        match self {
            DateFilter::Today => (midnight, Some(midnight + Duration::days(1))),
            DateFilter::Yesterday => (midnight - Duration::days(1), Some(midnight)),
            DateFilter::Week => (now - Duration::days(7), None),
            DateFilter::Month => (now - Duration::days(30), None),
            DateFilter::Year => (now.checked_sub_months(Months::new(12)).unwrap_or(now - Duration::days(365)), None),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortColumn {
    Id,
    Name,
    Email,
    #[default]
    CreatedAt,
}

impl SortColumn {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "id" => Some(SortColumn::Id),
            "name" => Some(SortColumn::Name),
            "email" => Some(SortColumn::Email),
            "created_at" => Some(SortColumn::CreatedAt),
            _ => None,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            SortColumn::Id => "id",
            SortColumn::Name => "name",
            SortColumn::Email => "email",
            SortColumn::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ASC" => Some(SortOrder::Asc),
            "DESC" => Some(SortOrder::Desc),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Validated listing request. Unknown sort values fall back to newest first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListQuery {
    pub search: Option<String>,
    pub date: Option<DateFilter>,
    pub sort: SortColumn,
    pub order: SortOrder,
    pub page: i64,
}

impl From<ListParams> for ListQuery {
    fn from(p: ListParams) -> Self {
        Self {
            search: p.s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            date: p.date_filter.as_deref().and_then(DateFilter::parse),
            sort: p.orderby.as_deref().and_then(SortColumn::parse).unwrap_or_default(),
            order: p.order.as_deref().and_then(SortOrder::parse).unwrap_or_default(),
            page: p.paged.unwrap_or(1).max(1),
        }
    }
}

impl ListQuery {
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(PER_PAGE)
    }

    /// Search and date predicate, shared by stores that filter in process.
    pub fn matches(&self, s: &Submission, now: DateTime<Utc>) -> bool {
        if let Some(needle) = &self.search {
            let needle = needle.to_lowercase();
            let hit = [&s.name, &s.email, &s.message].iter().any(|f| f.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        if let Some(filter) = self.date {
            let (start, end) = filter.range(now);
            if s.created_at < start || end.is_some_and(|e| s.created_at >= e) {
                return false;
            }
        }
        true
    }

    /// Requested ordering with id as the tie breaker.
    pub fn compare(&self, a: &Submission, b: &Submission) -> Ordering {
        let primary = match self.sort {
            SortColumn::Id => a.id.cmp(&b.id),
            SortColumn::Name => a.name.cmp(&b.name),
            SortColumn::Email => a.email.cmp(&b.email),
            SortColumn::CreatedAt => a.created_at.cmp(&b.created_at),
        }
        .then(a.id.cmp(&b.id));
        match self.order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        }
    }
}

/// Escapes `%`, `_` and `\` for a LIKE pattern using `\` as the escape char.
pub fn like_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Page {
    pub items: Vec<Submission>,
    pub total_items: i64,
    pub total_pages: i64,
    pub current_page: i64,
    pub per_page: i64,
}

impl Page {
    pub fn new(items: Vec<Submission>, total_items: i64, query: &ListQuery) -> Self {
        Self {
            items,
            total_items,
            total_pages: (total_items + PER_PAGE - 1) / PER_PAGE,
            current_page: query.page,
            per_page: PER_PAGE,
        }
    }
}
