//! Search, filter, sort and pagination over a fetched collection.
//!
//! The controller keeps a working copy of the raw collection plus the view
//! parameters, and derives the visible page from both on demand. Pages are
//! 1-based. Changing the query, a filter or the sort key to a different
//! value returns to page 1; replacing the collection keeps the page,
//! clamped to the last page if the collection shrank.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use market_types::{FeedbackStatus, Product, RatingRatio, ReviewedFeedback, Timestamp};

use crate::error::ClientError;

pub const DEFAULT_PAGE_SIZE: usize = 12;

/// An entity the list view can search, filter and order.
pub trait Listable {
    /// Ledger identifier, used as the final tie-break.
    fn list_id(&self) -> u64;
    fn created_at(&self) -> Timestamp;
    fn rating_ratio(&self) -> RatingRatio;
    fn review_count(&self) -> u64;
    /// Text ordered by [`SortKey::NameAsc`].
    fn sort_name(&self) -> &str;
    /// Whether the entity contains `needle`, already lowercased.
    fn matches_query(&self, needle: &str) -> bool;
    fn status(&self) -> Option<FeedbackStatus> {
        None
    }
}

impl Listable for Product {
    fn list_id(&self) -> u64 {
        self.id.0
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn rating_ratio(&self) -> RatingRatio {
        Product::rating_ratio(self)
    }

    fn review_count(&self) -> u64 {
        self.rating_count
    }

    fn sort_name(&self) -> &str {
        &self.name
    }

    fn matches_query(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
    }
}

impl Listable for ReviewedFeedback {
    fn list_id(&self) -> u64 {
        self.feedback.id.0
    }

    fn created_at(&self) -> Timestamp {
        self.feedback.created_at
    }

    fn rating_ratio(&self) -> RatingRatio {
        RatingRatio::new(u64::from(self.feedback.rating), 1)
    }

    fn review_count(&self) -> u64 {
        0
    }

    fn sort_name(&self) -> &str {
        &self.feedback.comment
    }

    fn matches_query(&self, needle: &str) -> bool {
        self.feedback.comment.to_lowercase().contains(needle)
    }

    fn status(&self) -> Option<FeedbackStatus> {
        Some(self.status)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SortKey {
    #[default]
    Newest,
    Oldest,
    HighestRated,
    MostReviewed,
    NameAsc,
}

impl SortKey {
    pub const ALL: [SortKey; 5] = [
        Self::Newest,
        Self::Oldest,
        Self::HighestRated,
        Self::MostReviewed,
        Self::NameAsc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::HighestRated => "rating",
            Self::MostReviewed => "reviews",
            Self::NameAsc => "name",
        }
    }

    /// Total order: the key's own criterion, then identifier ascending.
    pub fn compare<T: Listable>(&self, a: &T, b: &T) -> Ordering {
        let primary = match self {
            Self::Newest => b.created_at().cmp(&a.created_at()),
            Self::Oldest => a.created_at().cmp(&b.created_at()),
            Self::HighestRated => b.rating_ratio().cmp_average(&a.rating_ratio()),
            Self::MostReviewed => b.review_count().cmp(&a.review_count()),
            Self::NameAsc => a
                .sort_name()
                .to_lowercase()
                .cmp(&b.sort_name().to_lowercase())
                .then_with(|| a.sort_name().cmp(b.sort_name())),
        };
        primary.then_with(|| a.list_id().cmp(&b.list_id()))
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "rating" | "highest-rated" => Ok(Self::HighestRated),
            "reviews" | "most-reviewed" => Ok(Self::MostReviewed),
            "name" | "name-asc" => Ok(Self::NameAsc),
            other => Err(ClientError::Validation(format!("unknown sort key {other:?}"))),
        }
    }
}

/// Everything that shapes the view apart from the collection itself.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewParams {
    pub query: String,
    /// Inclusive minimum average rating; `None` shows everything.
    pub min_rating: Option<u8>,
    pub status: Option<FeedbackStatus>,
    pub sort: SortKey,
}

impl ViewParams {
    fn admits<T: Listable>(&self, item: &T, needle: &str) -> bool {
        if !needle.is_empty() && !item.matches_query(needle) {
            return false;
        }
        if let Some(min) = self.min_rating {
            if !item.rating_ratio().meets_minimum(min) {
                return false;
            }
        }
        match self.status {
            Some(wanted) => item.status() == Some(wanted),
            None => true,
        }
    }
}

/// One rendered page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageView<T> {
    pub items: Vec<T>,
    /// 1-based.
    pub page: usize,
    /// 0 when nothing matches.
    pub total_pages: usize,
    pub total_matches: usize,
    pub page_size: usize,
}

impl<T> PageView<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    /// 1-based position of the first item on this page, 0 when empty.
    pub fn first_position(&self) -> usize {
        if self.items.is_empty() {
            0
        } else {
            (self.page - 1) * self.page_size + 1
        }
    }
}

pub struct ListViewController<T> {
    items: Vec<T>,
    params: ViewParams,
    page: usize,
    page_size: usize,
}

impl<T: Listable + Clone> ListViewController<T> {
    /// `page_size` of 0 is treated as 1.
    pub fn new(page_size: usize) -> Self {
        Self {
            items: Vec::new(),
            params: ViewParams::default(),
            page: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn with_items(mut self, items: Vec<T>) -> Self {
        self.items = items;
        self
    }

    pub fn params(&self) -> &ViewParams {
        &self.params
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn raw_len(&self) -> usize {
        self.items.len()
    }

    /// Swap in a freshly fetched collection, keeping the page index unless
    /// it no longer exists.
    pub fn set_items(&mut self, items: Vec<T>) {
        self.items = items;
        let last = self.total_pages().max(1);
        if self.page > last {
            tracing::debug!(from = self.page, to = last, "page clamped after refresh");
            self.page = last;
        }
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        let query = query.into();
        if query != self.params.query {
            self.params.query = query;
            self.page = 1;
        }
    }

    pub fn set_min_rating(&mut self, min_rating: Option<u8>) {
        if min_rating != self.params.min_rating {
            self.params.min_rating = min_rating;
            self.page = 1;
        }
    }

    pub fn set_status_filter(&mut self, status: Option<FeedbackStatus>) {
        if status != self.params.status {
            self.params.status = status;
            self.page = 1;
        }
    }

    pub fn set_sort(&mut self, sort: SortKey) {
        if sort != self.params.sort {
            self.params.sort = sort;
            self.page = 1;
        }
    }

    /// Apply all parameters at once; resets to page 1 if any changed.
    pub fn set_params(&mut self, params: ViewParams) {
        if params != self.params {
            self.params = params;
            self.page = 1;
        }
    }

    /// Jump to `page`, clamped to the existing pages.
    pub fn set_page(&mut self, page: usize) {
        self.page = page.clamp(1, self.total_pages().max(1));
    }

    pub fn next_page(&mut self) {
        self.set_page(self.page + 1);
    }

    pub fn prev_page(&mut self) {
        self.set_page(self.page.saturating_sub(1));
    }

    /// Every matching item in display order.
    pub fn matching(&self) -> Vec<&T> {
        let needle = self.params.query.trim().to_lowercase();
        let mut matches: Vec<&T> = self
            .items
            .iter()
            .filter(|item| self.params.admits(*item, &needle))
            .collect();
        let sort = self.params.sort;
        matches.sort_by(|a, b| sort.compare(*a, *b));
        matches
    }

    pub fn total_pages(&self) -> usize {
        self.matching().len().div_ceil(self.page_size)
    }

    pub fn view(&self) -> PageView<T> {
        let matches = self.matching();
        let total_matches = matches.len();
        let total_pages = total_matches.div_ceil(self.page_size);
        let items = matches
            .into_iter()
            .skip((self.page - 1) * self.page_size)
            .take(self.page_size)
            .cloned()
            .collect();
        PageView {
            items,
            page: self.page,
            total_pages,
            total_matches,
            page_size: self.page_size,
        }
    }
}

impl<T: Listable + Clone> Default for ListViewController<T> {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}
