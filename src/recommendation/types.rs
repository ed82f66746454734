//! Request-scoped value types shared by the search, ranking and service layers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};

/// Opaque user identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// The slice of a user profile the strength factors read
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub city: Option<String>,
    pub birthdate: Option<NaiveDate>,
}

/// Distance from a source user to every user reached within the depth bound.
///
/// The source itself is never a key; unreached users are absent.
pub type SocialDistanceMap = HashMap<UserId, f64>;

/// Per-factor contributions to a connection strength score, in factor registration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrengthBreakdown {
    entries: Vec<(&'static str, f64)>,
}

impl StrengthBreakdown {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Record a contribution. Factor names are unique, so a repeated name replaces in place.
    pub fn insert(&mut self, name: &'static str, contribution: f64) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = contribution,
            None => self.entries.push((name, contribution)),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.entries.iter().copied()
    }

    /// Raw, unclamped sum of all contributions
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, v)| v).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for StrengthBreakdown {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// A recommended connection
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub candidate_id: UserId,
    /// `1 / (1 + distance)`, always in (0, 1]
    pub score: f64,
    pub breakdown: StrengthBreakdown,
    pub generated_at: DateTime<Utc>,
}

/// Zero-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub struct PageRequest {
    pub page: i64,
    pub size: i64,
}

impl PageRequest {
    pub fn new(page: i64, size: i64) -> Self {
        Self { page, size }
    }

    pub fn validate(&self) -> Result<()> {
        if self.page < 0 {
            return Err(Error::invalid_argument(
                "page",
                format!("page number must be >= 0, got {}", self.page),
            ));
        }
        if self.size <= 0 {
            return Err(Error::invalid_argument(
                "size",
                format!("page size must be > 0, got {}", self.size),
            ));
        }
        Ok(())
    }

    /// Index of the first element on this page, saturating for absurd page numbers
    pub fn offset(&self) -> usize {
        let offset = (self.page.max(0) as u64).saturating_mul(self.size.max(0) as u64);
        usize::try_from(offset).unwrap_or(usize::MAX)
    }
}

/// One page of an ordered result set
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub current_page: i64,
    pub page_size: i64,
    pub total_elements: usize,
    pub total_pages: usize,
    pub is_first: bool,
    pub is_last: bool,
}

impl<T> Page<T> {
    /// Cut the requested page out of the full, already ordered result set.
    ///
    /// The request must already be validated.
    pub fn slice(items: Vec<T>, request: &PageRequest) -> Self {
        let total = items.len();
        let size = request.size.max(1) as usize;
        let start = request.offset().min(total);
        let end = start.saturating_add(size).min(total);

        let content: Vec<T> = items.into_iter().skip(start).take(end - start).collect();
        let is_last = start + content.len() >= total;

        Self {
            current_page: request.page,
            page_size: request.size,
            total_elements: total,
            total_pages: total.div_ceil(size),
            is_first: request.page == 0,
            is_last,
            content,
        }
    }

    pub fn empty(request: &PageRequest) -> Self {
        Self::slice(Vec::new(), request)
    }
}
