//! Derived view over a [`RecordStore`]: case-insensitive substring
//! filter, stable typed sort, clamped pagination. Reads the store, never
//! mutates it.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::{Record, RecordStore};
use crate::DEFAULT_PAGE_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub const fn toggle(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQueryState {
    pub search_text: String,
    pub sort_key: Option<String>,
    pub sort_direction: SortDirection,
    /// 1-based.
    pub page_index: usize,
    pub page_size: usize,
}

impl Default for ListQueryState {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl ListQueryState {
    #[must_use]
    pub fn new(page_size: usize) -> Self {
        Self {
            search_text: String::new(),
            sort_key: None,
            sort_direction: SortDirection::Asc,
            page_index: 1,
            page_size: page_size.max(1),
        }
    }

    /// Changing the search text resets the page index, so users never
    /// land on an out-of-range page showing nothing.
    pub fn set_search(&mut self, text: impl Into<String>) {
        self.search_text = text.into();
        self.page_index = 1;
    }

    /// Re-requesting the active sort key flips direction; a new key
    /// starts ascending.
    pub fn toggle_sort(&mut self, key: impl Into<String>) {
        let key = key.into();
        if self.sort_key.as_deref() == Some(key.as_str()) {
            self.sort_direction = self.sort_direction.toggle();
        } else {
            self.sort_key = Some(key);
            self.sort_direction = SortDirection::Asc;
        }
    }

    pub fn set_page(&mut self, index: usize) {
        self.page_index = index.max(1);
    }

    pub fn set_page_size(&mut self, size: usize) {
        self.page_size = size.max(1);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListPage {
    pub total_count: usize,
    pub page_count: usize,
    /// The clamped index actually shown, not necessarily the requested one.
    pub page_index: usize,
    pub page_size: usize,
    pub page_items: Vec<Record>,
}

/// Joins every nested value of a field into one searchable string.
#[must_use]
pub fn flatten(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(flatten).collect::<Vec<_>>().join(" "),
        Value::Object(map) => map.values().map(flatten).collect::<Vec<_>>().join(" "),
    }
}

fn matches(record: &Record, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    record
        .fields()
        .values()
        .any(|value| flatten(value).to_lowercase().contains(needle))
}

enum SortValue {
    Number(f64),
    Timestamp(i64),
    Text(String),
    Missing,
}

impl SortValue {
    const fn rank(&self) -> u8 {
        match self {
            Self::Number(_) => 0,
            Self::Timestamp(_) => 1,
            Self::Text(_) => 2,
            Self::Missing => 3,
        }
    }
}

fn parse_timestamp(text: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc().timestamp_millis());
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp_millis());
    }
    None
}

/// Numeric-looking values compare numerically, ISO-date-looking values
/// compare as timestamps, everything else compares case-insensitively
/// as text. Mixed kinds order number < date < text < missing.
fn classify(value: Option<&Value>) -> SortValue {
    let Some(value) = value else {
        return SortValue::Missing;
    };
    match value {
        Value::Null => SortValue::Missing,
        Value::Number(n) => n.as_f64().map_or(SortValue::Missing, SortValue::Number),
        Value::Bool(b) => SortValue::Text(b.to_string()),
        Value::String(s) => {
            let text = s.trim();
            if let Ok(n) = text.parse::<f64>() {
                return SortValue::Number(n);
            }
            if let Some(ts) = parse_timestamp(text) {
                return SortValue::Timestamp(ts);
            }
            SortValue::Text(text.to_lowercase())
        }
        other => SortValue::Text(flatten(other).to_lowercase()),
    }
}

fn compare(a: &SortValue, b: &SortValue) -> Ordering {
    match (a, b) {
        (SortValue::Number(x), SortValue::Number(y)) => x.total_cmp(y),
        (SortValue::Timestamp(x), SortValue::Timestamp(y)) => x.cmp(y),
        (SortValue::Text(x), SortValue::Text(y)) => x.cmp(y),
        _ => a.rank().cmp(&b.rank()),
    }
}

#[must_use]
pub fn apply(store: &RecordStore, state: &ListQueryState) -> ListPage {
    let needle = state.search_text.trim().to_lowercase();
    let filtered: Vec<&Record> = store.iter().filter(|r| matches(r, &needle)).collect();

    let ordered: Vec<&Record> = match &state.sort_key {
        Some(key) => {
            let mut decorated: Vec<(SortValue, &Record)> = filtered
                .into_iter()
                .map(|record| (classify(record.get(key)), record))
                .collect();
            decorated.sort_by(|(a, _), (b, _)| {
                let ordering = compare(a, b);
                match state.sort_direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
            decorated.into_iter().map(|(_, record)| record).collect()
        }
        None => filtered,
    };

    let page_size = state.page_size.max(1);
    let total_count = ordered.len();
    let page_count = total_count.div_ceil(page_size).max(1);
    let page_index = state.page_index.clamp(1, page_count);
    let page_items = ordered
        .into_iter()
        .skip((page_index - 1) * page_size)
        .take(page_size)
        .cloned()
        .collect();

    ListPage {
        total_count,
        page_count,
        page_index,
        page_size,
        page_items,
    }
}
