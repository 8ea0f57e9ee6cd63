//! Input parameters for the list endpoints.
//!
//! Query strings follow the JSON:API conventions: `page[...]` selects the
//! pagination mode, `filter[field]` / `filter[field][op]` restrict the result
//! set and `sort` orders it. [`PageRequest::from_query`] is the mode router:
//! it validates the raw pairs and decides between offset and cursor paging
//! without touching storage.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::PageError;

pub const PAGE_NUMBER: &str = "page[number]";
pub const PAGE_SIZE: &str = "page[size]";
pub const PAGE_AFTER: &str = "page[after]";
pub const PAGE_BEFORE: &str = "page[before]";
pub const SORT: &str = "sort";

const PAGE_PREFIX: &str = "page[";
const FILTER_PREFIX: &str = "filter[";

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 1000;

#[derive(Debug, Error)]
#[error("invalid page limits: {0}")]
pub struct PageLimitsError(String);

/// Page size bounds, supplied from configuration at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    default_size: u64,
    max_size: u64,
}

impl PageLimits {
    pub fn new(default_size: u64, max_size: u64) -> Result<Self, PageLimitsError> {
        if default_size == 0 {
            return Err(PageLimitsError("default page size must be at least 1".into()));
        }
        if default_size > max_size {
            return Err(PageLimitsError(format!(
                "default page size {default_size} exceeds maximum {max_size}"
            )));
        }
        Ok(Self {
            default_size,
            max_size,
        })
    }

    pub fn default_size(&self) -> u64 {
        self.default_size
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Clamp a requested size into `[1, max_size]`.
    pub fn clamp(&self, requested: Option<i64>) -> u64 {
        match requested {
            None => self.default_size,
            Some(n) if n < 1 => 1,
            Some(n) => (n as u64).min(self.max_size),
        }
    }
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_size: DEFAULT_PAGE_SIZE,
            max_size: MAX_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn reverse(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortParam {
    pub field: String,
    pub direction: SortDirection,
}

impl SortParam {
    /// Parse a `sort` value such as `-created_at,subject_id`.
    ///
    /// An empty value means "no explicit sort".
    pub fn parse_list(raw: &str) -> Result<Vec<SortParam>, PageError> {
        if raw.trim().is_empty() {
            return Ok(vec![]);
        }

        let mut out: Vec<SortParam> = Vec::new();
        for segment in raw.split(',') {
            let segment = segment.trim();
            let (field, direction) = match segment.strip_prefix('-') {
                Some(field) => (field.trim(), SortDirection::Desc),
                None => (segment, SortDirection::Asc),
            };

            if field.is_empty() {
                return Err(PageError::InvalidSort(format!("empty sort field in '{raw}'")));
            }
            if out.iter().any(|s| s.field == field) {
                return Err(PageError::InvalidSort(format!(
                    "field '{field}' appears more than once"
                )));
            }

            out.push(SortParam {
                field: field.to_string(),
                direction,
            });
        }

        Ok(out)
    }
}

impl Display for SortParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.direction {
            SortDirection::Asc => write!(f, "{}", self.field),
            SortDirection::Desc => write!(f, "-{}", self.field),
        }
    }
}

/// A single `filter[field]=value` or `filter[field][op]=value` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterParam {
    pub field: String,
    pub op: Option<String>,
    pub value: String,
}

impl FilterParam {
    /// Parse the part of the key after `filter[`, e.g. `sex]` or
    /// `created_at][gte]`.
    fn parse(key: &str, rest: &str, value: &str) -> Result<Self, PageError> {
        let malformed = || PageError::invalid_filter(key, "malformed filter parameter");

        let (field, op) = match rest.split_once("][") {
            Some((field, op)) => (field, Some(op.strip_suffix(']').ok_or_else(malformed)?)),
            None => (rest.strip_suffix(']').ok_or_else(malformed)?, None),
        };

        if op.is_some_and(|op| op.is_empty() || op.contains(['[', ']'])) || field.contains('[') {
            return Err(malformed());
        }

        Ok(Self {
            field: field.to_string(),
            op: op.map(str::to_string),
            value: value.to_string(),
        })
    }
}

/// Where a cursor-mode request starts. `None` means the parameter was given
/// with an empty value: `page[after]=` starts at the first record and
/// `page[before]=` at the last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorPosition {
    After(Option<String>),
    Before(Option<String>),
}

impl CursorPosition {
    pub fn token(&self) -> Option<&str> {
        match self {
            CursorPosition::After(t) | CursorPosition::Before(t) => t.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageMode {
    Offset { number: u64 },
    Cursor(CursorPosition),
}

/// A validated list request. Built once per call from the query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub mode: PageMode,
    pub size: u64,
    pub filters: Vec<FilterParam>,
    pub sort: Vec<SortParam>,
}

impl PageRequest {
    /// Route a request to offset or cursor mode.
    ///
    /// `page[after]` / `page[before]` select cursor mode, `page[number]`
    /// selects offset mode, and the default is offset mode on page 1. Mixing
    /// the two families is rejected. Parameters outside `page[...]`,
    /// `filter[...]` and `sort` are ignored here.
    pub fn from_query(pairs: &[(String, String)], limits: &PageLimits) -> Result<Self, PageError> {
        let mut number: Option<&str> = None;
        let mut size: Option<&str> = None;
        let mut after: Option<&str> = None;
        let mut before: Option<&str> = None;
        let mut sort: Option<&str> = None;
        let mut filters = Vec::new();

        for (key, value) in pairs {
            if let Some(rest) = key.strip_prefix(PAGE_PREFIX) {
                let slot = match rest {
                    "number]" => &mut number,
                    "size]" => &mut size,
                    "after]" => &mut after,
                    "before]" => &mut before,
                    _ => {
                        return Err(PageError::invalid_params(format!(
                            "unknown pagination parameter '{key}'"
                        )));
                    }
                };
                if slot.replace(value.as_str()).is_some() {
                    return Err(PageError::invalid_params(format!("'{key}' given more than once")));
                }
            } else if let Some(rest) = key.strip_prefix(FILTER_PREFIX) {
                filters.push(FilterParam::parse(key, rest, value)?);
            } else if key == SORT && sort.replace(value.as_str()).is_some() {
                return Err(PageError::InvalidSort("'sort' given more than once".into()));
            }
        }

        let mode = match (number, after, before) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                return Err(PageError::invalid_params(
                    "page[number] cannot be combined with page[after] or page[before]",
                ));
            }
            (None, Some(_), Some(_)) => {
                return Err(PageError::invalid_params(
                    "page[after] and page[before] are mutually exclusive",
                ));
            }
            (None, Some(token), None) => PageMode::Cursor(CursorPosition::After(non_empty(token))),
            (None, None, Some(token)) => PageMode::Cursor(CursorPosition::Before(non_empty(token))),
            (Some(raw), None, None) => PageMode::Offset {
                number: parse_page_number(raw)?,
            },
            (None, None, None) => PageMode::Offset { number: 1 },
        };

        let size = match size {
            Some(raw) => limits.clamp(Some(parse_page_size(raw)?)),
            None => limits.clamp(None),
        };

        let sort = match sort {
            Some(raw) => SortParam::parse_list(raw)?,
            None => vec![],
        };

        Ok(Self {
            mode,
            size,
            filters,
            sort,
        })
    }
}

fn non_empty(token: &str) -> Option<String> {
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Integers outside the `i64` range saturate instead of being rejected.
fn parse_page_size(raw: &str) -> Result<i64, PageError> {
    let trimmed = raw.trim();
    let negative = trimmed.starts_with('-');
    let digits = trimmed.strip_prefix(['-', '+']).unwrap_or(trimmed);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PageError::invalid_params(format!(
            "page[size] must be an integer, got '{raw}'"
        )));
    }
    Ok(trimmed
        .parse::<i64>()
        .unwrap_or(if negative { i64::MIN } else { i64::MAX }))
}

fn parse_page_number(raw: &str) -> Result<u64, PageError> {
    match raw.trim().parse::<u64>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(PageError::invalid_params(format!(
            "page[number] must be an integer >= 1, got '{raw}'"
        ))),
    }
}
