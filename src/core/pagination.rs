use crate::core::errors::ExchangeError;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const BEFORE_HEADER: &str = "CB-BEFORE";
pub const AFTER_HEADER: &str = "CB-AFTER";

pub const MAX_LIMIT: i32 = 100;

/// Cursor pair the server returns out-of-band in the response headers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub before: String,
    pub after: String,
}

impl Page {
    /// Read the cursor headers; both must be present and non-empty
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let value = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Some(Self {
            before: value(BEFORE_HEADER)?,
            after: value(AFTER_HEADER)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }

    /// Parameters that request the page following this one
    pub fn next(&self, limit: i32) -> PaginationParams {
        PaginationParams {
            after: Some(self.after.clone()),
            before: None,
            limit,
        }
    }

    /// Parameters that request the page preceding this one
    pub fn previous(&self, limit: i32) -> PaginationParams {
        PaginationParams {
            before: Some(self.before.clone()),
            after: None,
            limit,
        }
    }
}

/// Result types that can carry a [`Page`] read from the response headers.
///
/// The default implementation discards the page, so types that are never
/// paginated opt in with an empty `impl`.
pub trait Paginated {
    fn set_page(&mut self, _page: Page) {}
}

impl Paginated for serde_json::Value {}
impl<T> Paginated for Vec<T> {}
impl<K, V, S> Paginated for std::collections::HashMap<K, V, S> {}

/// A page of items. On the wire it is a bare JSON array; the cursors arrive in headers.
#[derive(Debug, Clone, PartialEq)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub page: Option<Page>,
}

impl<T> Default for Paged<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            page: None,
        }
    }
}

impl<T> Paged<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

impl<T> Paginated for Paged<T> {
    fn set_page(&mut self, page: Page) {
        self.page = Some(page);
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Paged<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Self {
            items: Vec::<T>::deserialize(deserializer)?,
            page: None,
        })
    }
}

impl<T: Serialize> Serialize for Paged<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.items.serialize(serializer)
    }
}

impl<'a, T> IntoIterator for &'a Paged<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Request-side paging. At most one cursor may be set; a limit of 0 leaves the server default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationParams {
    pub before: Option<String>,
    pub after: Option<String>,
    pub limit: i32,
}

impl PaginationParams {
    pub fn validate(&self) -> Result<(), ExchangeError> {
        if self.before.is_some() && self.after.is_some() {
            return Err(ExchangeError::InvalidParameters(
                "only one of before or after may be set".to_string(),
            ));
        }
        if !(0..=MAX_LIMIT).contains(&self.limit) {
            return Err(ExchangeError::InvalidParameters(format!(
                "limit {} outside of allowed range [0,{}]",
                self.limit, MAX_LIMIT
            )));
        }
        Ok(())
    }
}

impl QueryParams for PaginationParams {
    fn params(&self) -> Vec<String> {
        let mut params = Vec::new();
        if let Some(before) = &self.before {
            params.push(format!("before={}", before));
        }
        if let Some(after) = &self.after {
            params.push(format!("after={}", after));
        }
        if self.limit > 0 {
            params.push(format!("limit={}", self.limit));
        }
        params
    }
}

/// Types that contribute `key=value` fragments to a query string
pub trait QueryParams {
    fn params(&self) -> Vec<String>;
}

/// Render fragments as `?a=1&b=2`, or an empty string when there are none
pub fn query(params: &[String]) -> String {
    if params.is_empty() {
        String::new()
    } else {
        format!("?{}", params.join("&"))
    }
}
