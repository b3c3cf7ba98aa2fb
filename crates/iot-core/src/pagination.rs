//! Offset pagination for list endpoints
//!
//! Each endpoint owns one [`PaginationOptions`], built at startup. Per request the
//! options resolve an [`OffsetPaginator`] from the query string; once the
//! persistence layer has counted the matching rows and stored `total`, the
//! options render the RFC 8288 `Link` header and the optional `Pagination-*`
//! headers.

use serde::{Deserialize, Serialize};

pub const DEFAULT_OFFSET_ALIAS: &str = "offset";
pub const DEFAULT_LIMIT_ALIAS: &str = "limit";
pub const DEFAULT_TOTAL_ALIAS: &str = "total";
pub const DEFAULT_MAX_LIMIT: i64 = 100;
pub const DEFAULT_MIN_LIMIT: i64 = 10;
pub const DEFAULT_LIMIT: i64 = 20;
pub const DEFAULT_OFFSET: i64 = 0;
pub const DEFAULT_HEADER_PREFIX: &str = "Pagination";

pub const LINK_HEADER: &str = "Link";

/// Link relation types
pub mod relations {
    pub const NEXT: &str = "next";
    pub const PREVIOUS: &str = "prev";
    pub const FIRST: &str = "first";
    pub const LAST: &str = "last";
}

/// Per-endpoint pagination settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationOptions {
    max_limit: i64,
    min_limit: i64,
    default_limit: i64,
    limit_alias: String,
    offset_alias: String,
    total_alias: String,
    link_header: bool,
    pagination_headers: bool,
    header_prefix: String,
}

impl Default for PaginationOptions {
    fn default() -> Self {
        Self {
            max_limit: DEFAULT_MAX_LIMIT,
            min_limit: DEFAULT_MIN_LIMIT,
            default_limit: DEFAULT_LIMIT,
            limit_alias: DEFAULT_LIMIT_ALIAS.to_string(),
            offset_alias: DEFAULT_OFFSET_ALIAS.to_string(),
            total_alias: DEFAULT_TOTAL_ALIAS.to_string(),
            link_header: true,
            pagination_headers: false,
            header_prefix: DEFAULT_HEADER_PREFIX.to_string(),
        }
    }
}

impl PaginationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum entries per page; non-positive values are ignored
    pub fn max_limit(mut self, max_limit: i64) -> Self {
        if max_limit > 0 {
            self.max_limit = max_limit;
        }
        self
    }

    /// Minimum entries per page; must be positive and below the max limit
    pub fn min_limit(mut self, min_limit: i64) -> Self {
        if min_limit > 0 && min_limit < self.max_limit {
            self.min_limit = min_limit;
        }
        self
    }

    /// Limit used when the request does not carry a usable one
    pub fn default_limit(mut self, default_limit: i64) -> Self {
        if default_limit > 0 {
            self.default_limit = default_limit;
        }
        self
    }

    /// Replace the `limit` query param, e.g. by `per_page`
    pub fn limit_alias(mut self, alias: &str) -> Self {
        if !alias.is_empty() {
            self.limit_alias = alias.trim().to_string();
        }
        self
    }

    /// Replace the `offset` query param, e.g. by `page`
    pub fn offset_alias(mut self, alias: &str) -> Self {
        if !alias.is_empty() {
            self.offset_alias = alias.trim().to_string();
        }
        self
    }

    /// Replace the `total` header suffix, e.g. by `count`
    pub fn total_alias(mut self, alias: &str) -> Self {
        if !alias.is_empty() {
            self.total_alias = alias.to_string();
        }
        self
    }

    pub fn link_header(mut self, enabled: bool) -> Self {
        self.link_header = enabled;
        self
    }

    pub fn pagination_headers(mut self, enabled: bool) -> Self {
        self.pagination_headers = enabled;
        self
    }

    pub fn header_prefix(mut self, prefix: &str) -> Self {
        if !prefix.is_empty() {
            self.header_prefix = prefix.to_string();
        }
        self
    }

    pub fn max(&self) -> i64 {
        self.max_limit
    }

    pub fn min(&self) -> i64 {
        self.min_limit
    }

    pub fn default_page_size(&self) -> i64 {
        self.default_limit
    }

    pub fn limit_param(&self) -> &str {
        &self.limit_alias
    }

    pub fn offset_param(&self) -> &str {
        &self.offset_alias
    }

    /// Only GET and POST requests are paginated
    pub fn applies_to(method: &str) -> bool {
        method.eq_ignore_ascii_case("GET") || method.eq_ignore_ascii_case("POST")
    }

    /// Resolve offset and limit from a raw (still encoded) query string
    pub fn resolve(&self, raw_query: Option<&str>) -> OffsetPaginator {
        let query = raw_query.unwrap_or_default();
        let mut paginator = OffsetPaginator {
            offset: DEFAULT_OFFSET,
            limit: self.default_limit,
            total: 0,
        };

        if let Some(limit) = first_param(query, &self.limit_alias) {
            if let Ok(limit) = limit.parse::<i64>() {
                paginator.limit = self.clamp_limit(limit);
            }
        }

        if let Some(offset) = first_param(query, &self.offset_alias) {
            if let Ok(offset) = offset.parse::<i64>() {
                if offset > 0 {
                    paginator.offset = offset;
                }
            }
        }

        paginator
    }

    fn clamp_limit(&self, limit: i64) -> i64 {
        if limit >= self.max_limit {
            self.max_limit
        } else if limit <= self.min_limit {
            self.min_limit
        } else {
            limit
        }
    }

    /// Render the `Link` header value; `None` when disabled or no relation applies
    pub fn link_header_value(&self, base_url: &str, paginator: &OffsetPaginator) -> Option<String> {
        if !self.link_header {
            return None;
        }

        let mut links = Vec::new();

        if paginator.offset > 1 {
            links.push(self.link(
                base_url,
                paginator.offset.saturating_sub(1),
                paginator.limit,
                relations::PREVIOUS,
            ));
        }

        // Total 0 means unknown, so there may always be a next page
        if paginator.total == 0 || paginator.offset < paginator.total {
            links.push(self.link(
                base_url,
                paginator.offset.saturating_add(1),
                paginator.limit,
                relations::NEXT,
            ));
        }

        if paginator.offset < paginator.total.saturating_sub(1) {
            links.push(self.link(base_url, paginator.total, paginator.limit, relations::LAST));
        }

        if paginator.offset > 1 {
            links.push(self.link(base_url, 1, paginator.limit, relations::FIRST));
        }

        if links.is_empty() {
            None
        } else {
            Some(links.join(","))
        }
    }

    fn link(&self, base_url: &str, offset: i64, limit: i64, relation: &str) -> String {
        format!(
            r#"<{}?{}={}&{}={}>; rel="{}""#,
            base_url, self.offset_alias, offset, self.limit_alias, limit, relation
        )
    }

    /// `Pagination-total`, `Pagination-offset` and `Pagination-limit` when enabled
    pub fn pagination_header_values(&self, paginator: &OffsetPaginator) -> Vec<(String, String)> {
        if !self.pagination_headers {
            return vec![];
        }

        vec![
            (self.header_name(&self.total_alias), paginator.total.to_string()),
            (self.header_name(&self.offset_alias), paginator.offset.to_string()),
            (self.header_name(&self.limit_alias), paginator.limit.to_string()),
        ]
    }

    fn header_name(&self, alias: &str) -> String {
        format!("{}-{}", self.header_prefix, alias)
    }

    /// Every header the paginator contributes to the response
    pub fn response_headers(&self, base_url: &str, paginator: &OffsetPaginator) -> Vec<(String, String)> {
        let mut headers = Vec::new();
        if let Some(link) = self.link_header_value(base_url, paginator) {
            headers.push((LINK_HEADER.to_string(), link));
        }
        headers.extend(self.pagination_header_values(paginator));
        headers
    }
}

fn first_param(query: &str, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Pagination state of the current request
///
/// `offset` and `limit` are fixed before the query runs; `total` is filled in
/// once the row count is known. A `total` of 0 means unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetPaginator {
    pub offset: i64,
    pub limit: i64,
    pub total: i64,
}

impl OffsetPaginator {
    pub fn new(offset: i64, limit: i64) -> Self {
        Self {
            offset,
            limit,
            total: 0,
        }
    }
}
