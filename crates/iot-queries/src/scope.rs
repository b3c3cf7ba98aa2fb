//! Request-scoped query state
//!
//! A handler builds one [`RequestScope`] per request and passes it by mutable
//! reference into the repository, which reads the filter group and paginator and
//! writes back the row count. Nothing here is shared between requests.

use std::collections::BTreeMap;

use iot_core::pagination::OffsetPaginator;

use crate::filters::FilterGroup;

/// Header carrying the total row count of a list query
pub const TOTAL_HEADER: &str = "Total";

#[derive(Debug, Clone, Default)]
pub struct RequestScope {
    filter: Option<FilterGroup>,
    pagination: Option<OffsetPaginator>,
    /// Lowercased name -> name as registered
    callbacks: BTreeMap<String, String>,
    headers: Vec<(String, String)>,
}

impl RequestScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, group: FilterGroup) -> Self {
        self.filter = Some(group);
        self
    }

    pub fn with_pagination(mut self, paginator: OffsetPaginator) -> Self {
        self.pagination = Some(paginator);
        self
    }

    /// Accept values for header `name` from the persistence layer
    pub fn with_header_callback(mut self, name: &str) -> Self {
        let name = name.trim();
        if !name.is_empty() {
            self.callbacks
                .insert(name.to_ascii_lowercase(), name.to_string());
        }
        self
    }

    pub fn filter(&self) -> Option<&FilterGroup> {
        self.filter.as_ref()
    }

    pub fn pagination(&self) -> Option<&OffsetPaginator> {
        self.pagination.as_ref()
    }

    /// Record a header value; returns false when no callback accepts `name`
    pub fn set_header(&mut self, name: &str, value: &str) -> bool {
        let value = value.trim();
        let Some(registered) = self.callbacks.get(&name.trim().to_ascii_lowercase()) else {
            return false;
        };
        if value.is_empty() {
            return false;
        }

        match self.headers.iter_mut().find(|(n, _)| n == registered) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.headers.push((registered.clone(), value.to_string())),
        }
        true
    }

    /// Store the counted rows on the paginator and report them as `Total`
    pub fn record_total(&mut self, total: i64) {
        if let Some(paginator) = self.pagination.as_mut() {
            paginator.total = total;
        }
        self.set_header(TOTAL_HEADER, &total.to_string());
    }

    /// Headers recorded through callbacks, in the order they were first written
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}
