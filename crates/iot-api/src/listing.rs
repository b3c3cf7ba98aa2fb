//! Per-endpoint filter and pagination settings for list routes
//!
//! Built once at startup; each list request opens a [`RequestScope`] from them
//! and turns the finished scope into response headers.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use iot_core::config::AppConfig;
use iot_core::pagination::PaginationOptions;
use iot_queries::scope::TOTAL_HEADER;
use iot_queries::{FilterValueType, FilterWhitelist, RequestScope};

use crate::error::ApiResult;
use crate::extractors::ListRequest;

/// Filters and pagination accepted by one list endpoint
#[derive(Debug, Clone)]
pub struct ListEndpoint {
    pub whitelist: FilterWhitelist,
    pub pagination: PaginationOptions,
    /// Scheme used in `Link` targets
    pub scheme: String,
}

impl ListEndpoint {
    /// Validate the request's filters and resolve its pagination
    pub fn begin(&self, request: &ListRequest) -> ApiResult<RequestScope> {
        let query = request.query.as_deref();
        let group = self.whitelist.parse(query)?;

        let mut scope = RequestScope::new()
            .with_filter(group)
            .with_header_callback(TOTAL_HEADER);

        if PaginationOptions::applies_to(request.method.as_str()) {
            scope = scope.with_pagination(self.pagination.resolve(query));
        }

        Ok(scope)
    }

    /// Headers recorded on the scope plus the pagination headers
    pub fn finish(&self, request: &ListRequest, scope: &RequestScope) -> HeaderMap {
        let mut pairs: Vec<(String, String)> = scope.headers().to_vec();
        if let Some(paginator) = scope.pagination() {
            pairs.extend(
                self.pagination
                    .response_headers(&self.base_url(request), paginator),
            );
        }

        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            match (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => tracing::warn!(header = %name, "skipping unrepresentable response header"),
            }
        }
        headers
    }

    /// Own URL of the resource, without query string
    fn base_url(&self, request: &ListRequest) -> String {
        match &request.host {
            Some(host) => format!("{}://{}{}", self.scheme, host, request.path),
            None => request.path.clone(),
        }
    }
}

/// Settings of every list endpoint
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub sensors: ListEndpoint,
    pub metrics: ListEndpoint,
}

impl Endpoints {
    pub fn from_config(config: &AppConfig) -> Self {
        let scheme = config.server.scheme.clone();

        Self {
            sensors: ListEndpoint {
                whitelist: FilterWhitelist::new()
                    .filter("id", FilterValueType::String)
                    .filter("type", FilterValueType::String)
                    .filter("alias", FilterValueType::String)
                    .orderable(["id", "type", "alias", "updatedAt"]),
                pagination: PaginationOptions::new()
                    .max_limit(config.pagination.sensors_max_limit),
                scheme: scheme.clone(),
            },
            metrics: ListEndpoint {
                whitelist: FilterWhitelist::new()
                    .filter("sensorId", FilterValueType::String)
                    .filter("timestamp", FilterValueType::Int)
                    .orderable(["value", "timestamp"]),
                pagination: PaginationOptions::new()
                    .max_limit(config.pagination.metrics_max_limit),
                scheme,
            },
        }
    }
}
