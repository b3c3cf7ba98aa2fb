//! Query filters
//!
//! A request carries zero or more `filters=field:op:value` parameters. Each one
//! is checked against the endpoint's [`FilterWhitelist`]: the field must be
//! declared, the operation known, and the operation valid for the field's
//! declared value type. Every problem found is reported; a [`FilterGroup`] is
//! only produced when there are none.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use iot_core::error::{FilterError, ValidationErrors};

use crate::sorts::{self, join_names, SortDirection};

pub const FILTER_QUERY_PARAM: &str = "filters";

/// Filter operations accepted in the `op` part of a filter token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperation {
    /// `eq`
    Equals,
    /// `ne`, NULL rows also match
    NotEquals,
    /// `in`, comma separated values
    In,
    /// `like`, case-insensitive substring match
    Like,
    /// `gt`
    Greater,
    /// `ge`
    GreaterOrEqual,
    /// `lt`
    Lower,
    /// `le`
    LowerOrEqual,
    /// Anything else
    Unknown,
}

impl FilterOperation {
    pub const TOKENS: [&'static str; 8] = ["eq", "ne", "in", "like", "gt", "ge", "lt", "le"];

    pub fn from_token(s: &str) -> Self {
        match s {
            "eq" => Self::Equals,
            "ne" => Self::NotEquals,
            "in" => Self::In,
            "like" => Self::Like,
            "gt" => Self::Greater,
            "ge" => Self::GreaterOrEqual,
            "lt" => Self::Lower,
            "le" => Self::LowerOrEqual,
            _ => Self::Unknown,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            Self::Equals => "eq",
            Self::NotEquals => "ne",
            Self::In => "in",
            Self::Like => "like",
            Self::Greater => "gt",
            Self::GreaterOrEqual => "ge",
            Self::Lower => "lt",
            Self::LowerOrEqual => "le",
            Self::Unknown => "unknown",
        }
    }

    /// Operation/type compatibility matrix
    pub fn is_allowed_for(&self, value_type: FilterValueType) -> bool {
        match self {
            Self::Equals | Self::NotEquals => true,
            Self::Like | Self::In => value_type == FilterValueType::String,
            Self::Greater | Self::GreaterOrEqual | Self::Lower | Self::LowerOrEqual => {
                matches!(value_type, FilterValueType::Int | FilterValueType::Float)
            }
            Self::Unknown => false,
        }
    }
}

/// Declared type of a filterable field's value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterValueType {
    String,
    StringList,
    Int,
    Float,
    Bool,
}

impl FilterValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::StringList => "string list",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
        }
    }
}

impl fmt::Display for FilterValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declaration of one filterable field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterDefinition {
    pub value_type: FilterValueType,
}

impl FilterDefinition {
    pub fn new(value_type: FilterValueType) -> Self {
        Self { value_type }
    }
}

/// One parsed predicate; `field` is the exposed name, never a column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: String,
    pub operation: FilterOperation,
    pub value: String,
    pub value_type: FilterValueType,
}

impl Filter {
    pub fn new(
        field: impl Into<String>,
        operation: FilterOperation,
        value: impl Into<String>,
        value_type: FilterValueType,
    ) -> Self {
        Self {
            field: field.into(),
            operation,
            value: value.into(),
            value_type,
        }
    }
}

/// Validated filters and ordering of a single request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterGroup {
    filters: Vec<Filter>,
    order: Option<String>,
    direction: SortDirection,
}

impl FilterGroup {
    pub fn new(filters: Vec<Filter>, order: Option<String>, direction: SortDirection) -> Self {
        Self {
            filters,
            order: order.filter(|o| !o.is_empty()),
            direction,
        }
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Exposed name of the order field, if any
    pub fn order(&self) -> Option<&str> {
        self.order.as_deref()
    }

    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    pub fn is_descending(&self) -> bool {
        self.direction.is_descending()
    }
}

/// Per-endpoint declaration of filterable and orderable fields
#[derive(Debug, Clone, Default)]
pub struct FilterWhitelist {
    definitions: BTreeMap<String, FilterDefinition>,
    orderable: BTreeSet<String>,
}

impl FilterWhitelist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a filterable field
    pub fn filter(mut self, field: impl Into<String>, value_type: FilterValueType) -> Self {
        self.definitions
            .insert(field.into(), FilterDefinition::new(value_type));
        self
    }

    /// Declare orderable fields
    pub fn orderable<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.orderable.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn definition(&self, field: &str) -> Option<&FilterDefinition> {
        self.definitions.get(field)
    }

    pub fn is_orderable(&self, field: &str) -> bool {
        self.orderable.contains(field)
    }

    /// Parse and validate the filter and order parameters of a raw query string
    pub fn parse(&self, raw_query: Option<&str>) -> Result<FilterGroup, ValidationErrors> {
        let raw_query = raw_query.unwrap_or_default();
        let mut errors = ValidationErrors::new();

        let filters: Vec<Filter> = filter_tokens(raw_query)
            .filter_map(|token| self.parse_token(token, &mut errors))
            .collect();

        let order = sorts::parse_order(raw_query, &self.orderable, &mut errors);

        if !errors.is_empty() {
            tracing::debug!(problems = errors.len(), "rejected filter parameters");
        }

        errors.into_result(FilterGroup::new(filters, order.field, order.direction))
    }

    fn parse_token(&self, token: &str, errors: &mut ValidationErrors) -> Option<Filter> {
        let parts: Vec<&str> = token.split(':').collect();
        let [field, operation, raw_value] = parts[..] else {
            errors.push(FilterError::Malformed {
                token: token.to_string(),
            });
            return None;
        };

        let value = match decode_value(raw_value) {
            Some(value) => value,
            None => {
                errors.push(FilterError::InvalidValue {
                    value: raw_value.to_string(),
                });
                return None;
            }
        };

        let Some(definition) = self.definitions.get(field) else {
            errors.push(FilterError::UnknownField {
                field: field.to_string(),
                allowed: join_names(self.definitions.keys()),
            });
            return None;
        };

        let filter = Filter::new(
            field,
            FilterOperation::from_token(operation),
            value,
            definition.value_type,
        );

        if filter.operation == FilterOperation::Unknown {
            errors.push(FilterError::UnknownOperation {
                operation: operation.to_string(),
                allowed: FilterOperation::TOKENS.join(", "),
            });
        } else if !filter.operation.is_allowed_for(filter.value_type) {
            errors.push(FilterError::OperationNotAllowed {
                operation: operation.to_string(),
                value_type: filter.value_type.to_string(),
            });
        }

        Some(filter)
    }
}

/// Raw `field:op:value` tokens of every `filters=` parameter, in request order
fn filter_tokens(raw_query: &str) -> impl Iterator<Item = &str> {
    raw_query
        .split('&')
        .filter_map(|pair| pair.strip_prefix(FILTER_QUERY_PARAM)?.strip_prefix('='))
}

/// Undo query-string escaping on a filter value; `None` on a bad escape or invalid UTF-8
fn decode_value(raw: &str) -> Option<String> {
    if !has_valid_escapes(raw) {
        return None;
    }
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced).ok().map(|v| v.into_owned())
}

/// Every `%` must start a two hex digit escape
fn has_valid_escapes(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            match bytes.get(i + 1..i + 3) {
                Some([hi, lo]) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => i += 3,
                _ => return false,
            }
        } else {
            i += 1;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn whitelist() -> FilterWhitelist {
        FilterWhitelist::new()
            .filter("id", FilterValueType::String)
            .filter("type", FilterValueType::String)
            .filter("rate", FilterValueType::Int)
            .filter("threshold", FilterValueType::Float)
            .filter("active", FilterValueType::Bool)
            .filter("tags", FilterValueType::StringList)
            .orderable(["id", "type", "updatedAt"])
    }

    #[test]
    fn test_filter_operation_parsing() {
        assert_eq!(FilterOperation::from_token("eq"), FilterOperation::Equals);
        assert_eq!(FilterOperation::from_token("ne"), FilterOperation::NotEquals);
        assert_eq!(FilterOperation::from_token("like"), FilterOperation::Like);
        assert_eq!(FilterOperation::from_token("le"), FilterOperation::LowerOrEqual);
        assert_eq!(FilterOperation::from_token("EQ"), FilterOperation::Unknown);
        assert_eq!(FilterOperation::from_token("between"), FilterOperation::Unknown);
    }

    #[test]
    fn test_operation_type_matrix() {
        use FilterOperation::*;
        use FilterValueType as T;

        let all_types = [T::String, T::StringList, T::Int, T::Float, T::Bool];

        for t in all_types {
            assert!(Equals.is_allowed_for(t));
            assert!(NotEquals.is_allowed_for(t));
            assert!(!Unknown.is_allowed_for(t));
            assert_eq!(Like.is_allowed_for(t), t == T::String);
            assert_eq!(In.is_allowed_for(t), t == T::String);
            for op in [Greater, GreaterOrEqual, Lower, LowerOrEqual] {
                assert_eq!(op.is_allowed_for(t), t == T::Int || t == T::Float);
            }
        }
    }

    #[test]
    fn test_parse_single_filter() {
        let group = whitelist()
            .parse(Some("filters=type:eq:temperature"))
            .unwrap();

        assert_eq!(
            group.filters(),
            &[Filter::new(
                "type",
                FilterOperation::Equals,
                "temperature",
                FilterValueType::String
            )]
        );
        assert_eq!(group.order(), None);
        assert!(!group.is_descending());
    }

    #[test]
    fn test_value_is_url_decoded() {
        let group = whitelist()
            .parse(Some("filters=id:like:north%3Awing+2%25"))
            .unwrap();

        assert_eq!(group.filters()[0].value, "north:wing 2%");
        assert_eq!(group.filters()[0].operation, FilterOperation::Like);
    }

    #[test]
    fn test_bad_escape_is_an_invalid_value() {
        let errors = whitelist()
            .parse(Some("filters=id:eq:50%zz&filters=type:eq:ab%2&filters=rate:gt:%35"))
            .unwrap_err();

        assert_eq!(
            errors.errors(),
            &[
                FilterError::InvalidValue {
                    value: "50%zz".into()
                },
                FilterError::InvalidValue {
                    value: "ab%2".into()
                },
            ]
        );
    }

    #[test]
    fn test_filters_keep_request_order() {
        let group = whitelist()
            .parse(Some(
                "limit=10&filters=rate:gt:5&sort=type&filters=type:in:a,b&order=desc",
            ))
            .unwrap();

        let fields: Vec<&str> = group.filters().iter().map(|f| f.field.as_str()).collect();
        assert_eq!(fields, vec!["rate", "type"]);
        assert_eq!(group.order(), Some("type"));
        assert!(group.is_descending());
    }

    #[test]
    fn test_no_query_yields_empty_group() {
        let group = whitelist().parse(None).unwrap();
        assert!(group.is_empty());
        assert_eq!(group.order(), None);
    }

    #[test]
    fn test_malformed_tokens() {
        for token in ["type", "type:eq", "type:eq:a:b", ""] {
            let query = format!("filters={}", token);
            let errors = whitelist().parse(Some(&query)).unwrap_err();

            assert_eq!(
                errors.errors(),
                &[FilterError::Malformed {
                    token: token.to_string()
                }]
            );
        }
    }

    #[test]
    fn test_unknown_field_lists_allowed_fields() {
        let errors = whitelist()
            .parse(Some("filters=colour:eq:red"))
            .unwrap_err();

        assert_eq!(
            errors.errors(),
            &[FilterError::UnknownField {
                field: "colour".into(),
                allowed: "active, id, rate, tags, threshold, type".into(),
            }]
        );
    }

    #[test]
    fn test_unknown_operation() {
        let errors = whitelist().parse(Some("filters=type:near:x")).unwrap_err();

        assert_eq!(
            errors.errors(),
            &[FilterError::UnknownOperation {
                operation: "near".into(),
                allowed: "eq, ne, in, like, gt, ge, lt, le".into(),
            }]
        );
    }

    #[test]
    fn test_operation_not_allowed_for_type() {
        let errors = whitelist()
            .parse(Some("filters=rate:like:5&filters=active:gt:true"))
            .unwrap_err();

        assert_eq!(
            errors.errors(),
            &[
                FilterError::OperationNotAllowed {
                    operation: "like".into(),
                    value_type: "int".into(),
                },
                FilterError::OperationNotAllowed {
                    operation: "gt".into(),
                    value_type: "bool".into(),
                },
            ]
        );
    }

    #[test]
    fn test_all_errors_are_reported_together() {
        let errors = whitelist()
            .parse(Some(
                "filters=bad&filters=type:eq:ok&filters=colour:eq:red&sort=rate&order=sideways",
            ))
            .unwrap_err();

        assert_eq!(errors.len(), 4);
        assert!(matches!(errors.errors()[0], FilterError::Malformed { .. }));
        assert!(matches!(errors.errors()[1], FilterError::UnknownField { .. }));
        assert!(matches!(errors.errors()[2], FilterError::OrderNotAllowed { .. }));
        assert!(matches!(errors.errors()[3], FilterError::InvalidDirection { .. }));
    }

    #[test]
    fn test_similar_param_names_are_not_filters() {
        let group = whitelist()
            .parse(Some("filtersx=type:eq:a&myfilters=type:eq:b"))
            .unwrap();
        assert!(group.is_empty());
    }
}
