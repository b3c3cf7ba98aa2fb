//! Query sort orders
//!
//! `sort=<field>` names an orderable field, `order=asc|desc` the direction.
//! Both are optional; an empty value means unspecified.

use std::collections::BTreeSet;

use iot_core::error::{FilterError, ValidationErrors};

pub const SORT_QUERY_PARAM: &str = "sort";
pub const ORDER_QUERY_PARAM: &str = "order";

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Ascending order, NULLs first
    #[default]
    Asc,
    /// Descending order, NULLs last
    Desc,
}

impl SortDirection {
    /// Parse the literal query-string values
    pub fn from_param(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    /// SQL direction together with its NULL placement
    pub fn sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC NULLS FIRST",
            Self::Desc => "DESC NULLS LAST",
        }
    }

    pub fn is_descending(&self) -> bool {
        matches!(self, Self::Desc)
    }
}

/// Validated order request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderSpec {
    pub field: Option<String>,
    pub direction: SortDirection,
}

/// Read `sort` and `order` from a raw query string, collecting problems into `errors`
pub fn parse_order(
    raw_query: &str,
    orderable: &BTreeSet<String>,
    errors: &mut ValidationErrors,
) -> OrderSpec {
    let field = query_param(raw_query, SORT_QUERY_PARAM);
    let direction = query_param(raw_query, ORDER_QUERY_PARAM);

    if !field.is_empty() && !orderable.contains(&field) {
        errors.push(FilterError::OrderNotAllowed {
            field: field.clone(),
            allowed: join_names(orderable.iter()),
        });
    }

    let parsed_direction = if direction.is_empty() {
        SortDirection::Asc
    } else {
        match SortDirection::from_param(&direction) {
            Some(d) => d,
            None => {
                errors.push(FilterError::InvalidDirection { direction });
                SortDirection::Asc
            }
        }
    };

    OrderSpec {
        field: if field.is_empty() { None } else { Some(field) },
        direction: parsed_direction,
    }
}

/// First decoded value of `name`, or an empty string
pub(crate) fn query_param(raw_query: &str, name: &str) -> String {
    url::form_urlencoded::parse(raw_query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default()
}

pub(crate) fn join_names<'a>(names: impl Iterator<Item = &'a String>) -> String {
    names.map(String::as_str).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orderable() -> BTreeSet<String> {
        ["id", "type", "updatedAt"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sort_direction() {
        assert_eq!(SortDirection::from_param("asc"), Some(SortDirection::Asc));
        assert_eq!(SortDirection::from_param("desc"), Some(SortDirection::Desc));
        assert_eq!(SortDirection::from_param("DESC"), None);
        assert_eq!(SortDirection::Desc.sql(), "DESC NULLS LAST");
        assert_eq!(SortDirection::Asc.sql(), "ASC NULLS FIRST");
    }

    #[test]
    fn test_parse_order() {
        let mut errors = ValidationErrors::new();
        let spec = parse_order("sort=updatedAt&order=desc", &orderable(), &mut errors);

        assert!(errors.is_empty());
        assert_eq!(spec.field.as_deref(), Some("updatedAt"));
        assert!(spec.direction.is_descending());
    }

    #[test]
    fn test_empty_order_is_unspecified() {
        let mut errors = ValidationErrors::new();
        let spec = parse_order("sort=&order=", &orderable(), &mut errors);

        assert!(errors.is_empty());
        assert_eq!(spec, OrderSpec::default());
    }

    #[test]
    fn test_order_errors_accumulate() {
        let mut errors = ValidationErrors::new();
        parse_order("sort=rate&order=up", &orderable(), &mut errors);

        assert_eq!(
            errors.errors(),
            &[
                FilterError::OrderNotAllowed {
                    field: "rate".into(),
                    allowed: "id, type, updatedAt".into(),
                },
                FilterError::InvalidDirection {
                    direction: "up".into()
                },
            ]
        );
    }
}
