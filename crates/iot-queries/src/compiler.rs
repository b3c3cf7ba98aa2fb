//! Predicate-to-SQL compiler
//!
//! Renders a [`FilterGroup`] into a WHERE fragment and an ORDER BY fragment.
//! Column names come exclusively from the endpoint's [`ColumnMap`]; client
//! values only ever travel as bound parameters.

use std::collections::HashMap;

use iot_core::error::{FilterError, ValidationErrors};

use crate::filters::{Filter, FilterGroup, FilterOperation, FilterValueType};

/// Parameter for prepared statements
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    TextArray(Vec<String>),
}

/// Mapping from exposed field names to real column identifiers
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    where_columns: HashMap<String, String>,
    order_columns: HashMap<String, String>,
}

impl ColumnMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Column used when filtering by `field`
    pub fn filter(mut self, field: impl Into<String>, column: impl Into<String>) -> Self {
        self.where_columns.insert(field.into(), column.into());
        self
    }

    /// Column used when ordering by `field`
    pub fn order(mut self, field: impl Into<String>, column: impl Into<String>) -> Self {
        self.order_columns.insert(field.into(), column.into());
        self
    }

    pub fn where_column(&self, field: &str) -> Option<&str> {
        self.where_columns.get(field).map(String::as_str)
    }

    pub fn order_column(&self, field: &str) -> Option<&str> {
        self.order_columns.get(field).map(String::as_str)
    }
}

/// Highest `$N` placeholder index already present in `sql`, 0 when there is none
pub fn last_param_index(sql: &str) -> usize {
    let bytes = sql.as_bytes();
    let mut last = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }
        i += 1;
        let mut index = 0usize;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            index = index.saturating_mul(10).saturating_add((bytes[i] - b'0') as usize);
            i += 1;
        }
        last = last.max(index);
    }

    last
}

/// Convert a filter value into the parameter bound for it
pub fn coerce(filter: &Filter) -> Result<SqlParam, FilterError> {
    let coercion_error = |expected: &'static str| FilterError::Coercion {
        value: filter.value.clone(),
        expected,
    };

    match filter.value_type {
        FilterValueType::String => Ok(match filter.operation {
            FilterOperation::In => SqlParam::TextArray(split_list(&filter.value)),
            FilterOperation::Like => SqlParam::Text(escape_like(&filter.value)),
            _ => SqlParam::Text(filter.value.clone()),
        }),
        FilterValueType::StringList => Ok(SqlParam::TextArray(split_list(&filter.value))),
        FilterValueType::Int => filter
            .value
            .parse::<i64>()
            .map(SqlParam::Int)
            .map_err(|_| coercion_error("int")),
        FilterValueType::Float => filter
            .value
            .parse::<f64>()
            .map(SqlParam::Float)
            .map_err(|_| coercion_error("float")),
        FilterValueType::Bool => parse_bool(&filter.value)
            .map(SqlParam::Bool)
            .ok_or_else(|| coercion_error("bool")),
    }
}

/// Render one predicate against placeholder `$index`
pub fn predicate(column: &str, operation: FilterOperation, index: usize) -> Option<String> {
    let sql = match operation {
        FilterOperation::Equals => format!("{}=${}", column, index),
        FilterOperation::NotEquals => format!("(NOT {}=${} OR {} IS NULL)", column, index, column),
        FilterOperation::Like => format!("{} ILIKE '%' || ${} || '%' ESCAPE '\\'", column, index),
        FilterOperation::In => format!("{} = ANY(${})", column, index),
        FilterOperation::Greater => format!("{} > ${}", column, index),
        FilterOperation::GreaterOrEqual => format!("{} >= ${}", column, index),
        FilterOperation::Lower => format!("{} < ${}", column, index),
        FilterOperation::LowerOrEqual => format!("{} <= ${}", column, index),
        FilterOperation::Unknown => return None,
    };
    Some(sql)
}

/// Compiled WHERE fragment with the parameters it references
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereFragment {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl WhereFragment {
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// Build the WHERE fragment, numbering placeholders from `last_param + 1`
///
/// Filters without a column in `columns` are skipped. Every coercion failure is
/// reported; no fragment is returned if there was any.
pub fn compile_where(
    group: &FilterGroup,
    columns: &ColumnMap,
    last_param: usize,
) -> Result<WhereFragment, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let mut predicates = Vec::new();
    let mut params = Vec::new();

    for filter in group.filters() {
        let Some(column) = columns.where_column(&filter.field) else {
            tracing::trace!(field = %filter.field, "filter has no column in this query, skipping");
            continue;
        };

        let param = match coerce(filter) {
            Ok(param) => param,
            Err(e) => {
                errors.push(e);
                continue;
            }
        };

        let index = last_param + params.len() + 1;
        match predicate(column, filter.operation, index) {
            Some(sql) => {
                predicates.push(sql);
                params.push(param);
            }
            None => errors.push(FilterError::UnknownOperation {
                operation: filter.operation.token().to_string(),
                allowed: FilterOperation::TOKENS.join(", "),
            }),
        }
    }

    errors.into_result(WhereFragment {
        sql: predicates.join(" AND "),
        params,
    })
}

/// Build the ORDER BY fragment (without the keyword)
pub fn compile_order(group: &FilterGroup, columns: &ColumnMap) -> Option<String> {
    let column = columns.order_column(group.order()?)?;
    Some(format!("{} {}", column, group.direction().sql()))
}

/// Escape LIKE wildcards so the value matches literally
pub fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',').map(str::to_string).collect()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sorts::SortDirection;

    fn columns() -> ColumnMap {
        ColumnMap::new()
            .filter("sensorId", "sensor_id")
            .filter("type", "type")
            .filter("rate", "rate")
            .filter("value", "value")
            .filter("active", "active")
            .filter("tags", "tags")
            .order("updatedAt", "updated_at")
    }

    fn group(filters: Vec<Filter>) -> FilterGroup {
        FilterGroup::new(filters, None, SortDirection::Asc)
    }

    #[test]
    fn test_last_param_index() {
        assert_eq!(last_param_index("SELECT 1"), 0);
        assert_eq!(last_param_index("UPDATE devices SET type=$2 WHERE id=$1"), 2);
        assert_eq!(last_param_index("VALUES ($1, $2, $10, $3)"), 10);
        assert_eq!(last_param_index("SELECT '$' || name FROM t"), 0);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("test"), "test");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("c:\\temp"), "c:\\\\temp");
    }

    #[test]
    fn test_predicates() {
        use FilterOperation::*;

        assert_eq!(predicate("type", Equals, 1).unwrap(), "type=$1");
        assert_eq!(
            predicate("alias", NotEquals, 2).unwrap(),
            "(NOT alias=$2 OR alias IS NULL)"
        );
        assert_eq!(
            predicate("alias", Like, 3).unwrap(),
            "alias ILIKE '%' || $3 || '%' ESCAPE '\\'"
        );
        assert_eq!(predicate("type", In, 4).unwrap(), "type = ANY($4)");
        assert_eq!(predicate("rate", Greater, 5).unwrap(), "rate > $5");
        assert_eq!(predicate("rate", GreaterOrEqual, 6).unwrap(), "rate >= $6");
        assert_eq!(predicate("rate", Lower, 7).unwrap(), "rate < $7");
        assert_eq!(predicate("rate", LowerOrEqual, 8).unwrap(), "rate <= $8");
        assert_eq!(predicate("rate", Unknown, 9), None);
    }

    #[test]
    fn test_coercion() {
        let like = Filter::new("type", FilterOperation::Like, "50%_off", FilterValueType::String);
        assert_eq!(coerce(&like).unwrap(), SqlParam::Text("50\\%\\_off".into()));

        let any = Filter::new("type", FilterOperation::In, "a,b", FilterValueType::String);
        assert_eq!(
            coerce(&any).unwrap(),
            SqlParam::TextArray(vec!["a".into(), "b".into()])
        );

        let rate = Filter::new("rate", FilterOperation::Greater, "42", FilterValueType::Int);
        assert_eq!(coerce(&rate).unwrap(), SqlParam::Int(42));

        let value = Filter::new("value", FilterOperation::Lower, "-1.5", FilterValueType::Float);
        assert_eq!(coerce(&value).unwrap(), SqlParam::Float(-1.5));

        let active = Filter::new("active", FilterOperation::Equals, "T", FilterValueType::Bool);
        assert_eq!(coerce(&active).unwrap(), SqlParam::Bool(true));
    }

    #[test]
    fn test_compile_where_numbers_after_existing_params() {
        let group = group(vec![
            Filter::new("type", FilterOperation::Equals, "humidity", FilterValueType::String),
            Filter::new("rate", FilterOperation::GreaterOrEqual, "10", FilterValueType::Int),
        ]);

        let fragment = compile_where(&group, &columns(), 2).unwrap();
        assert_eq!(fragment.sql, "type=$3 AND rate >= $4");
        assert_eq!(
            fragment.params,
            vec![SqlParam::Text("humidity".into()), SqlParam::Int(10)]
        );
    }

    #[test]
    fn test_compile_where_skips_unmapped_fields() {
        let group = group(vec![
            Filter::new("alias", FilterOperation::Equals, "north", FilterValueType::String),
            Filter::new("type", FilterOperation::NotEquals, "pressure", FilterValueType::String),
        ]);

        let fragment = compile_where(&group, &columns(), 0).unwrap();
        assert_eq!(fragment.sql, "(NOT type=$1 OR type IS NULL)");
        assert_eq!(fragment.params, vec![SqlParam::Text("pressure".into())]);
    }

    #[test]
    fn test_compile_where_reports_every_coercion_failure() {
        let group = group(vec![
            Filter::new("rate", FilterOperation::Equals, "fast", FilterValueType::Int),
            Filter::new("type", FilterOperation::Equals, "ok", FilterValueType::String),
            Filter::new("value", FilterOperation::Greater, "high", FilterValueType::Float),
            Filter::new("active", FilterOperation::Equals, "yes", FilterValueType::Bool),
        ]);

        let errors = compile_where(&group, &columns(), 0).unwrap_err();
        assert_eq!(
            errors.errors(),
            &[
                FilterError::Coercion {
                    value: "fast".into(),
                    expected: "int"
                },
                FilterError::Coercion {
                    value: "high".into(),
                    expected: "float"
                },
                FilterError::Coercion {
                    value: "yes".into(),
                    expected: "bool"
                },
            ]
        );
    }

    #[test]
    fn test_compile_order() {
        let columns = columns();

        let desc = FilterGroup::new(vec![], Some("updatedAt".into()), SortDirection::Desc);
        assert_eq!(
            compile_order(&desc, &columns).as_deref(),
            Some("updated_at DESC NULLS LAST")
        );

        let asc = FilterGroup::new(vec![], Some("updatedAt".into()), SortDirection::Asc);
        assert_eq!(
            compile_order(&asc, &columns).as_deref(),
            Some("updated_at ASC NULLS FIRST")
        );

        let none = FilterGroup::new(vec![], None, SortDirection::Desc);
        assert_eq!(compile_order(&none, &columns), None);

        let unmapped = FilterGroup::new(vec![], Some("alias".into()), SortDirection::Asc);
        assert_eq!(compile_order(&unmapped, &columns), None);
    }
}
