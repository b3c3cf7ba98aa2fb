//! Parameterized statements built from templates

use iot_core::error::QueryError;
use iot_core::pagination::OffsetPaginator;

use crate::compiler::{self, ColumnMap, SqlParam};
use crate::filters::FilterGroup;
use crate::splicer;

/// SQL text together with its positional parameters, in `$N` order
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    sql: String,
    params: Vec<SqlParam>,
}

impl SqlStatement {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            sql: template.into(),
            params: Vec::new(),
        }
    }

    /// Parameters already referenced by the template
    pub fn with_params(mut self, params: Vec<SqlParam>) -> Self {
        self.params = params;
        self
    }

    /// Compile `group` and splice it into the statement
    pub fn apply_filter(self, group: &FilterGroup, columns: &ColumnMap) -> Result<Self, QueryError> {
        let (sql, params) = compile(group, columns, &self.sql, self.params)?;
        Ok(Self { sql, params })
    }

    /// Row count of the current statement, sharing its parameters
    pub fn count_statement(&self) -> Self {
        Self {
            sql: count_query(&self.sql),
            params: self.params.clone(),
        }
    }

    /// Append LIMIT/OFFSET placeholders bound to the paginator's values
    pub fn paginate(mut self, paginator: &OffsetPaginator) -> Self {
        let (sql, params) = paginate(&self.sql, paginator);
        self.sql = sql;
        self.params.extend(params);
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[SqlParam] {
        &self.params
    }

    pub fn into_parts(self) -> (String, Vec<SqlParam>) {
        (self.sql, self.params)
    }
}

/// Compile `group` against `columns` and splice the fragments into `template`
///
/// New placeholders continue after the highest one found in `template`, and
/// their values are appended to `params`.
pub fn compile(
    group: &FilterGroup,
    columns: &ColumnMap,
    template: &str,
    mut params: Vec<SqlParam>,
) -> Result<(String, Vec<SqlParam>), QueryError> {
    let last_param = compiler::last_param_index(template);
    let where_fragment = compiler::compile_where(group, columns, last_param)?;
    let order_fragment = compiler::compile_order(group, columns);

    let mut sql = splicer::normalize(template);
    if !where_fragment.is_empty() {
        sql = splicer::insert_where(&sql, &where_fragment.sql)?;
    }
    if let Some(order) = order_fragment {
        sql = splicer::insert_order(&sql, &order);
    }

    params.extend(where_fragment.params);
    Ok((sql, params))
}

/// `SELECT COUNT(*)` over `template` as a subquery
pub fn count_query(template: &str) -> String {
    format!("SELECT COUNT(*) FROM ({}) AS subquery", strip_terminator(template))
}

/// Append `LIMIT $n OFFSET $n+1;` and return the values to bind for them
pub fn paginate(template: &str, paginator: &OffsetPaginator) -> (String, [SqlParam; 2]) {
    let next = compiler::last_param_index(template) + 1;
    let sql = format!(
        "{} LIMIT ${} OFFSET ${};",
        strip_terminator(template),
        next,
        next + 1
    );
    (
        sql,
        [SqlParam::Int(paginator.limit), SqlParam::Int(paginator.offset)],
    )
}

fn strip_terminator(template: &str) -> &str {
    let trimmed = template.trim();
    trimmed.strip_suffix(';').map(str::trim_end).unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{Filter, FilterOperation, FilterValueType};
    use crate::sorts::SortDirection;

    fn columns() -> ColumnMap {
        ColumnMap::new()
            .filter("type", "type")
            .filter("alias", "alias")
            .filter("rate", "rate")
            .order("updatedAt", "updated_at")
    }

    #[test]
    fn test_filter_on_plain_template() {
        let group = FilterGroup::new(
            vec![Filter::new(
                "type",
                FilterOperation::Equals,
                "temperature",
                FilterValueType::String,
            )],
            None,
            SortDirection::Asc,
        );

        let statement = SqlStatement::new("SELECT id, type FROM devices;")
            .apply_filter(&group, &columns())
            .unwrap();

        assert_eq!(statement.sql(), "SELECT id, type FROM devices WHERE type=$1;");
        assert_eq!(statement.params(), &[SqlParam::Text("temperature".into())]);
    }

    #[test]
    fn test_filter_and_order() {
        let group = FilterGroup::new(
            vec![
                Filter::new("alias", FilterOperation::Like, "north", FilterValueType::String),
                Filter::new("rate", FilterOperation::Greater, "5", FilterValueType::Int),
            ],
            Some("updatedAt".into()),
            SortDirection::Desc,
        );

        let template = "SELECT id, alias, rate
            FROM devices
            WHERE type=$1
            LIMIT 50";
        let statement = SqlStatement::new(template)
            .with_params(vec![SqlParam::Text("humidity".into())])
            .apply_filter(&group, &columns())
            .unwrap();

        assert_eq!(
            statement.sql(),
            "SELECT id, alias, rate FROM devices WHERE alias ILIKE '%' || $2 || '%' ESCAPE '\\' AND rate > $3 AND type=$1 ORDER BY updated_at DESC NULLS LAST LIMIT 50"
        );
        assert_eq!(
            statement.params(),
            &[
                SqlParam::Text("humidity".into()),
                SqlParam::Text("north".into()),
                SqlParam::Int(5),
            ]
        );
    }

    #[test]
    fn test_repeated_filtering_keeps_numbering() {
        let first = FilterGroup::new(
            vec![Filter::new("type", FilterOperation::Equals, "pressure", FilterValueType::String)],
            None,
            SortDirection::Asc,
        );
        let second = FilterGroup::new(
            vec![Filter::new("rate", FilterOperation::LowerOrEqual, "9", FilterValueType::Int)],
            None,
            SortDirection::Asc,
        );
        let noop = FilterGroup::default();

        let statement = SqlStatement::new("SELECT * FROM devices WHERE id=$1")
            .with_params(vec![SqlParam::Text("a".into())])
            .apply_filter(&first, &columns())
            .unwrap()
            .apply_filter(&noop, &columns())
            .unwrap();
        assert_eq!(compiler::last_param_index(statement.sql()), 2);

        let statement = statement.apply_filter(&second, &columns()).unwrap();
        assert_eq!(
            statement.sql(),
            "SELECT * FROM devices WHERE rate <= $3 AND type=$2 AND id=$1"
        );
        assert_eq!(compiler::last_param_index(statement.sql()), 3);
        assert_eq!(statement.params().len(), 3);
    }

    #[test]
    fn test_template_error_is_not_a_client_error() {
        let group = FilterGroup::new(
            vec![Filter::new("type", FilterOperation::Equals, "x", FilterValueType::String)],
            None,
            SortDirection::Asc,
        );

        let err = SqlStatement::new("SELECT 1")
            .apply_filter(&group, &columns())
            .unwrap_err();
        assert!(matches!(err, QueryError::Template(_)));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_coercion_error_is_a_client_error() {
        let group = FilterGroup::new(
            vec![Filter::new("rate", FilterOperation::Equals, "x", FilterValueType::Int)],
            None,
            SortDirection::Asc,
        );

        let err = SqlStatement::new("SELECT * FROM devices")
            .apply_filter(&group, &columns())
            .unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_count_query() {
        assert_eq!(
            count_query("SELECT id FROM devices WHERE type=$1;"),
            "SELECT COUNT(*) FROM (SELECT id FROM devices WHERE type=$1) AS subquery"
        );
    }

    #[test]
    fn test_paginate() {
        let statement = SqlStatement::new("SELECT id FROM devices WHERE type=$1;")
            .with_params(vec![SqlParam::Text("humidity".into())])
            .paginate(&OffsetPaginator::new(40, 20));

        assert_eq!(
            statement.sql(),
            "SELECT id FROM devices WHERE type=$1 LIMIT $2 OFFSET $3;"
        );
        assert_eq!(
            statement.params(),
            &[
                SqlParam::Text("humidity".into()),
                SqlParam::Int(20),
                SqlParam::Int(40),
            ]
        );
    }
}
