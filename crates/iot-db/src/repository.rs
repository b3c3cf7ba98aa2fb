//! Repository errors and the shared filtered list runner

use std::time::Instant;

use iot_core::error::QueryError;
use iot_queries::{ColumnMap, FilterGroup, RequestScope, SqlParam, SqlStatement};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::QueryAs;
use sqlx::{FromRow, PgPool, Postgres};

const UNIQUE_VIOLATION: &str = "23505";
const NOT_NULL_VIOLATION: &str = "23502";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Error type for repository operations
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("{resource} with id {id} not found")]
    NotFound { resource: &'static str, id: String },

    #[error("{resource} with id {id} already exists")]
    Conflict { resource: &'static str, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl RepositoryError {
    /// Classify a failed write by its PostgreSQL error code
    pub fn from_write(err: sqlx::Error, resource: &'static str, id: &str) -> Self {
        let code = match &err {
            sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
            _ => None,
        };

        match code.as_deref() {
            Some(UNIQUE_VIOLATION) => Self::Conflict {
                resource,
                id: id.to_string(),
            },
            Some(NOT_NULL_VIOLATION) | Some(FOREIGN_KEY_VIOLATION) => {
                Self::Constraint(err.to_string())
            }
            _ => Self::Database(err),
        }
    }

    /// Whether the failure was caused by the request rather than the server
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::NotFound { .. } | Self::Conflict { .. } | Self::Constraint(_) => true,
            Self::Query(e) => e.is_client_error(),
            Self::Database(_) => false,
        }
    }
}

/// Bind every parameter in `$N` order
pub(crate) fn bind_params<'q, O>(
    mut query: QueryAs<'q, Postgres, O, PgArguments>,
    params: &[SqlParam],
) -> QueryAs<'q, Postgres, O, PgArguments> {
    for param in params {
        query = match param {
            SqlParam::Int(v) => query.bind(*v),
            SqlParam::Float(v) => query.bind(*v),
            SqlParam::Bool(v) => query.bind(*v),
            SqlParam::Text(v) => query.bind(v.clone()),
            SqlParam::TextArray(v) => query.bind(v.clone()),
        };
    }
    query
}

/// Template with the request's filters and ordering applied
pub fn filtered_statement(
    template: &str,
    columns: &ColumnMap,
    filter: Option<&FilterGroup>,
) -> Result<SqlStatement, QueryError> {
    let statement = SqlStatement::new(template);
    match filter {
        Some(group) => statement.apply_filter(group, columns),
        None => Ok(statement),
    }
}

/// Count and fetch the rows of `template` selected by `scope`
///
/// The count is written back into the scope before the page is fetched.
pub(crate) async fn fetch_filtered<O>(
    pool: &PgPool,
    resource: &'static str,
    template: &str,
    columns: &ColumnMap,
    scope: &mut RequestScope,
) -> RepositoryResult<Vec<O>>
where
    O: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let statement = filtered_statement(template, columns, scope.filter())?;

    let count = statement.count_statement();
    let started = Instant::now();
    let (total,): (i64,) = bind_params(sqlx::query_as(count.sql()), count.params())
        .fetch_one(pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, query = %count.sql(), "error while counting {}s", resource);
            e
        })?;
    tracing::info!(elapsed = ?started.elapsed(), total, "counted {}s", resource);

    scope.record_total(total);

    let statement = match scope.pagination() {
        Some(paginator) => statement.paginate(paginator),
        None => statement,
    };

    let rows = bind_params(sqlx::query_as::<_, O>(statement.sql()), statement.params())
        .fetch_all(pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, query = %statement.sql(), "error executing query");
            e
        })?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use iot_core::error::{FilterError, TemplateError, ValidationErrors};

    #[test]
    fn test_error_messages() {
        let err = RepositoryError::Conflict {
            resource: "sensor",
            id: "42".into(),
        };
        assert_eq!(err.to_string(), "sensor with id 42 already exists");

        let err = RepositoryError::NotFound {
            resource: "sensor",
            id: "42".into(),
        };
        assert_eq!(err.to_string(), "sensor with id 42 not found");
    }

    #[test]
    fn test_non_database_write_error_is_kept() {
        let err = RepositoryError::from_write(sqlx::Error::RowNotFound, "sensor", "1");
        assert!(matches!(err, RepositoryError::Database(sqlx::Error::RowNotFound)));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_query_error_classification() {
        let validation: RepositoryError =
            QueryError::from(ValidationErrors::from(FilterError::InvalidValue {
                value: "%".into(),
            }))
            .into();
        assert!(validation.is_client_error());

        let template: RepositoryError = QueryError::from(TemplateError::MissingFrom {
            template: "SELECT 1".into(),
        })
        .into();
        assert!(!template.is_client_error());
    }

    #[test]
    fn test_filtered_statement_without_filter() {
        let statement =
            filtered_statement("SELECT id FROM devices;", &ColumnMap::new(), None).unwrap();
        assert_eq!(statement.sql(), "SELECT id FROM devices;");
        assert!(statement.params().is_empty());
    }
}
