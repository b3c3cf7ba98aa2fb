//! # iot-queries
//!
//! Filter and pagination query layer for IoT Sensors RS.
//!
//! Client-supplied `filters=field:op:value`, `sort` and `order` parameters are
//! validated against a per-endpoint whitelist and turned into parameterized
//! additions to a pre-written SQL template. Only whitelisted column names and
//! `$N` placeholders ever reach the SQL text.
//!
//! ## Structure
//!
//! - `filters` - Filter types, operation/type matrix and the query-string parser
//! - `sorts` - Order field and direction validation
//! - `compiler` - Filters and order rendered as SQL fragments plus bound parameters
//! - `splicer` - Parenthesis-aware insertion of fragments into a template
//! - `statement` - Compile+splice entry point, count and LIMIT/OFFSET helpers
//! - `scope` - Request-scoped bundle handed to the persistence layer
//!
//! ## Example
//!
//! ```
//! use iot_queries::{ColumnMap, FilterValueType, FilterWhitelist, SqlParam, SqlStatement};
//!
//! let whitelist = FilterWhitelist::new().filter("type", FilterValueType::String);
//! let group = whitelist.parse(Some("filters=type:eq:temperature")).unwrap();
//!
//! let columns = ColumnMap::new().filter("type", "type");
//! let statement = SqlStatement::new("SELECT id, type FROM devices;")
//!     .apply_filter(&group, &columns)
//!     .unwrap();
//!
//! assert_eq!(statement.sql(), "SELECT id, type FROM devices WHERE type=$1;");
//! assert_eq!(statement.params(), &[SqlParam::Text("temperature".into())]);
//! ```

pub mod compiler;
pub mod filters;
pub mod scope;
pub mod sorts;
pub mod splicer;
pub mod statement;

// Re-exports for convenience
pub use compiler::{ColumnMap, SqlParam};
pub use filters::{
    Filter, FilterDefinition, FilterGroup, FilterOperation, FilterValueType, FilterWhitelist,
};
pub use scope::RequestScope;
pub use sorts::SortDirection;
pub use statement::SqlStatement;
