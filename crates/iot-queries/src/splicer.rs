//! Template splicer
//!
//! Positions compiled WHERE and ORDER BY fragments inside a pre-written SQL
//! template without parsing it. Keyword lookups only match at parenthesis depth
//! zero and outside single-quoted literals, so subqueries and function calls are
//! never touched.
//!
//! Known limitation: with a JOIN and no WHERE, the new clause lands after the
//! first table reference following the top-level FROM. Such templates must carry
//! their own `WHERE TRUE`. The same applies to a table alias directly after the
//! table name.

use iot_core::error::TemplateError;

const WHERE: &str = "WHERE";
const FROM: &str = "FROM";
const ORDER_BY: &str = "ORDER BY";
const COMMA: &str = ",";
const OR: &str = "OR";

/// Clauses that end a WHERE condition
const WHERE_TERMINATORS: &[&str] = &[
    "GROUP BY", "HAVING", "WINDOW", "ORDER BY", "LIMIT", "OFFSET", "FETCH", "FOR", "UNION",
    "INTERSECT", "EXCEPT", "RETURNING",
];

/// Clauses that may follow ORDER BY
const ORDER_TERMINATORS: &[&str] = &["LIMIT", "OFFSET", "FETCH", "FOR"];

/// Collapse every whitespace run to a single space and trim the ends
pub fn normalize(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Byte offset of the first top-level `keyword` at or after `from`
///
/// Matching is ASCII case-insensitive and respects word boundaries on keyword
/// ends that are identifier characters.
pub fn find_top_level(sql: &str, keyword: &str, from: usize) -> Option<usize> {
    let bytes = sql.as_bytes();
    let mut depth = 0i32;
    let mut in_literal = false;

    for i in 0..bytes.len() {
        let b = bytes[i];
        if in_literal {
            if b == b'\'' {
                in_literal = false;
            }
            continue;
        }
        match b {
            b'\'' => in_literal = true,
            b'(' => depth += 1,
            b')' => depth -= 1,
            _ if depth == 0 && i >= from && keyword_at(bytes, i, keyword.as_bytes()) => {
                return Some(i)
            }
            _ => {}
        }
    }

    None
}

/// Earliest top-level position of any of `keywords`
fn find_first_of(sql: &str, keywords: &[&str], from: usize) -> Option<usize> {
    keywords
        .iter()
        .filter_map(|keyword| find_top_level(sql, keyword, from))
        .min()
}

fn keyword_at(bytes: &[u8], at: usize, keyword: &[u8]) -> bool {
    let end = at + keyword.len();
    if end > bytes.len() || !bytes[at..end].eq_ignore_ascii_case(keyword) {
        return false;
    }
    let before = at == 0 || !is_identifier_byte(keyword[0]) || !is_identifier_byte(bytes[at - 1]);
    let after = end == bytes.len()
        || !is_identifier_byte(keyword[keyword.len() - 1])
        || !is_identifier_byte(bytes[end]);
    before && after
}

fn is_identifier_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b'$'
}

/// End of the table token starting at or after `from`
fn table_token_end(sql: &str, from: usize) -> usize {
    let bytes = sql.as_bytes();
    let mut i = from;
    while i < bytes.len() && bytes[i] == b' ' {
        i += 1;
    }

    let mut depth = 0i32;
    while i < bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => depth -= 1,
            b' ' | b';' if depth == 0 => return i,
            _ => {}
        }
        i += 1;
    }

    bytes.len()
}

/// End of the statement body, before a trailing `;`
fn statement_end(sql: &str) -> usize {
    sql.trim_end()
        .strip_suffix(';')
        .map(str::trim_end)
        .unwrap_or(sql.trim_end())
        .len()
}

/// Insert `fragment` into the WHERE clause, creating one after the FROM table if needed
///
/// `sql` is expected to be normalized.
pub fn insert_where(sql: &str, fragment: &str) -> Result<String, TemplateError> {
    if fragment.is_empty() {
        return Ok(sql.to_string());
    }

    if let Some(at) = find_top_level(sql, WHERE, 0) {
        let condition_start = at + WHERE.len();
        let condition_end = find_first_of(sql, WHERE_TERMINATORS, condition_start)
            .unwrap_or_else(|| statement_end(sql))
            .max(condition_start);
        let condition = sql[condition_start..condition_end].trim();
        let tail = sql[condition_end..].trim_start();

        let condition = if find_top_level(condition, OR, 0).is_some() {
            format!("({})", condition)
        } else {
            condition.to_string()
        };

        return Ok(join_parts(&[
            &sql[..condition_start],
            fragment,
            "AND",
            &condition,
            tail,
        ]));
    }

    let Some(from) = find_top_level(sql, FROM, 0) else {
        return Err(TemplateError::MissingFrom {
            template: sql.to_string(),
        });
    };

    let at = table_token_end(sql, from + FROM.len());
    Ok(join_parts(&[
        &sql[..at],
        WHERE,
        fragment,
        sql[at..].trim_start(),
    ]))
}

/// Replace the leading ORDER BY key with `fragment`, or add the clause where it belongs
///
/// Secondary sort keys of an existing list are kept. `sql` is expected to be
/// normalized.
pub fn insert_order(sql: &str, fragment: &str) -> String {
    if fragment.is_empty() {
        return sql.to_string();
    }

    if let Some(at) = find_top_level(sql, ORDER_BY, 0) {
        let list_start = at + ORDER_BY.len();
        let list_end = find_first_of(sql, ORDER_TERMINATORS, list_start)
            .unwrap_or_else(|| statement_end(sql))
            .max(list_start);
        let key_end = find_top_level(sql, COMMA, list_start)
            .filter(|&comma| comma < list_end)
            .unwrap_or(list_end);

        return join_parts(&[
            &sql[..list_start],
            fragment,
            sql[key_end..].trim_start(),
        ]);
    }

    let at = find_first_of(sql, ORDER_TERMINATORS, 0).unwrap_or_else(|| statement_end(sql));
    join_parts(&[sql[..at].trim_end(), ORDER_BY, fragment, sql[at..].trim_start()])
}

/// Join with single spaces, skipping empty parts and keeping `;` and `,` attached
fn join_parts(parts: &[&str]) -> String {
    let mut out = String::new();
    for part in parts.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
        if !out.is_empty() && !part.starts_with(';') && !part.starts_with(',') {
            out.push(' ');
        }
        out.push_str(part);
    }
    out
}
