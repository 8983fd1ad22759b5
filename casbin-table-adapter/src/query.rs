//! Parameterized SQL for the rule table.
//!
//! Identifiers come from validated [`FieldNames`] and are always quoted; every
//! rule value is passed as a bind parameter.

use casbin::Filter;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};

use crate::error::Result;
use crate::fields::{quote, FieldNames};
use crate::rule::RuleRow;

/// Upper bound of bind parameters in one SQLite statement
pub const MAX_BIND_PARAMS: usize = 32766;

/// Exact-match constraints on the rule type and a set of value columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFilter {
    ptype: String,
    values: Vec<(usize, String)>,
}

impl RuleFilter {
    /// Constrain every value the caller supplied, including empty ones.
    /// Slots past the end of `rule` match anything.
    pub fn supplied(ptype: &str, rule: &[String], width: usize) -> Self {
        Self {
            ptype: ptype.to_string(),
            values: rule.iter().take(width).cloned().enumerate().collect(),
        }
    }

    /// Constrain all `width` slots; missing values must be empty
    pub fn full(ptype: &str, rule: &[String], width: usize) -> Self {
        let row = RuleRow::from_rule(ptype, rule, width);
        Self {
            ptype: row.ptype,
            values: row.values.into_iter().enumerate().collect(),
        }
    }

    /// Constrain the band `[field_index, field_index + field_values.len())`,
    /// clipped to `width`. Empty values leave their slot unconstrained.
    pub fn band(ptype: &str, field_index: usize, field_values: &[String], width: usize) -> Self {
        Self {
            ptype: ptype.to_string(),
            values: field_values
                .iter()
                .enumerate()
                .filter(|(_, value)| !value.is_empty())
                .filter_map(|(offset, value)| {
                    let index = field_index.checked_add(offset)?;
                    (index < width).then(|| (index, value.clone()))
                })
                .collect(),
        }
    }

    fn push_where(&self, qb: &mut QueryBuilder<'static, Sqlite>, fields: &FieldNames) {
        qb.push(" WHERE ");
        qb.push(quote(&fields.ptype));
        qb.push(" = ");
        qb.push_bind(self.ptype.clone());
        for (index, value) in &self.values {
            qb.push(" AND ");
            qb.push(quote(&fields.values[*index]));
            qb.push(" = ");
            qb.push_bind(value.clone());
        }
    }
}

fn column_list(fields: &FieldNames) -> String {
    fields.columns().map(quote).collect::<Vec<_>>().join(", ")
}

/// `SELECT` every rule row, optionally restricted by a filter, in id order
pub fn select_rows(
    table: &str,
    fields: &FieldNames,
    filter: Option<&RuleFilter>,
) -> QueryBuilder<'static, Sqlite> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT {} FROM {}",
        column_list(fields),
        quote(table)
    ));
    if let Some(filter) = filter {
        filter.push_where(&mut qb, fields);
    }
    qb.push(" ORDER BY \"id\"");
    qb
}

/// `SELECT` the rows matching a casbin load filter.
///
/// Patterns in `filter.p` apply to rule types starting with `p`, patterns in
/// `filter.g` to those starting with `g`. An empty pattern is a wildcard.
pub fn select_filtered_rows(
    table: &str,
    fields: &FieldNames,
    filter: &Filter<'_>,
) -> QueryBuilder<'static, Sqlite> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT {} FROM {} WHERE ",
        column_list(fields),
        quote(table)
    ));
    for (i, (sec, patterns)) in [("p", &filter.p), ("g", &filter.g)].into_iter().enumerate() {
        if i > 0 {
            qb.push(" OR ");
        }
        qb.push("(substr(");
        qb.push(quote(&fields.ptype));
        qb.push(", 1, 1) = ");
        qb.push_bind(sec.to_string());
        for (index, pattern) in patterns.iter().enumerate().take(fields.width()) {
            if pattern.is_empty() {
                continue;
            }
            qb.push(" AND ");
            qb.push(quote(&fields.values[index]));
            qb.push(" = ");
            qb.push_bind(pattern.to_string());
        }
        qb.push(")");
    }
    qb.push(" ORDER BY \"id\"");
    qb
}

/// Multi-row `INSERT`; `rows` must be non-empty and fit [`max_rows_per_insert`]
pub fn insert_rows(table: &str, fields: &FieldNames, rows: &[RuleRow]) -> QueryBuilder<'static, Sqlite> {
    let mut qb = QueryBuilder::new(format!(
        "INSERT INTO {} ({}) ",
        quote(table),
        column_list(fields)
    ));
    qb.push_values(rows.iter(), |mut b, row| {
        b.push_bind(row.ptype.clone());
        for value in &row.values {
            b.push_bind(value.clone());
        }
    });
    qb
}

/// Number of rows one `INSERT` may carry without exceeding the bind limit
pub fn max_rows_per_insert(fields: &FieldNames) -> usize {
    (MAX_BIND_PARAMS / (fields.width() + 1)).max(1)
}

/// `UPDATE` the rows matching `filter`, writing every column of `row`
pub fn update_rows(
    table: &str,
    fields: &FieldNames,
    filter: &RuleFilter,
    row: &RuleRow,
) -> QueryBuilder<'static, Sqlite> {
    let mut qb = QueryBuilder::new(format!("UPDATE {} SET ", quote(table)));
    qb.push(quote(&fields.ptype));
    qb.push(" = ");
    qb.push_bind(row.ptype.clone());
    for (column, value) in fields.values.iter().zip(&row.values) {
        qb.push(", ");
        qb.push(quote(column));
        qb.push(" = ");
        qb.push_bind(value.clone());
    }
    filter.push_where(&mut qb, fields);
    qb
}

/// `DELETE` the rows matching `filter`, or every row without one
pub fn delete_rows(
    table: &str,
    fields: &FieldNames,
    filter: Option<&RuleFilter>,
) -> QueryBuilder<'static, Sqlite> {
    let mut qb = QueryBuilder::new(format!("DELETE FROM {}", quote(table)));
    if let Some(filter) = filter {
        filter.push_where(&mut qb, fields);
    }
    qb
}

/// Decode a row produced by [`select_rows`] or [`select_filtered_rows`].
/// NULL values read back as empty strings.
pub fn decode_row(row: &SqliteRow, width: usize) -> Result<RuleRow> {
    let ptype: Option<String> = row.try_get(0)?;
    let values = (1..=width)
        .map(|i| row.try_get::<Option<String>, _>(i).map(Option::unwrap_or_default))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(RuleRow {
        ptype: ptype.unwrap_or_default(),
        values,
    })
}
