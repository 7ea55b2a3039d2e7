//! Query result rendering as GitHub pipe tables.
//!
//! Consumers (chat handlers, debugging sessions) read ward data through
//! ad-hoc SELECT statements; results are rendered as Markdown tables with
//! numeric columns right-aligned and floats at four decimals.

use tracing::{debug, warn};

use crate::core::traits::Session;
use crate::core::value::{Row, SqlValue};
use crate::error::{Result, WardError};

/// Rendered in place of a table when a query returns no rows.
pub const NO_RESULT: &str = "No result";

/// Decimal places for float and decimal cells.
const FLOAT_PRECISION: usize = 4;

/// Minimum spacing between a header and its column edge.
const HEADER_PADDING: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Integer,
    Float,
    Text,
}

impl ColumnKind {
    fn of(rows: &[Vec<SqlValue<'_>>], col: usize) -> Self {
        let mut kind = None;
        for value in rows.iter().filter_map(|r| r.get(col)) {
            let cell = match value {
                SqlValue::Null(_) => continue,
                SqlValue::I64(_) => ColumnKind::Integer,
                SqlValue::F64(_) | SqlValue::Decimal(_) => ColumnKind::Float,
                _ => return ColumnKind::Text,
            };
            kind = Some(match (kind, cell) {
                (Some(ColumnKind::Float), _) | (_, ColumnKind::Float) => ColumnKind::Float,
                _ => ColumnKind::Integer,
            });
        }
        kind.unwrap_or(ColumnKind::Text)
    }

    fn is_numeric(self) -> bool {
        self != ColumnKind::Text
    }
}

fn render_cell(value: &SqlValue<'_>, kind: ColumnKind) -> String {
    match (value, kind) {
        (SqlValue::Null(_), _) => String::new(),
        (SqlValue::I64(v), ColumnKind::Float) => format!("{:.*}", FLOAT_PRECISION, *v as f64),
        (SqlValue::F64(v), _) => format!("{:.*}", FLOAT_PRECISION, v),
        (SqlValue::Decimal(d), _) => format!("{:.*}", FLOAT_PRECISION, d),
        (other, _) => other.to_display(),
    }
}

fn pad(text: &str, width: usize, right_align: bool) -> String {
    if right_align {
        format!("{:>width$}", text, width = width)
    } else {
        format!("{:<width$}", text, width = width)
    }
}

/// Render rows as a pipe table under the given column headers.
///
/// NULL renders as an empty cell. An empty result renders [`NO_RESULT`].
pub fn format_rows<S: AsRef<str>>(columns: &[S], rows: &[Vec<SqlValue<'_>>]) -> String {
    if rows.is_empty() {
        return NO_RESULT.to_string();
    }

    let kinds: Vec<ColumnKind> = (0..columns.len()).map(|c| ColumnKind::of(rows, c)).collect();
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            kinds
                .iter()
                .enumerate()
                .map(|(c, kind)| row.get(c).map(|v| render_cell(v, *kind)).unwrap_or_default())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(c, header)| {
            cells
                .iter()
                .map(|row| row[c].chars().count())
                .chain(std::iter::once(
                    header.as_ref().chars().count() + HEADER_PADDING,
                ))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut lines = Vec::with_capacity(rows.len() + 2);
    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .zip(&kinds)
        .map(|((h, w), k)| pad(h.as_ref(), *w, k.is_numeric()))
        .collect();
    lines.push(format!("| {} |", header.join(" | ")));

    let separator: Vec<String> = widths
        .iter()
        .zip(&kinds)
        .map(|(w, k)| {
            if k.is_numeric() {
                format!("{}:", "-".repeat(w + 1))
            } else {
                format!(":{}", "-".repeat(w + 1))
            }
        })
        .collect();
    lines.push(format!("|{}|", separator.join("|")));

    for row in &cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .zip(&kinds)
            .map(|((cell, w), k)| pad(cell, *w, k.is_numeric()))
            .collect();
        lines.push(format!("| {} |", line.join(" | ")));
    }

    lines.join("\n")
}

/// Render rows fetched through a [`Session`] transaction.
pub fn format_result(rows: &[Row]) -> String {
    let Some(first) = rows.first() else {
        return NO_RESULT.to_string();
    };
    let values: Vec<Vec<SqlValue<'static>>> = rows.iter().map(|r| r.values.clone()).collect();
    format_rows(&first.columns, &values)
}

/// Reject anything that is not a plain SELECT statement.
pub fn ensure_select_query(sql: &str) -> Result<()> {
    if sql.trim().to_uppercase().starts_with("SELECT ") {
        Ok(())
    } else {
        Err(WardError::malformed(
            "query",
            sql.trim(),
            "Must start with 'SELECT '",
        ))
    }
}

/// Run a read-only query and render its rows.
///
/// The query runs inside a transaction that is always rolled back.
pub async fn execute_and_format(session: &dyn Session, sql: &str) -> Result<String> {
    ensure_select_query(sql)?;

    let mut tx = session.begin().await?;
    let result = tx.fetch_all(sql, &[]).await;
    if let Err(e) = tx.rollback().await {
        warn!("Rollback of read-only query failed: {}", e);
    }

    let rows = result?;
    debug!("Query returned {} rows", rows.len());
    Ok(format_result(&rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::SqliteSession;
    use crate::error::ErrorKind;

    #[test]
    fn test_pipe_table_layout() {
        let rows = vec![
            vec![SqlValue::from("Ada"), SqlValue::I64(30), SqlValue::F64(1.5)],
            vec![SqlValue::from("Bea"), SqlValue::null_text(), SqlValue::F64(0.12345)],
        ];
        let text = format_rows(&["name", "age", "score"], &rows);
        let expected = "\
| name   |   age |   score |
|:-------|------:|--------:|
| Ada    |    30 |  1.5000 |
| Bea    |       |  0.1235 |";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_empty_result() {
        let rows: Vec<Vec<SqlValue<'static>>> = Vec::new();
        assert_eq!(format_rows(&["bed_id"], &rows), "No result");
        assert_eq!(format_result(&[]), "No result");
    }

    #[test]
    fn test_mixed_column_is_text() {
        let rows = vec![
            vec![SqlValue::I64(1)],
            vec![SqlValue::from("two")],
        ];
        let text = format_rows(&["v"], &rows);
        assert!(text.starts_with("| v   |\n|:----|"));
        assert!(text.contains("| 1   |"));
        assert!(text.contains("| two |"));
    }

    #[test]
    fn test_ensure_select_query() {
        assert!(ensure_select_query("  select * from bed").is_ok());
        assert!(ensure_select_query("SELECT bed_id FROM bed").is_ok());
        let err = ensure_select_query("DELETE FROM bed").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(ensure_select_query("SELECT").is_err());
    }

    #[tokio::test]
    async fn test_execute_and_format_rolls_back() {
        let session = SqliteSession::connect(":memory:").await.unwrap();
        let mut tx = session.begin().await.unwrap();
        tx.execute("CREATE TABLE bed (bed_id TEXT PRIMARY KEY, status TEXT)", &[])
            .await
            .unwrap();
        tx.execute("INSERT INTO bed VALUES ('B01', 'available')", &[])
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let text = execute_and_format(&session, "SELECT bed_id, status FROM bed")
            .await
            .unwrap();
        assert_eq!(
            text,
            "| bed_id   | status    |\n|:---------|:----------|\n| B01      | available |"
        );

        let empty = execute_and_format(&session, "SELECT * FROM bed WHERE status = 'occupied'")
            .await
            .unwrap();
        assert_eq!(empty, "No result");

        let err = execute_and_format(&session, "DROP TABLE bed").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
