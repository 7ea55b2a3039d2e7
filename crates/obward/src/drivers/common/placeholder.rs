//! Rewriting of `$n` parameter placeholders.
//!
//! Statements are written once with PostgreSQL-style `$1`, `$2`, ...
//! placeholders; each session rewrites them into its native form. Quoted
//! literals and quoted identifiers are copied through untouched.

use crate::error::{Result, WardError};

/// Rewrite every `$n` placeholder outside quotes with `render(n)`.
///
/// # Errors
///
/// Returns `WardError::Storage` for `$0` or an index above `param_count`.
pub fn rewrite_placeholders<F>(sql: &str, param_count: usize, mut render: F) -> Result<String>
where
    F: FnMut(usize) -> String,
{
    let mut out = String::with_capacity(sql.len() + 16);
    let mut chars = sql.char_indices().peekable();
    let mut quote: Option<char> = None;

    while let Some((_, c)) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' => {
                quote = Some(c);
                out.push(c);
            }
            '$' if chars.peek().is_some_and(|(_, d)| d.is_ascii_digit()) => {
                let mut index = 0usize;
                while let Some(&(_, d)) = chars.peek() {
                    let Some(digit) = d.to_digit(10) else { break };
                    index = index.saturating_mul(10).saturating_add(digit as usize);
                    chars.next();
                }
                if index == 0 || index > param_count {
                    return Err(WardError::Storage(format!(
                        "placeholder ${} out of range ({} parameters bound)",
                        index, param_count
                    )));
                }
                out.push_str(&render(index));
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}
