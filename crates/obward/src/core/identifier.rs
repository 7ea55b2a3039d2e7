//! Identifier validation and quoting.
//!
//! Table and column names cannot be bound as parameters, so every identifier
//! that reaches generated SQL goes through [`quote_ident`]. Both supported
//! dialects (PostgreSQL and SQLite) use ANSI double-quote quoting.

use crate::error::{Result, WardError};

/// Maximum identifier length (PostgreSQL truncates at 63 bytes; we reject
/// anything beyond a conservative 128).
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier for security issues.
///
/// Rejects empty identifiers, identifiers containing null bytes and
/// identifiers exceeding the maximum length.
///
/// # Errors
///
/// Returns `WardError::SchemaMismatch` with a descriptive message.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(WardError::SchemaMismatch(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(WardError::SchemaMismatch(format!(
            "Identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(WardError::SchemaMismatch(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote an identifier with double quotes.
///
/// Escapes embedded double quotes by doubling them.
///
/// ```ignore
/// assert_eq!(quote_ident("bed")?, "\"bed\"");
/// assert_eq!(quote_ident("odd\"name")?, "\"odd\"\"name\"");
/// ```
pub fn quote_ident(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quote a list of identifiers and join them with `", "`.
pub fn quote_list<S: AsRef<str>>(names: &[S]) -> Result<String> {
    let quoted = names
        .iter()
        .map(|n| quote_ident(n.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    Ok(quoted.join(", "))
}
