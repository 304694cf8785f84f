//! Cell addressing and temporary identifiers.
//!
//! A cell address is kept as a structured `(row_id, column_id)` pair wherever it
//! is used as a set or map key. The string form exists for hosts that need a
//! single token (DOM attributes, logs); it escapes the delimiter so ids may
//! contain any character.

use crate::error::KeyError;
use std::fmt;
use uuid::Uuid;

const DELIMITER: char = '|';
const ESCAPE: char = '\\';

const TEMP_ROW_PREFIX: &str = "temp-row-";
const TEMP_COLUMN_PREFIX: &str = "temp-col-";

/// Address of one editable value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub row_id: String,
    pub column_id: String,
}

impl CellKey {
    pub fn new(row_id: impl Into<String>, column_id: impl Into<String>) -> Self {
        Self {
            row_id: row_id.into(),
            column_id: column_id.into(),
        }
    }

    /// Encodes the address as a single string.
    ///
    /// `decode(encode(k)) == k` for every pair of ids, including ids that
    /// contain the delimiter or the escape character.
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(self.row_id.len() + self.column_id.len() + 1);
        push_escaped(&mut out, &self.row_id);
        out.push(DELIMITER);
        push_escaped(&mut out, &self.column_id);
        out
    }

    /// Parses a string produced by [`CellKey::encode`].
    pub fn decode(encoded: &str) -> Result<Self, KeyError> {
        let mut row_id = String::new();
        let mut column_id: Option<String> = None;
        let mut chars = encoded.chars();

        while let Some(c) = chars.next() {
            let literal = match c {
                ESCAPE => match chars.next() {
                    Some(next) => next,
                    None => return Err(KeyError::DanglingEscape(encoded.to_string())),
                },
                DELIMITER => {
                    if column_id.is_some() {
                        return Err(KeyError::TooManyParts(encoded.to_string()));
                    }
                    column_id = Some(String::new());
                    continue;
                }
                other => other,
            };
            match column_id.as_mut() {
                Some(col) => col.push(literal),
                None => row_id.push(literal),
            }
        }

        match column_id {
            None => Err(KeyError::MissingDelimiter(encoded.to_string())),
            Some(column_id) if row_id.is_empty() || column_id.is_empty() => {
                Err(KeyError::EmptyPart(encoded.to_string()))
            }
            Some(column_id) => Ok(Self { row_id, column_id }),
        }
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn push_escaped(out: &mut String, id: &str) {
    for c in id.chars() {
        if c == DELIMITER || c == ESCAPE {
            out.push(ESCAPE);
        }
        out.push(c);
    }
}

/// Mints a client-side id for a row that the server has not confirmed yet.
pub fn temp_row_id() -> String {
    format!("{}{}", TEMP_ROW_PREFIX, Uuid::new_v4())
}

/// Mints a client-side id for a column that the server has not confirmed yet.
///
/// The column name is kept in the id for readability in logs; the uuid keeps
/// two columns with the same default name apart.
pub fn temp_column_id(name: &str) -> String {
    let slug: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    format!("{}{}-{}", TEMP_COLUMN_PREFIX, slug, Uuid::new_v4())
}

/// Returns true for ids minted by [`temp_row_id`].
pub fn is_temp_row_id(id: &str) -> bool {
    id.starts_with(TEMP_ROW_PREFIX)
}

/// Returns true for ids minted by [`temp_column_id`].
pub fn is_temp_column_id(id: &str) -> bool {
    id.starts_with(TEMP_COLUMN_PREFIX)
}
