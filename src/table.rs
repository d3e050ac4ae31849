use std::collections::HashMap;

use crate::error::FormatError;

/// A scraped statistics table exactly as the fetch layer handed it over:
/// column labels (single- or two-level) and raw string cells, row order
/// preserved. Built fresh per source artifact and discarded after
/// normalization.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub columns: Vec<ColumnLabel>,
    pub rows: Vec<Vec<String>>,
}

/// One column header. FBRef-style tables group stat columns under an
/// over-header ("Performance", "Expected"); identity columns carry no group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLabel {
    pub group: Option<String>,
    pub label: String,
}

impl ColumnLabel {
    pub fn single(label: impl Into<String>) -> Self {
        Self {
            group: None,
            label: label.into(),
        }
    }

    pub fn grouped(group: impl Into<String>, label: impl Into<String>) -> Self {
        let group = group.into();
        let group = group.trim().to_string();
        Self {
            group: if group.is_empty() { None } else { Some(group) },
            label: label.into(),
        }
    }

    /// Flattened key: `Performance` + `Gls` becomes `Performance_Gls`; an
    /// empty inner label falls back to the group label alone.
    pub fn key(&self) -> String {
        let label = self.label.trim();
        match self.group.as_deref() {
            Some(group) if !label.is_empty() => format!("{group}_{label}"),
            Some(group) => group.to_string(),
            None => label.to_string(),
        }
    }
}

/// One table row flattened to `column key -> raw cell text`. The leading
/// (identity) cell is kept separately because classification keys off it.
#[derive(Debug, Clone, Default)]
pub struct NormalizedRow {
    pub leading: String,
    cells: HashMap<String, String>,
}

impl NormalizedRow {
    pub fn new(leading: impl Into<String>, cells: HashMap<String, String>) -> Self {
        Self {
            leading: leading.into(),
            cells,
        }
    }

    /// Trimmed cell text for a column key; `None` when the column is missing
    /// or the cell is empty after trimming.
    pub fn value(&self, key: &str) -> Option<&str> {
        let raw = self.cells.get(key)?;
        let trimmed = raw.trim();
        if trimmed.is_empty() { None } else { Some(trimmed) }
    }

    #[cfg(test)]
    pub fn from_pairs(leading: &str, pairs: &[(&str, &str)]) -> Self {
        let cells = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self::new(leading, cells)
    }
}

/// Flatten a raw table into one `NormalizedRow` per source row, in order.
/// Rows shorter than the header are padded with empty cells; a row wider
/// than the header cannot be keyed and fails the whole table.
pub fn normalize(table: &RawTable) -> Result<Vec<NormalizedRow>, FormatError> {
    if table.rows.is_empty() {
        return Ok(Vec::new());
    }
    if table.columns.is_empty() {
        return Err(FormatError::MissingHeader);
    }

    let keys: Vec<String> = table.columns.iter().map(ColumnLabel::key).collect();

    let mut out = Vec::with_capacity(table.rows.len());
    for (idx, row) in table.rows.iter().enumerate() {
        if row.len() > keys.len() {
            return Err(FormatError::RowTooWide {
                row: idx,
                cells: row.len(),
                columns: keys.len(),
            });
        }
        let mut cells = HashMap::with_capacity(keys.len());
        for (pos, key) in keys.iter().enumerate() {
            let raw = row.get(pos).map(String::as_str).unwrap_or("");
            // Duplicate flattened keys can occur when a source repeats a
            // short label across groups; the first occurrence wins.
            cells.entry(key.clone()).or_insert_with(|| raw.to_string());
        }
        let leading = row.first().map(String::as_str).unwrap_or("").to_string();
        out.push(NormalizedRow::new(leading, cells));
    }
    Ok(out)
}
