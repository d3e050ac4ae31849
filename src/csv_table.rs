use std::path::Path;

use anyhow::{Context, Result};
use csv::ReaderBuilder;

use crate::table::{ColumnLabel, RawTable};

/// Header shape of a season CSV export. Spreadsheet exports of the stats
/// tables come in two flavors: a plain single header row, or the two-row
/// pandas form where the first row carries group labels ("Performance",
/// "Expected", or an "Unnamed: N_level_0" filler) over the real labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvHeader {
    SingleRow,
    TwoRow,
}

/// Read one CSV export into a `RawTable`. Cells stay raw strings; nothing is
/// classified or coerced here.
pub fn read_csv_table(path: &Path, header: CsvHeader) -> Result<RawTable> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("open csv {}", path.display()))?;

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("read csv {}", path.display()))?;
        records.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    Ok(build_table(records, header))
}

fn build_table(mut records: Vec<Vec<String>>, header: CsvHeader) -> RawTable {
    if records.is_empty() {
        return RawTable::default();
    }

    let columns = match header {
        CsvHeader::SingleRow => {
            let labels = records.remove(0);
            labels.into_iter().map(ColumnLabel::single).collect()
        }
        CsvHeader::TwoRow => {
            let over = records.remove(0);
            let under = if records.is_empty() {
                Vec::new()
            } else {
                records.remove(0)
            };
            two_row_columns(&over, &under)
        }
    };

    RawTable {
        columns,
        rows: records,
    }
}

/// Zip the two header rows into column labels. Pandas writes
/// "Unnamed: N_level_0" where the group row has no real label; those are
/// filler, not a group — except when the under cell is itself empty, in
/// which case the filler is the only key the file gives that column.
fn two_row_columns(over: &[String], under: &[String]) -> Vec<ColumnLabel> {
    let width = over.len().max(under.len());
    let mut columns = Vec::with_capacity(width);
    for pos in 0..width {
        let group = over.get(pos).map(String::as_str).unwrap_or("").trim();
        let label = under.get(pos).map(String::as_str).unwrap_or("").trim();
        let column = if label.is_empty() {
            ColumnLabel::single(group)
        } else if group.is_empty() || group.starts_with("Unnamed:") {
            ColumnLabel::single(label)
        } else {
            ColumnLabel::grouped(group, label)
        };
        columns.push(column);
    }
    columns
}
