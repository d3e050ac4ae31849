use thiserror::Error;

/// The source table cannot be normalized at all. Fatal to that one table;
/// the caller reports it and moves on to the next source.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("table has data rows but no column labels")]
    MissingHeader,
    #[error("row {row} has {cells} cells but the table declares {columns} columns")]
    RowTooWide {
        row: usize,
        cells: usize,
        columns: usize,
    },
}

/// One record could not be assembled. Rejects that record only; the rest of
/// the table keeps going.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("team '{name}' is unresolved; its rows cannot be attributed")]
    UnresolvedTeam { name: String },
    #[error("duplicate row for {key} in the same table")]
    DuplicateKey { key: String },
}
