use once_cell::sync::Lazy;
use regex::Regex;

use crate::table::NormalizedRow;

/// What a normalized row represents. Only `PlayerEntry` and `TeamTotal`
/// carry facts; the other two are table furniture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    PlayerEntry,
    TeamTotal,
    HeaderNoise,
    Blank,
}

#[derive(Debug, Clone)]
pub struct ClassifiedRow {
    pub kind: RowKind,
    pub row: NormalizedRow,
}

/// FBRef closes every stat table with an aggregate line like "15 Players".
static TEAM_TOTAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\d+\s+players$").unwrap());

/// Header labels that reappear as body rows when a long table repeats its
/// header mid-scroll.
const HEADER_TOKENS: &[&str] = &["Player", "Squad"];

/// Pandas leaves "NaN" in the name position of padding rows.
const NAN_TOKENS: &[&str] = &["NaN", "nan", "NA", "n/a"];

/// Classify one row by its identity (first) cell. The check order is fixed:
/// blank, then the total/header patterns, then player. The total pattern is
/// anchored on both ends so a player whose name merely contains "Players"
/// can never be swallowed, and team names containing digits never reach any
/// name heuristic.
pub fn classify(row: NormalizedRow) -> ClassifiedRow {
    let leading = row.leading.trim();

    let kind = if leading.is_empty() || NAN_TOKENS.contains(&leading) {
        RowKind::Blank
    } else if TEAM_TOTAL.is_match(leading) {
        RowKind::TeamTotal
    } else if HEADER_TOKENS.contains(&leading) {
        RowKind::HeaderNoise
    } else {
        RowKind::PlayerEntry
    };

    ClassifiedRow { kind, row }
}
