use std::collections::HashMap;

use crate::table::NormalizedRow;

/// Declared semantic type of a canonical field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Whole-number stat (goals, touches). Sources sometimes print these as
    /// "1.0" or "1,234".
    Count,
    /// Decimal rate or percentage (xG, pass completion).
    Rate,
    /// Free text (position, nation).
    Text,
}

/// A typed value, or the explicit marker that the source had nothing. A cell
/// that fails coercion becomes `Absent` — never zero, because a missing stat
/// and a zero stat are different facts.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
    Absent,
}

impl FieldValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

/// One canonical field: its stable name, type, and the source column keys
/// accepted for it, in priority order. Source labels drift release to
/// release ("Performance_Gls" vs bare "Gls", pandas "Unnamed:" spellings);
/// this table is the single place that drift is absorbed.
#[derive(Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldType,
    pub aliases: &'static [&'static str],
}

/// The canonical stat set for one performance line, matching the summary-tab
/// layout of the source tables. Ordering here is the column ordering used by
/// the store.
///
/// The bare aliases `Att`, `Cmp` and `Cmp%` belong to the passing fields
/// only; the take-on fields must not fall back to them.
pub static CANONICAL_FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "shirt_number", kind: FieldType::Count, aliases: &["#", "Unnamed: 1_level_0"] },
    FieldSpec { name: "nation", kind: FieldType::Text, aliases: &["Nation", "Unnamed: 2_level_0"] },
    FieldSpec { name: "position", kind: FieldType::Text, aliases: &["Pos", "Unnamed: 3_level_0"] },
    FieldSpec { name: "age", kind: FieldType::Text, aliases: &["Age", "Unnamed: 4_level_0"] },
    FieldSpec { name: "minutes_played", kind: FieldType::Count, aliases: &["Min", "Unnamed: 5_level_0"] },
    FieldSpec { name: "goals", kind: FieldType::Count, aliases: &["Performance_Gls", "Gls"] },
    FieldSpec { name: "assists", kind: FieldType::Count, aliases: &["Performance_Ast", "Ast"] },
    FieldSpec { name: "penalties_scored", kind: FieldType::Count, aliases: &["Performance_PK", "PK"] },
    FieldSpec { name: "penalties_attempted", kind: FieldType::Count, aliases: &["Performance_PKatt", "PKatt"] },
    FieldSpec { name: "shots", kind: FieldType::Count, aliases: &["Performance_Sh", "Sh"] },
    FieldSpec { name: "shots_on_target", kind: FieldType::Count, aliases: &["Performance_SoT", "SoT"] },
    FieldSpec { name: "yellow_cards", kind: FieldType::Count, aliases: &["Performance_CrdY", "CrdY"] },
    FieldSpec { name: "red_cards", kind: FieldType::Count, aliases: &["Performance_CrdR", "CrdR"] },
    FieldSpec { name: "touches", kind: FieldType::Count, aliases: &["Performance_Touches", "Touches"] },
    FieldSpec { name: "tackles", kind: FieldType::Count, aliases: &["Performance_Tkl", "Tkl"] },
    FieldSpec { name: "interceptions", kind: FieldType::Count, aliases: &["Performance_Int", "Int"] },
    FieldSpec { name: "blocks", kind: FieldType::Count, aliases: &["Performance_Blocks", "Blocks"] },
    FieldSpec { name: "xg", kind: FieldType::Rate, aliases: &["Expected_xG", "xG"] },
    FieldSpec { name: "npxg", kind: FieldType::Rate, aliases: &["Expected_npxG", "npxG"] },
    FieldSpec { name: "xag", kind: FieldType::Rate, aliases: &["Expected_xAG", "xAG"] },
    FieldSpec { name: "shot_creating_actions", kind: FieldType::Count, aliases: &["SCA_SCA", "SCA"] },
    FieldSpec { name: "goal_creating_actions", kind: FieldType::Count, aliases: &["GCA_GCA", "SCA_GCA", "GCA"] },
    FieldSpec { name: "passes_completed", kind: FieldType::Count, aliases: &["Passes_Cmp", "Cmp"] },
    FieldSpec { name: "passes_attempted", kind: FieldType::Count, aliases: &["Passes_Att", "Att"] },
    FieldSpec { name: "pass_completion_pct", kind: FieldType::Rate, aliases: &["Passes_Cmp%", "Cmp%"] },
    FieldSpec { name: "progressive_passes", kind: FieldType::Count, aliases: &["Passes_PrgP", "PrgP"] },
    FieldSpec { name: "carries", kind: FieldType::Count, aliases: &["Carries_Carries", "Carries"] },
    FieldSpec { name: "progressive_carries", kind: FieldType::Count, aliases: &["Carries_PrgC", "PrgC"] },
    FieldSpec { name: "take_ons_attempted", kind: FieldType::Count, aliases: &["Take-Ons_Att", "Take-Ons Att"] },
    FieldSpec { name: "take_ons_won", kind: FieldType::Count, aliases: &["Take-Ons_Succ", "Take-Ons Succ"] },
];

/// Mapped values for every canonical field. Fields the source did not carry
/// are present with `FieldValue::Absent`, so downstream code never has to
/// distinguish "not mapped" from "mapped to nothing".
#[derive(Debug, Clone, Default)]
pub struct CanonicalFields {
    values: HashMap<&'static str, FieldValue>,
}

impl CanonicalFields {
    pub fn get(&self, name: &str) -> &FieldValue {
        static ABSENT: FieldValue = FieldValue::Absent;
        self.values.get(name).unwrap_or(&ABSENT)
    }

    /// Count of fields that carried a value.
    pub fn populated(&self) -> usize {
        self.values.values().filter(|v| !v.is_absent()).count()
    }
}

/// Map one normalized row onto the canonical field set. For each field the
/// alias list is tried in order and the first key present with a non-empty
/// cell wins; coercion failure yields `Absent` for that field only.
pub fn map_fields(row: &NormalizedRow, specs: &[FieldSpec]) -> CanonicalFields {
    let mut values = HashMap::with_capacity(specs.len());
    for spec in specs {
        let raw = spec.aliases.iter().find_map(|alias| row.value(alias));
        let value = match raw {
            Some(cell) => coerce(cell, spec.kind),
            None => FieldValue::Absent,
        };
        values.insert(spec.name, value);
    }
    CanonicalFields { values }
}

fn coerce(raw: &str, kind: FieldType) -> FieldValue {
    match kind {
        FieldType::Count => coerce_int(raw).map(FieldValue::Int).unwrap_or(FieldValue::Absent),
        FieldType::Rate => coerce_float(raw).map(FieldValue::Float).unwrap_or(FieldValue::Absent),
        FieldType::Text => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                FieldValue::Absent
            } else {
                FieldValue::Text(trimmed.to_string())
            }
        }
    }
}

/// Integer coercion: strip thousands separators, parse as float first so
/// "1.0" style cells survive, then truncate.
fn coerce_int(raw: &str) -> Option<i64> {
    let cleaned = raw.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    let parsed = cleaned.parse::<f64>().ok()?;
    if !parsed.is_finite() {
        return None;
    }
    Some(parsed.trunc() as i64)
}

/// Float coercion: a trailing percent sign is cosmetic in the sources.
fn coerce_float(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().trim_end_matches('%').replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    let parsed = cleaned.parse::<f64>().ok()?;
    parsed.is_finite().then_some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_present_alias_wins() {
        let row = NormalizedRow::from_pairs(
            "Alex Morgan",
            &[("Performance_Gls", "2"), ("Gls", "9")],
        );
        let fields = map_fields(&row, CANONICAL_FIELDS);
        assert_eq!(fields.get("goals"), &FieldValue::Int(2));
    }

    #[test]
    fn falls_through_empty_cells() {
        let row = NormalizedRow::from_pairs("Alex Morgan", &[("Performance_Gls", "  "), ("Gls", "1")]);
        let fields = map_fields(&row, CANONICAL_FIELDS);
        assert_eq!(fields.get("goals"), &FieldValue::Int(1));
    }

    #[test]
    fn bare_att_binds_to_passing_not_take_ons() {
        let row = NormalizedRow::from_pairs("Alex Morgan", &[("Att", "30")]);
        let fields = map_fields(&row, CANONICAL_FIELDS);
        assert_eq!(fields.get("passes_attempted"), &FieldValue::Int(30));
        assert!(fields.get("take_ons_attempted").is_absent());
    }

    #[test]
    fn int_coercion_handles_source_quirks() {
        assert_eq!(coerce_int("1,234"), Some(1234));
        assert_eq!(coerce_int("1.0"), Some(1));
        assert_eq!(coerce_int("90"), Some(90));
        assert_eq!(coerce_int("—"), None);
        assert_eq!(coerce_int(""), None);
    }

    #[test]
    fn float_coercion_strips_percent() {
        assert_eq!(coerce_float("87.5%"), Some(87.5));
        assert_eq!(coerce_float("0.3"), Some(0.3));
        assert_eq!(coerce_float("—"), None);
    }

    #[test]
    fn missing_cells_are_absent_never_zero() {
        let row = NormalizedRow::from_pairs("Alex Morgan", &[("Min", "90")]);
        let fields = map_fields(&row, CANONICAL_FIELDS);
        assert_eq!(fields.get("minutes_played"), &FieldValue::Int(90));
        for spec in CANONICAL_FIELDS {
            if spec.name == "minutes_played" {
                continue;
            }
            assert!(
                fields.get(spec.name).is_absent(),
                "{} should be absent",
                spec.name
            );
        }
    }

    #[test]
    fn unparseable_cell_is_absent_not_zero() {
        let row = NormalizedRow::from_pairs("Alex Morgan", &[("Gls", "—")]);
        let fields = map_fields(&row, CANONICAL_FIELDS);
        assert!(fields.get("goals").is_absent());
    }

    #[test]
    fn text_fields_trim_to_absent() {
        let row = NormalizedRow::from_pairs("Alex Morgan", &[("Pos", " FW "), ("Nation", "  ")]);
        let fields = map_fields(&row, CANONICAL_FIELDS);
        assert_eq!(fields.get("position"), &FieldValue::Text("FW".to_string()));
        assert!(fields.get("nation").is_absent());
    }
}
