use std::collections::HashSet;

use crate::classify::{ClassifiedRow, RowKind};
use crate::error::AssemblyError;
use crate::fields::CanonicalFields;
use crate::identity::{Confidence, Identity, normalize_name};

/// The combination of fields that identifies one logical record no matter
/// how many times it is produced. For an unresolved player the normalized
/// display name stands in for the missing id, so two different unresolved
/// players in the same table never collide with each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub match_id: String,
    pub team_id: String,
    pub player_key: Option<String>,
}

impl NaturalKey {
    pub fn describe(&self) -> String {
        match &self.player_key {
            Some(player) => format!("{}/{}/{}", self.match_id, self.team_id, player),
            None => format!("{}/{}", self.match_id, self.team_id),
        }
    }
}

/// The assembled unit of output. Never mutated after creation; persisted or
/// rejected as a whole by the writer.
#[derive(Debug, Clone)]
pub struct EntityRecord {
    pub key: NaturalKey,
    pub team: Identity,
    /// `None` for team-level records.
    pub player: Option<Identity>,
    pub fields: CanonicalFields,
    pub confidence: Confidence,
    pub season_id: Option<String>,
}

impl EntityRecord {
    pub fn is_team_level(&self) -> bool {
        self.player.is_none()
    }
}

/// Combines classified rows, mapped fields, and resolved identities into
/// records for one table, tracking natural keys already assembled so a
/// duplicated source row is flagged instead of silently overwritten.
pub struct RecordAssembler {
    match_id: String,
    season_id: Option<String>,
    team: Identity,
    seen: HashSet<NaturalKey>,
}

impl RecordAssembler {
    pub fn new(match_id: impl Into<String>, season_id: Option<String>, team: Identity) -> Self {
        Self {
            match_id: match_id.into(),
            season_id,
            team,
            seen: HashSet::new(),
        }
    }

    pub fn team(&self) -> &Identity {
        &self.team
    }

    /// Assemble one record. A `PlayerEntry` row needs a player identity; a
    /// `TeamTotal` row becomes the team-level record. An unresolved team is
    /// fatal to the record (a performance line cannot be attributed to an
    /// unknown team); an unresolved player is not — the name itself is still
    /// a fact worth storing, with a null player id.
    pub fn assemble(
        &mut self,
        row: &ClassifiedRow,
        fields: CanonicalFields,
        player: Option<Identity>,
    ) -> Result<EntityRecord, AssemblyError> {
        let Some(team_id) = self.team.resolved_id.clone() else {
            return Err(AssemblyError::UnresolvedTeam {
                name: self.team.display_name.clone(),
            });
        };

        let (player, player_key, confidence) = match row.kind {
            RowKind::TeamTotal => (None, None, self.team.confidence),
            _ => {
                let player = player.unwrap_or_else(|| {
                    Identity::unresolved(
                        crate::identity::EntityKind::Player,
                        row.row.leading.trim(),
                    )
                });
                let key = player
                    .resolved_id
                    .clone()
                    .unwrap_or_else(|| normalize_name(&player.display_name));
                // A fuzzy team attribution caps the record's confidence even
                // when the player hit was exact.
                let confidence = player.confidence.min(self.team.confidence);
                (Some(player), Some(key), confidence)
            }
        };

        let key = NaturalKey {
            match_id: self.match_id.clone(),
            team_id,
            player_key,
        };
        if !self.seen.insert(key.clone()) {
            return Err(AssemblyError::DuplicateKey {
                key: key.describe(),
            });
        }

        Ok(EntityRecord {
            key,
            team: self.team.clone(),
            player,
            fields,
            confidence,
            season_id: self.season_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::fields::{CANONICAL_FIELDS, map_fields};
    use crate::identity::EntityKind;
    use crate::table::NormalizedRow;

    fn exact_team() -> Identity {
        Identity {
            kind: EntityKind::Team,
            display_name: "Portland Thorns FC".to_string(),
            resolved_id: Some("t_thorns".to_string()),
            confidence: Confidence::Exact,
        }
    }

    fn player_row(name: &str) -> ClassifiedRow {
        classify(NormalizedRow::from_pairs(name, &[("Player", name), ("Min", "90")]))
    }

    fn exact_player(id: &str, name: &str) -> Identity {
        Identity {
            kind: EntityKind::Player,
            display_name: name.to_string(),
            resolved_id: Some(id.to_string()),
            confidence: Confidence::Exact,
        }
    }

    #[test]
    fn assembles_player_record() {
        let mut assembler = RecordAssembler::new("008e301f", Some("2024".into()), exact_team());
        let row = player_row("Alex Morgan");
        let fields = map_fields(&row.row, CANONICAL_FIELDS);
        let record = assembler
            .assemble(&row, fields, Some(exact_player("p_morgan", "Alex Morgan")))
            .expect("assembles");
        assert_eq!(record.key.player_key.as_deref(), Some("p_morgan"));
        assert_eq!(record.confidence, Confidence::Exact);
        assert!(!record.is_team_level());
    }

    #[test]
    fn unresolved_team_rejects_the_record() {
        let team = Identity::unresolved(EntityKind::Team, "Mystery FC");
        let mut assembler = RecordAssembler::new("008e301f", None, team);
        let row = player_row("Alex Morgan");
        let fields = map_fields(&row.row, CANONICAL_FIELDS);
        let err = assembler
            .assemble(&row, fields, Some(exact_player("p_morgan", "Alex Morgan")))
            .expect_err("must fail");
        assert!(matches!(err, AssemblyError::UnresolvedTeam { .. }));
    }

    #[test]
    fn unresolved_player_still_assembles() {
        let mut assembler = RecordAssembler::new("008e301f", None, exact_team());
        let row = player_row("Trialist Nine");
        let fields = map_fields(&row.row, CANONICAL_FIELDS);
        let record = assembler.assemble(&row, fields, None).expect("assembles");
        assert_eq!(record.confidence, Confidence::Unresolved);
        assert_eq!(record.key.player_key.as_deref(), Some("trialist nine"));
        assert!(record.player.as_ref().is_some_and(|p| p.resolved_id.is_none()));
    }

    #[test]
    fn duplicate_natural_key_is_flagged() {
        let mut assembler = RecordAssembler::new("008e301f", None, exact_team());
        let row = player_row("Alex Morgan");
        let fields = map_fields(&row.row, CANONICAL_FIELDS);
        assembler
            .assemble(&row, fields.clone(), Some(exact_player("p_morgan", "Alex Morgan")))
            .expect("first assembles");
        let err = assembler
            .assemble(&row, fields, Some(exact_player("p_morgan", "Alex Morgan")))
            .expect_err("second must fail");
        assert!(matches!(err, AssemblyError::DuplicateKey { .. }));
    }

    #[test]
    fn two_unresolved_players_do_not_collide() {
        let mut assembler = RecordAssembler::new("008e301f", None, exact_team());
        let first = player_row("Trialist Nine");
        let second = player_row("Trialist Ten");
        let fields_a = map_fields(&first.row, CANONICAL_FIELDS);
        let fields_b = map_fields(&second.row, CANONICAL_FIELDS);
        assert!(assembler.assemble(&first, fields_a, None).is_ok());
        assert!(assembler.assemble(&second, fields_b, None).is_ok());
    }

    #[test]
    fn team_total_becomes_team_level_record() {
        let mut assembler = RecordAssembler::new("008e301f", None, exact_team());
        let row = classify(NormalizedRow::from_pairs(
            "15 Players",
            &[("Player", "15 Players"), ("Gls", "3")],
        ));
        assert_eq!(row.kind, RowKind::TeamTotal);
        let fields = map_fields(&row.row, CANONICAL_FIELDS);
        let record = assembler.assemble(&row, fields, None).expect("assembles");
        assert!(record.is_team_level());
        assert_eq!(record.key.player_key, None);
        assert_eq!(record.confidence, Confidence::Exact);
    }

    #[test]
    fn fuzzy_team_caps_record_confidence() {
        let team = Identity {
            confidence: Confidence::Fuzzy,
            ..exact_team()
        };
        let mut assembler = RecordAssembler::new("008e301f", None, team);
        let row = player_row("Alex Morgan");
        let fields = map_fields(&row.row, CANONICAL_FIELDS);
        let record = assembler
            .assemble(&row, fields, Some(exact_player("p_morgan", "Alex Morgan")))
            .expect("assembles");
        assert_eq!(record.confidence, Confidence::Fuzzy);
    }
}
