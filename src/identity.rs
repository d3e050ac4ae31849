use std::collections::HashMap;

use anyhow::{Context, Result};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Player,
    Team,
}

/// How reliably a free-text name was mapped to a stable identifier. Ordered
/// so that `Exact > Fuzzy > Unresolved`; the store uses this ordering to
/// refuse confidence downgrades on re-runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Confidence {
    Unresolved,
    Fuzzy,
    Exact,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::Exact => "exact",
            Confidence::Fuzzy => "fuzzy",
            Confidence::Unresolved => "unresolved",
        }
    }

    pub fn from_str(raw: &str) -> Self {
        match raw {
            "exact" => Confidence::Exact,
            "fuzzy" => Confidence::Fuzzy,
            _ => Confidence::Unresolved,
        }
    }
}

/// A name as it appeared in the source, plus whatever stable id resolution
/// produced. `resolved_id` is only ever set by an exact normalized-name (or
/// team-code) hit, or by the constrained fuzzy fallback tagged `Fuzzy`.
#[derive(Debug, Clone)]
pub struct Identity {
    pub kind: EntityKind,
    pub display_name: String,
    pub resolved_id: Option<String>,
    pub confidence: Confidence,
}

impl Identity {
    pub fn unresolved(kind: EntityKind, display_name: impl Into<String>) -> Self {
        Self {
            kind,
            display_name: display_name.into(),
            resolved_id: None,
            confidence: Confidence::Unresolved,
        }
    }
}

/// One entry of the known-entities index.
#[derive(Debug, Clone)]
pub struct KnownEntity {
    pub id: String,
    pub name: String,
}

/// Read side-channel over the known entities, refreshed out-of-band. The
/// resolver only ever reads; creating new entities is a separate, caller
/// gated operation.
pub trait EntityIndex: Sync {
    /// Entities of `kind` whose normalized name contains `fragment`
    /// (already normalized by the caller).
    fn lookup_by_name(&self, kind: EntityKind, fragment: &str) -> Vec<KnownEntity>;

    /// Direct lookup by an exact short code (teams only in practice).
    fn lookup_by_code(&self, kind: EntityKind, code: &str) -> Option<KnownEntity>;
}

/// Trim, case-fold and collapse internal whitespace.
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve a display name to an identity: exact normalized-name match first,
/// then the constrained fuzzy fallback (first and last token both contained,
/// and exactly one candidate). Two or more plausible candidates is a
/// data-quality event, not a resolution, so it stays `Unresolved`.
pub fn resolve(index: &dyn EntityIndex, kind: EntityKind, display_name: &str) -> Identity {
    let normalized = normalize_name(display_name);
    if normalized.is_empty() {
        return Identity::unresolved(kind, display_name);
    }

    let exact = index
        .lookup_by_name(kind, &normalized)
        .into_iter()
        .find(|e| normalize_name(&e.name) == normalized);
    if let Some(hit) = exact {
        return Identity {
            kind,
            display_name: display_name.to_string(),
            resolved_id: Some(hit.id),
            confidence: Confidence::Exact,
        };
    }

    let tokens: Vec<&str> = normalized.split(' ').collect();
    let (Some(first), Some(last)) = (tokens.first(), tokens.last()) else {
        return Identity::unresolved(kind, display_name);
    };
    if first == last {
        // A single token matches too loosely to trust as a fuzzy hit.
        return Identity::unresolved(kind, display_name);
    }

    let mut candidates: Vec<KnownEntity> = index
        .lookup_by_name(kind, first)
        .into_iter()
        .filter(|e| normalize_name(&e.name).contains(last))
        .collect();
    candidates.dedup_by(|a, b| a.id == b.id);

    match candidates.len() {
        1 => {
            let hit = candidates.remove(0);
            Identity {
                kind,
                display_name: display_name.to_string(),
                resolved_id: Some(hit.id),
                confidence: Confidence::Fuzzy,
            }
        }
        _ => Identity::unresolved(kind, display_name),
    }
}

/// Team resolution. A short code extracted from table metadata is
/// structurally exact and takes precedence over any name heuristic.
pub fn resolve_team(
    index: &dyn EntityIndex,
    display_name: &str,
    code: Option<&str>,
) -> Identity {
    if let Some(code) = code.map(str::trim).filter(|c| !c.is_empty()) {
        if let Some(hit) = index.lookup_by_code(EntityKind::Team, code) {
            let display_name = if display_name.trim().is_empty() {
                hit.name.clone()
            } else {
                display_name.to_string()
            };
            return Identity {
                kind: EntityKind::Team,
                display_name,
                resolved_id: Some(hit.id),
                confidence: Confidence::Exact,
            };
        }
    }
    resolve(index, EntityKind::Team, display_name)
}

/// In-memory snapshot of the known-entities index. The resolver is a pure
/// function of this snapshot; nothing here mutates during a run.
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    by_kind: HashMap<EntityKind, Vec<KnownEntity>>,
    team_codes: HashMap<String, KnownEntity>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_player(&mut self, id: impl Into<String>, name: impl Into<String>) {
        self.by_kind.entry(EntityKind::Player).or_default().push(KnownEntity {
            id: id.into(),
            name: name.into(),
        });
    }

    pub fn push_team(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        code: Option<&str>,
    ) {
        let entity = KnownEntity {
            id: id.into(),
            name: name.into(),
        };
        if let Some(code) = code.map(str::trim).filter(|c| !c.is_empty()) {
            self.team_codes.insert(code.to_lowercase(), entity.clone());
        }
        self.by_kind.entry(EntityKind::Team).or_default().push(entity);
    }

    /// Snapshot the `player` and `team` tables of an existing store.
    pub fn from_store(conn: &Connection) -> Result<Self> {
        let mut index = Self::new();

        let mut stmt = conn
            .prepare("SELECT player_id, player_name FROM player")
            .context("prepare player index query")?;
        let players = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .context("query player index")?;
        for row in players {
            let (id, name) = row.context("read player row")?;
            index.push_player(id, name);
        }

        let mut stmt = conn
            .prepare("SELECT team_id, team_name, team_code FROM team")
            .context("prepare team index query")?;
        let teams = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })
            .context("query team index")?;
        for row in teams {
            let (id, name, code) = row.context("read team row")?;
            index.push_team(id, name, code.as_deref());
        }

        Ok(index)
    }
}

impl EntityIndex for InMemoryIndex {
    fn lookup_by_name(&self, kind: EntityKind, fragment: &str) -> Vec<KnownEntity> {
        let Some(entities) = self.by_kind.get(&kind) else {
            return Vec::new();
        };
        entities
            .iter()
            .filter(|e| normalize_name(&e.name).contains(fragment))
            .cloned()
            .collect()
    }

    fn lookup_by_code(&self, kind: EntityKind, code: &str) -> Option<KnownEntity> {
        if kind != EntityKind::Team {
            return None;
        }
        self.team_codes.get(&code.to_lowercase()).cloned()
    }
}
