use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use once_cell::sync::Lazy;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Transaction, params, params_from_iter};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::assemble::{EntityRecord, NaturalKey};
use crate::fields::{CANONICAL_FIELDS, FieldType, FieldValue};
use crate::identity::Confidence;

/// Per-batch write outcome counts: insert for a new natural key, update when
/// the incoming confidence is equal or better, skip when it would downgrade,
/// fail for per-record write errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl WriteReport {
    pub fn merge(&mut self, other: WriteReport) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }

    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
    init_schema(&conn)?;
    Ok(conn)
}

fn stat_columns_ddl() -> String {
    CANONICAL_FIELDS
        .iter()
        .map(|spec| {
            let sql_type = match spec.kind {
                FieldType::Count => "INTEGER",
                FieldType::Rate => "REAL",
                FieldType::Text => "TEXT",
            };
            format!("{} {} NULL", spec.name, sql_type)
        })
        .collect::<Vec<_>>()
        .join(",\n            ")
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    let stats = stat_columns_ddl();
    conn.execute_batch(&format!(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS team (
            team_id TEXT PRIMARY KEY,
            team_name TEXT NOT NULL,
            team_code TEXT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_team_code ON team(team_code);

        CREATE TABLE IF NOT EXISTS player (
            player_id TEXT PRIMARY KEY,
            player_name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS match_player (
            match_player_id TEXT PRIMARY KEY,
            match_id TEXT NOT NULL,
            team_id TEXT NOT NULL,
            player_id TEXT NULL,
            player_key TEXT NOT NULL,
            player_name TEXT NOT NULL,
            identity_confidence TEXT NOT NULL,
            season_id TEXT NULL,
            {stats},
            updated_at TEXT NOT NULL,
            UNIQUE (match_id, team_id, player_key)
        );
        CREATE INDEX IF NOT EXISTS idx_match_player_match ON match_player(match_id);

        CREATE TABLE IF NOT EXISTS match_team (
            match_team_id TEXT PRIMARY KEY,
            match_id TEXT NOT NULL,
            team_id TEXT NOT NULL,
            team_name TEXT NOT NULL,
            identity_confidence TEXT NOT NULL,
            season_id TEXT NULL,
            {stats},
            updated_at TEXT NOT NULL,
            UNIQUE (match_id, team_id)
        );
        CREATE INDEX IF NOT EXISTS idx_match_team_match ON match_team(match_id);

        CREATE TABLE IF NOT EXISTS ingest_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NOT NULL,
            tables_total INTEGER NOT NULL,
            tables_failed INTEGER NOT NULL,
            records_inserted INTEGER NOT NULL,
            records_updated INTEGER NOT NULL,
            records_skipped INTEGER NOT NULL,
            records_failed INTEGER NOT NULL,
            errors_json TEXT NOT NULL
        );
        "#
    ))
    .context("create sqlite schema")?;
    Ok(())
}

/// Known-entities seeding; the index itself is maintained out-of-band, these
/// exist for bootstrap scripts and tests.
pub fn seed_team(conn: &Connection, id: &str, name: &str, code: Option<&str>) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO team(team_id, team_name, team_code) VALUES (?1, ?2, ?3)",
        params![id, name, code],
    )
    .context("seed team")?;
    Ok(())
}

pub fn seed_player(conn: &Connection, id: &str, name: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO player(player_id, player_name) VALUES (?1, ?2)",
        params![id, name],
    )
    .context("seed player")?;
    Ok(())
}

/// Durable record id: a digest of the natural key, so every re-run of the
/// same source mints the same id.
fn record_id(prefix: &str, key: &NaturalKey) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.match_id.as_bytes());
    hasher.update(b"_");
    hasher.update(key.team_id.as_bytes());
    if let Some(player) = &key.player_key {
        hasher.update(b"_");
        hasher.update(player.as_bytes());
    }
    let digest = hex::encode(hasher.finalize());
    format!("{prefix}{}", &digest[..8])
}

fn stat_names() -> Vec<&'static str> {
    CANONICAL_FIELDS.iter().map(|spec| spec.name).collect()
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

static PLAYER_INSERT: Lazy<String> = Lazy::new(|| {
    let stats = stat_names().join(", ");
    let count = 8 + CANONICAL_FIELDS.len() + 1;
    format!(
        "INSERT INTO match_player (match_player_id, match_id, team_id, player_id, player_key, \
         player_name, identity_confidence, season_id, {stats}, updated_at) VALUES ({})",
        placeholders(count)
    )
});

static PLAYER_UPDATE: Lazy<String> = Lazy::new(|| {
    let stats = stat_names()
        .iter()
        .map(|name| format!("{name} = ?"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE match_player SET player_id = ?, player_name = ?, identity_confidence = ?, \
         season_id = ?, {stats}, updated_at = ? \
         WHERE match_id = ? AND team_id = ? AND player_key = ?"
    )
});

static TEAM_INSERT: Lazy<String> = Lazy::new(|| {
    let stats = stat_names().join(", ");
    let count = 6 + CANONICAL_FIELDS.len() + 1;
    format!(
        "INSERT INTO match_team (match_team_id, match_id, team_id, team_name, \
         identity_confidence, season_id, {stats}, updated_at) VALUES ({})",
        placeholders(count)
    )
});

static TEAM_UPDATE: Lazy<String> = Lazy::new(|| {
    let stats = stat_names()
        .iter()
        .map(|name| format!("{name} = ?"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE match_team SET team_name = ?, identity_confidence = ?, season_id = ?, {stats}, \
         updated_at = ? WHERE match_id = ? AND team_id = ?"
    )
});

fn field_sql_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Int(v) => Value::Integer(*v),
        FieldValue::Float(v) => Value::Real(*v),
        FieldValue::Text(v) => Value::Text(v.clone()),
        FieldValue::Absent => Value::Null,
    }
}

fn stat_values(record: &EntityRecord) -> Vec<Value> {
    CANONICAL_FIELDS
        .iter()
        .map(|spec| field_sql_value(record.fields.get(spec.name)))
        .collect()
}

enum Outcome {
    Inserted,
    Updated,
    Skipped,
}

/// Persist one table's records in a single transaction: the batch commits or
/// is abandoned as a unit. Individual records that fail to write are counted
/// and logged without aborting their siblings.
pub fn write_batch(conn: &mut Connection, records: &[EntityRecord]) -> Result<WriteReport> {
    let tx = conn.transaction().context("begin write transaction")?;
    let mut report = WriteReport::default();
    for record in records {
        match write_record(&tx, record) {
            Ok(Outcome::Inserted) => report.inserted += 1,
            Ok(Outcome::Updated) => report.updated += 1,
            Ok(Outcome::Skipped) => report.skipped += 1,
            Err(err) => {
                report.failed += 1;
                tracing::warn!(key = %record.key.describe(), "write failed: {err:#}");
            }
        }
    }
    tx.commit().context("commit write transaction")?;
    Ok(report)
}

fn write_record(tx: &Transaction<'_>, record: &EntityRecord) -> Result<Outcome> {
    if record.is_team_level() {
        write_team_record(tx, record)
    } else {
        write_player_record(tx, record)
    }
}

/// Conditional upsert keyed by natural key: insert if absent, update only
/// when the incoming confidence is equal-or-better than the stored one. A
/// previously Exact-resolved identity is never downgraded by a later Fuzzy
/// resolution of the same source.
fn write_player_record(tx: &Transaction<'_>, record: &EntityRecord) -> Result<Outcome> {
    let key = &record.key;
    let player_key = key.player_key.as_deref().unwrap_or_default();
    let stored: Option<String> = tx
        .query_row(
            "SELECT identity_confidence FROM match_player \
             WHERE match_id = ?1 AND team_id = ?2 AND player_key = ?3",
            params![key.match_id, key.team_id, player_key],
            |row| row.get(0),
        )
        .optional()
        .context("query stored confidence")?;

    let player = record.player.as_ref();
    let player_id = player.and_then(|p| p.resolved_id.clone());
    let player_name = player.map(|p| p.display_name.clone()).unwrap_or_default();
    let now = Utc::now().to_rfc3339();

    match stored {
        None => {
            let mut values: Vec<Value> = vec![
                Value::Text(record_id("mp_", key)),
                Value::Text(key.match_id.clone()),
                Value::Text(key.team_id.clone()),
                player_id.map(Value::Text).unwrap_or(Value::Null),
                Value::Text(player_key.to_string()),
                Value::Text(player_name),
                Value::Text(record.confidence.as_str().to_string()),
                record.season_id.clone().map(Value::Text).unwrap_or(Value::Null),
            ];
            values.extend(stat_values(record));
            values.push(Value::Text(now));
            tx.execute(&PLAYER_INSERT, params_from_iter(values))
                .context("insert match_player")?;
            Ok(Outcome::Inserted)
        }
        Some(stored) => {
            if record.confidence < Confidence::from_str(&stored) {
                return Ok(Outcome::Skipped);
            }
            let mut values: Vec<Value> = vec![
                player_id.map(Value::Text).unwrap_or(Value::Null),
                Value::Text(player_name),
                Value::Text(record.confidence.as_str().to_string()),
                record.season_id.clone().map(Value::Text).unwrap_or(Value::Null),
            ];
            values.extend(stat_values(record));
            values.push(Value::Text(now));
            values.push(Value::Text(key.match_id.clone()));
            values.push(Value::Text(key.team_id.clone()));
            values.push(Value::Text(player_key.to_string()));
            tx.execute(&PLAYER_UPDATE, params_from_iter(values))
                .context("update match_player")?;
            Ok(Outcome::Updated)
        }
    }
}

fn write_team_record(tx: &Transaction<'_>, record: &EntityRecord) -> Result<Outcome> {
    let key = &record.key;
    let stored: Option<String> = tx
        .query_row(
            "SELECT identity_confidence FROM match_team WHERE match_id = ?1 AND team_id = ?2",
            params![key.match_id, key.team_id],
            |row| row.get(0),
        )
        .optional()
        .context("query stored team confidence")?;

    let now = Utc::now().to_rfc3339();

    match stored {
        None => {
            let mut values: Vec<Value> = vec![
                Value::Text(record_id("mt_", key)),
                Value::Text(key.match_id.clone()),
                Value::Text(key.team_id.clone()),
                Value::Text(record.team.display_name.clone()),
                Value::Text(record.confidence.as_str().to_string()),
                record.season_id.clone().map(Value::Text).unwrap_or(Value::Null),
            ];
            values.extend(stat_values(record));
            values.push(Value::Text(now));
            tx.execute(&TEAM_INSERT, params_from_iter(values))
                .context("insert match_team")?;
            Ok(Outcome::Inserted)
        }
        Some(stored) => {
            if record.confidence < Confidence::from_str(&stored) {
                return Ok(Outcome::Skipped);
            }
            let mut values: Vec<Value> = vec![
                Value::Text(record.team.display_name.clone()),
                Value::Text(record.confidence.as_str().to_string()),
                record.season_id.clone().map(Value::Text).unwrap_or(Value::Null),
            ];
            values.extend(stat_values(record));
            values.push(Value::Text(now));
            values.push(Value::Text(key.match_id.clone()));
            values.push(Value::Text(key.team_id.clone()));
            tx.execute(&TEAM_UPDATE, params_from_iter(values))
                .context("update match_team")?;
            Ok(Outcome::Updated)
        }
    }
}

/// Audit row for one ingest run, errors recorded as a JSON array.
pub fn record_ingest_run(
    conn: &Connection,
    started_at: &str,
    finished_at: &str,
    tables_total: usize,
    tables_failed: usize,
    report: &WriteReport,
    errors: &[String],
) -> Result<()> {
    let errors_json = serde_json::to_string(errors).unwrap_or_else(|_| "[]".to_string());
    conn.execute(
        "INSERT INTO ingest_runs(started_at, finished_at, tables_total, tables_failed, \
         records_inserted, records_updated, records_skipped, records_failed, errors_json) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            started_at,
            finished_at,
            tables_total as i64,
            tables_failed as i64,
            report.inserted as i64,
            report.updated as i64,
            report.skipped as i64,
            report.failed as i64,
            errors_json,
        ],
    )
    .context("insert ingest run")?;
    Ok(())
}
