use anyhow::Result;
use chrono::Utc;
use rayon::prelude::*;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, warn};

use crate::assemble::RecordAssembler;
use crate::classify::{RowKind, classify};
use crate::error::FormatError;
use crate::fields::{CANONICAL_FIELDS, map_fields};
use crate::identity::{Confidence, EntityIndex, EntityKind, resolve, resolve_team};
use crate::store::{self, WriteReport};
use crate::table::RawTable;

/// Identifying context the fetch layer hands over with each table.
#[derive(Debug, Clone, Default)]
pub struct TableContext {
    pub match_id: String,
    pub season_id: Option<String>,
    /// Short code recovered from table/file metadata, when present. Exact
    /// by construction, so it beats name-based team resolution.
    pub team_code: Option<String>,
    pub team_name: Option<String>,
}

/// Everything one table produced: the assembled records plus the per-row
/// outcome counts a caller reports on.
#[derive(Debug)]
pub struct TableBatch {
    pub match_id: String,
    pub records: Vec<crate::assemble::EntityRecord>,
    pub player_rows: usize,
    pub team_totals: usize,
    pub noise_rows: usize,
    pub failures: Vec<String>,
}

/// Run one table through the full stage chain: normalize, classify, map,
/// resolve, assemble. Pure with respect to the store; only `FormatError`
/// aborts the table, every other problem is local to a row or a field.
pub fn process_table(
    table: &RawTable,
    ctx: &TableContext,
    index: &dyn EntityIndex,
) -> Result<TableBatch, FormatError> {
    let rows = crate::table::normalize(table)?;

    let team = resolve_team(
        index,
        ctx.team_name.as_deref().unwrap_or(""),
        ctx.team_code.as_deref(),
    );
    if team.confidence == Confidence::Unresolved {
        warn!(
            match_id = %ctx.match_id,
            team = %team.display_name,
            "team unresolved; rows in this table will be rejected"
        );
    }
    let mut assembler = RecordAssembler::new(&ctx.match_id, ctx.season_id.clone(), team);

    let mut batch = TableBatch {
        match_id: ctx.match_id.clone(),
        records: Vec::with_capacity(rows.len()),
        player_rows: 0,
        team_totals: 0,
        noise_rows: 0,
        failures: Vec::new(),
    };

    for row in rows {
        let classified = classify(row);
        match classified.kind {
            RowKind::Blank | RowKind::HeaderNoise => {
                batch.noise_rows += 1;
            }
            RowKind::TeamTotal => {
                batch.team_totals += 1;
                let fields = map_fields(&classified.row, CANONICAL_FIELDS);
                match assembler.assemble(&classified, fields, None) {
                    Ok(record) => batch.records.push(record),
                    Err(err) => batch.failures.push(err.to_string()),
                }
            }
            RowKind::PlayerEntry => {
                batch.player_rows += 1;
                let fields = map_fields(&classified.row, CANONICAL_FIELDS);
                let name = classified.row.leading.trim().to_string();
                let player = resolve(index, EntityKind::Player, &name);
                if player.confidence == Confidence::Unresolved {
                    debug!(match_id = %ctx.match_id, player = %name, "player unresolved");
                }
                match assembler.assemble(&classified, fields, Some(player)) {
                    Ok(record) => batch.records.push(record),
                    Err(err) => batch.failures.push(err.to_string()),
                }
            }
        }
    }

    Ok(batch)
}

/// Aggregate outcome of one ingest run across tables.
#[derive(Debug, Default, Serialize)]
pub struct IngestSummary {
    pub tables_total: usize,
    pub tables_failed: usize,
    pub assembly_failures: usize,
    pub write: WriteReport,
    pub errors: Vec<String>,
}

/// Process many independent tables and persist their batches. The per-table
/// stage chain fans out over the rayon pool; the store is the single shared
/// boundary, so batches are written sequentially, each in its own
/// transaction (committed-or-abandoned as a unit). A table that fails to
/// normalize is reported and skipped, never fatal to the run.
pub fn ingest_tables(
    conn: &mut Connection,
    index: &dyn EntityIndex,
    tables: &[(RawTable, TableContext)],
) -> Result<IngestSummary> {
    let started_at = Utc::now().to_rfc3339();

    let batches: Vec<Result<TableBatch, String>> = tables
        .par_iter()
        .map(|(table, ctx)| {
            process_table(table, ctx, index)
                .map_err(|err| format!("table {}: {err}", ctx.match_id))
        })
        .collect();

    let mut summary = IngestSummary {
        tables_total: tables.len(),
        ..IngestSummary::default()
    };

    for batch in batches {
        match batch {
            Ok(batch) => {
                debug!(
                    match_id = %batch.match_id,
                    records = batch.records.len(),
                    players = batch.player_rows,
                    "table processed"
                );
                summary.assembly_failures += batch.failures.len();
                summary
                    .errors
                    .extend(batch.failures.iter().map(|f| format!("{}: {f}", batch.match_id)));
                let report = store::write_batch(conn, &batch.records)?;
                summary.write.merge(report);
            }
            Err(err) => {
                summary.tables_failed += 1;
                summary.errors.push(err);
            }
        }
    }

    let finished_at = Utc::now().to_rfc3339();
    store::record_ingest_run(
        conn,
        &started_at,
        &finished_at,
        summary.tables_total,
        summary.tables_failed,
        &summary.write,
        &summary.errors,
    )?;

    Ok(summary)
}
