use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::EnvFilter;

use nwsl_ingest::csv_table::{CsvHeader, read_csv_table};
use nwsl_ingest::html_table::extract_stat_tables;
use nwsl_ingest::identity::InMemoryIndex;
use nwsl_ingest::pipeline::{TableContext, ingest_tables};
use nwsl_ingest::store;
use nwsl_ingest::table::RawTable;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let db_path = flag_value(&args, "--db")
        .map(PathBuf::from)
        .or_else(|| std::env::var("NWSL_INGEST_DB").ok().map(PathBuf::from))
        .ok_or_else(|| anyhow!("no database path; pass --db or set NWSL_INGEST_DB"))?;
    let season_id = flag_value(&args, "--season");
    let team_name = flag_value(&args, "--team");
    let two_row_header = args.iter().any(|a| a == "--two-row-header");

    let files = collect_files(&args)?;
    if files.is_empty() {
        return Err(anyhow!("no .html or .csv inputs given"));
    }

    let mut conn = store::open_db(&db_path)?;
    let index = InMemoryIndex::from_store(&conn)?;

    let mut tables: Vec<(RawTable, TableContext)> = Vec::new();
    for file in &files {
        let match_id = match_id_from_path(file);
        match file.extension().and_then(|e| e.to_str()) {
            Some("html") => {
                let raw = fs::read_to_string(file)
                    .with_context(|| format!("read {}", file.display()))?;
                for stat_table in extract_stat_tables(&raw) {
                    // The summary category carries the canonical field set;
                    // the other category tables repeat its columns in finer
                    // splits the store does not model.
                    if stat_table.category != "summary" {
                        continue;
                    }
                    tables.push((
                        stat_table.table,
                        TableContext {
                            match_id: match_id.clone(),
                            season_id: season_id.clone(),
                            team_code: Some(stat_table.team_code),
                            team_name: None,
                        },
                    ));
                }
            }
            Some("csv") => {
                let header = if two_row_header {
                    CsvHeader::TwoRow
                } else {
                    CsvHeader::SingleRow
                };
                let table = read_csv_table(file, header)?;
                tables.push((
                    table,
                    TableContext {
                        match_id: match_id.clone(),
                        season_id: season_id.clone(),
                        team_code: None,
                        team_name: team_name.clone(),
                    },
                ));
            }
            _ => {}
        }
    }

    let summary = ingest_tables(&mut conn, &index, &tables)?;

    if args.iter().any(|a| a == "--json") {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("serialize summary")?
        );
        return Ok(());
    }

    println!("Ingest complete");
    println!("DB: {}", db_path.display());
    println!("Files: {}", files.len());
    println!(
        "Tables: {}/{} processed",
        summary.tables_total - summary.tables_failed,
        summary.tables_total
    );
    println!(
        "Records: inserted={} updated={} skipped={} failed={}",
        summary.write.inserted, summary.write.updated, summary.write.skipped, summary.write.failed
    );
    if summary.assembly_failures > 0 {
        println!("Assembly failures: {}", summary.assembly_failures);
    }
    if !summary.errors.is_empty() {
        println!("Errors: {}", summary.errors.len());
        for err in summary.errors.iter().take(10) {
            println!(" - {err}");
        }
    }

    Ok(())
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == flag {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(next.trim().to_string());
            }
        }
    }
    None
}

/// Positional arguments are files or directories; directories are scanned
/// one level deep for .html/.csv artifacts.
fn collect_files(args: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut skip_next = false;
    for (idx, arg) in args.iter().enumerate() {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg.starts_with("--") {
            // Value-taking flags consume the next argument unless inline.
            let boolean = arg == "--two-row-header" || arg == "--json";
            if !boolean && !arg.contains('=') && args.get(idx + 1).is_some() {
                skip_next = true;
            }
            continue;
        }
        let path = PathBuf::from(arg);
        if path.is_dir() {
            let entries =
                fs::read_dir(&path).with_context(|| format!("scan {}", path.display()))?;
            for entry in entries {
                let entry = entry.with_context(|| format!("scan {}", path.display()))?;
                let child = entry.path();
                if is_input_file(&child) {
                    files.push(child);
                }
            }
        } else if is_input_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn is_input_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("html") | Some("csv")
    )
}

/// Saved artifacts are named `match_<id>.html` / `<id>.csv`; the id is the
/// stem with the `match_` prefix dropped when present.
fn match_id_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    stem.strip_prefix("match_").unwrap_or(stem).to_string()
}
