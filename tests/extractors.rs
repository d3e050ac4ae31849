use std::fs;
use std::path::PathBuf;

use nwsl_ingest::csv_table::{CsvHeader, read_csv_table};
use nwsl_ingest::fields::FieldValue;
use nwsl_ingest::html_table::extract_stat_tables;
use nwsl_ingest::identity::{Confidence, InMemoryIndex};
use nwsl_ingest::pipeline::{TableContext, process_table};
use nwsl_ingest::table::normalize;

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn read_fixture(name: &str) -> String {
    fs::read_to_string(fixture_path(name)).expect("fixture file should be readable")
}

#[test]
fn match_page_yields_one_table_per_team_and_category() {
    let raw = read_fixture("match_008e301f.html");
    let tables = extract_stat_tables(&raw);
    assert_eq!(tables.len(), 3);

    let codes: Vec<&str> = tables.iter().map(|t| t.team_code.as_str()).collect();
    assert_eq!(codes, vec!["e813709a", "85c458aa", "e813709a"]);
    assert_eq!(tables[0].category, "summary");
    assert_eq!(tables[2].category, "passing");
}

#[test]
fn extracted_tables_normalize_without_row_loss() {
    let raw = read_fixture("match_008e301f.html");
    for stat_table in extract_stat_tables(&raw) {
        let rows = normalize(&stat_table.table).expect("normalizes");
        assert_eq!(rows.len(), stat_table.table.rows.len());
    }
}

#[test]
fn match_page_flows_through_the_pipeline() {
    let raw = read_fixture("match_008e301f.html");
    let tables = extract_stat_tables(&raw);
    let summary = tables
        .iter()
        .find(|t| t.team_code == "e813709a" && t.category == "summary")
        .expect("thorns summary table");

    let mut index = InMemoryIndex::new();
    index.push_team("t_thorns", "Portland Thorns FC", Some("e813709a"));
    index.push_player("p_ssmith", "Sophia Smith");
    index.push_player("p_coffey", "Sam Coffey");

    let ctx = TableContext {
        match_id: "008e301f".to_string(),
        season_id: Some("2024".to_string()),
        team_code: Some(summary.team_code.clone()),
        team_name: None,
    };
    let batch = process_table(&summary.table, &ctx, &index).expect("processes");

    // Team resolves by code even though the page never names it.
    assert!(batch.failures.is_empty());
    assert_eq!(batch.player_rows, 2);
    assert_eq!(batch.team_totals, 1);

    let smith = batch
        .records
        .iter()
        .find(|r| r.player.as_ref().is_some_and(|p| p.display_name == "Sophia Smith"))
        .expect("smith record");
    assert_eq!(smith.confidence, Confidence::Exact);
    assert_eq!(smith.fields.get("goals"), &FieldValue::Int(2));
    assert_eq!(smith.fields.get("xg"), &FieldValue::Float(1.4));

    let coffey = batch
        .records
        .iter()
        .find(|r| r.player.as_ref().is_some_and(|p| p.display_name == "Sam Coffey"))
        .expect("coffey record");
    // Empty and em-dash cells stay absent, never zero.
    assert!(coffey.fields.get("goals").is_absent());
    assert!(coffey.fields.get("shots_on_target").is_absent());
    assert_eq!(coffey.fields.get("yellow_cards"), &FieldValue::Int(1));
}

#[test]
fn season_csv_two_row_header_maps_cleanly() {
    let table = read_csv_table(&fixture_path("summary_2016.csv"), CsvHeader::TwoRow)
        .expect("csv reads");
    assert_eq!(table.rows.len(), 4);

    let mut index = InMemoryIndex::new();
    index.push_team("t_reign", "Seattle Reign FC", None);
    index.push_player("p_fishlock", "Jess Fishlock");
    index.push_player("p_rapinoe", "Megan Rapinoe");

    let ctx = TableContext {
        match_id: "sea_2016".to_string(),
        season_id: Some("2016".to_string()),
        team_code: None,
        team_name: Some("Seattle Reign FC".to_string()),
    };
    let batch = process_table(&table, &ctx, &index).expect("processes");

    assert_eq!(batch.player_rows, 3);
    assert_eq!(batch.team_totals, 1);
    assert!(batch.failures.is_empty());

    let rapinoe = batch
        .records
        .iter()
        .find(|r| r.player.as_ref().is_some_and(|p| p.display_name == "Megan Rapinoe"))
        .expect("rapinoe record");
    // "1.0" in an integer column coerces through float.
    assert_eq!(rapinoe.fields.get("goals"), &FieldValue::Int(1));

    let yanez = batch
        .records
        .iter()
        .find(|r| r.player.as_ref().is_some_and(|p| p.display_name == "Beverly Yanez"))
        .expect("yanez record");
    assert!(yanez.fields.get("goals").is_absent());
    assert_eq!(yanez.confidence, Confidence::Unresolved);
}
