use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use nwsl_ingest::classify::classify;
use nwsl_ingest::fields::{CANONICAL_FIELDS, map_fields};
use nwsl_ingest::identity::InMemoryIndex;
use nwsl_ingest::pipeline::{TableContext, process_table};
use nwsl_ingest::table::{ColumnLabel, RawTable, normalize};

fn synthetic_table(players: usize) -> RawTable {
    let columns = vec![
        ColumnLabel::single("Player"),
        ColumnLabel::single("#"),
        ColumnLabel::single("Pos"),
        ColumnLabel::single("Min"),
        ColumnLabel::grouped("Performance", "Gls"),
        ColumnLabel::grouped("Performance", "Ast"),
        ColumnLabel::grouped("Performance", "Sh"),
        ColumnLabel::grouped("Performance", "SoT"),
        ColumnLabel::grouped("Expected", "xG"),
        ColumnLabel::grouped("Expected", "xAG"),
    ];
    let mut rows = Vec::with_capacity(players + 1);
    for i in 0..players {
        rows.push(vec![
            format!("Player {i} Surname{i}"),
            format!("{}", i % 30),
            "MF".to_string(),
            "90".to_string(),
            format!("{}", i % 3),
            "1".to_string(),
            "4".to_string(),
            "2".to_string(),
            "0.4".to_string(),
            "0.2".to_string(),
        ]);
    }
    rows.push(vec![
        format!("{players} Players"),
        String::new(),
        String::new(),
        "990".to_string(),
        "2".to_string(),
        "1".to_string(),
        "9".to_string(),
        "5".to_string(),
        "1.2".to_string(),
        "0.8".to_string(),
    ]);
    RawTable { columns, rows }
}

fn seeded_index(players: usize) -> InMemoryIndex {
    let mut index = InMemoryIndex::new();
    index.push_team("t_bench", "Bench Town FC", Some("0badc0de"));
    for i in 0..players {
        index.push_player(format!("p_{i}"), format!("Player {i} Surname{i}"));
    }
    index
}

fn bench_normalize_and_map(c: &mut Criterion) {
    let table = synthetic_table(500);
    c.bench_function("normalize_classify_map_500_rows", |b| {
        b.iter(|| {
            let rows = normalize(black_box(&table)).expect("normalizes");
            let mut populated = 0usize;
            for row in rows {
                let classified = classify(row);
                let fields = map_fields(&classified.row, CANONICAL_FIELDS);
                populated += fields.populated();
            }
            black_box(populated)
        })
    });
}

fn bench_process_table(c: &mut Criterion) {
    let table = synthetic_table(200);
    let index = seeded_index(200);
    let ctx = TableContext {
        match_id: "benchmark".to_string(),
        season_id: Some("2024".to_string()),
        team_code: Some("0badc0de".to_string()),
        team_name: None,
    };
    c.bench_function("process_table_200_players", |b| {
        b.iter(|| {
            let batch = process_table(black_box(&table), &ctx, &index).expect("processes");
            black_box(batch.records.len())
        })
    });
}

criterion_group!(benches, bench_normalize_and_map, bench_process_table);
criterion_main!(benches);
