use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::table::{ColumnLabel, RawTable};

/// One stat table lifted out of a saved match-report page, with the team
/// code and stat category recovered from the table's element id.
#[derive(Debug)]
pub struct HtmlStatTable {
    pub team_code: String,
    pub category: String,
    pub table: RawTable,
}

/// Match-report stat tables carry ids like `stats_e813709a_summary`; the
/// middle token is the team's short code.
static TABLE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^stats_([0-9a-f]{8})_([a-z0-9_]+)$").unwrap());

/// Pull every recognizable stat table out of a saved match page. Pages with
/// no stat tables produce an empty vec, not an error — old seasons are
/// missing whole categories.
pub fn extract_stat_tables(html: &str) -> Vec<HtmlStatTable> {
    let document = Html::parse_document(html);
    let table_sel = Selector::parse("table").unwrap();

    let mut out = Vec::new();
    for element in document.select(&table_sel) {
        let Some(id) = element.value().attr("id") else {
            continue;
        };
        let Some(captures) = TABLE_ID.captures(id) else {
            continue;
        };
        out.push(HtmlStatTable {
            team_code: captures[1].to_string(),
            category: captures[2].to_string(),
            table: extract_table(element),
        });
    }
    out
}

fn extract_table(table: ElementRef<'_>) -> RawTable {
    let head_row_sel = Selector::parse("thead tr").unwrap();
    let body_row_sel = Selector::parse("tbody tr").unwrap();
    let cell_sel = Selector::parse("th, td").unwrap();

    let header_rows: Vec<Vec<(String, usize)>> = table
        .select(&head_row_sel)
        .map(|row| {
            row.select(&cell_sel)
                .map(|cell| {
                    let span = cell
                        .value()
                        .attr("colspan")
                        .and_then(|v| v.parse::<usize>().ok())
                        .unwrap_or(1)
                        .max(1);
                    (cell_text(cell), span)
                })
                .collect()
        })
        .collect();

    let columns = header_columns(&header_rows);

    let rows = table
        .select(&body_row_sel)
        .map(|row| row.select(&cell_sel).map(cell_text).collect::<Vec<_>>())
        .collect();

    RawTable { columns, rows }
}

/// Build column labels from the table's header rows. With two or more rows,
/// the second-to-last is the group row (its cells expanded across their
/// colspan) and the last carries the real labels — the same bottom-row
/// preference the page layout implies.
fn header_columns(header_rows: &[Vec<(String, usize)>]) -> Vec<ColumnLabel> {
    let Some(under) = header_rows.last() else {
        return Vec::new();
    };

    if header_rows.len() < 2 {
        return under
            .iter()
            .map(|(text, _)| ColumnLabel::single(text.clone()))
            .collect();
    }

    let over = &header_rows[header_rows.len() - 2];
    let mut groups = Vec::new();
    for (text, span) in over {
        for _ in 0..*span {
            groups.push(text.clone());
        }
    }

    under
        .iter()
        .enumerate()
        .map(|(pos, (label, _))| {
            let group = groups.get(pos).map(String::as_str).unwrap_or("").trim();
            if group.is_empty() {
                ColumnLabel::single(label.clone())
            } else {
                ColumnLabel::grouped(group, label.clone())
            }
        })
        .collect()
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}
