use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::scrape::models::{Record, ScrapeError};

/// Known ids for the results table, tried in order. The portal has renamed
/// this element across releases.
const TABLE_IDS: [&str; 3] = ["CourseList", "gvCourseList", "tblCourses"];

/// First string argument of a `__doPostBack('target', ...)` invocation.
static POSTBACK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"__doPostBack\('([^']+)'").unwrap());

/// Extracts records from the search results page.
///
/// A `span#lblMessage` element means the server rejected the search and
/// rendered an error page instead; that short-circuits before any table
/// lookup. Header names come from the first row only; cells past the
/// header count get synthesized `Column{N}` names.
pub fn parse_listing(html: &str) -> Result<Vec<Record>, ScrapeError> {
    let doc = Html::parse_document(html);

    let message = Selector::parse("span#lblMessage").unwrap();
    if doc.select(&message).next().is_some() {
        return Err(ScrapeError::ErrorPage);
    }

    let table = find_results_table(&doc).ok_or(ScrapeError::NoTableFound)?;

    let row_sel = Selector::parse("tr").unwrap();
    let header_sel = Selector::parse("th, td").unwrap();
    let cell_sel = Selector::parse("td").unwrap();

    let mut rows = table.select(&row_sel);
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row.select(&header_sel).map(cell_text).collect(),
        None => return Ok(Vec::new()),
    };

    let mut records = Vec::new();
    for row in rows {
        let cells: Vec<String> = row.select(&cell_sel).map(cell_text).collect();
        if cells.is_empty() {
            continue;
        }

        let mut fields = IndexMap::with_capacity(cells.len());
        for (i, value) in cells.into_iter().enumerate() {
            let name = match headers.get(i) {
                Some(h) if !h.is_empty() => h.clone(),
                _ => format!("Column{}", i + 1),
            };
            fields.insert(name, value);
        }

        let postback_target = extract_postback_target(&row.html());
        records.push(Record {
            fields,
            postback_target,
        });
    }

    Ok(records)
}

/// Locates the results table: each known id in priority order, then the
/// table with the most rows. A tie on row count keeps the table seen
/// first in document order.
fn find_results_table<'a>(doc: &'a Html) -> Option<ElementRef<'a>> {
    for id in TABLE_IDS {
        let selector = Selector::parse(&format!("table#{id}")).unwrap();
        if let Some(table) = doc.select(&selector).next() {
            return Some(table);
        }
    }

    let table_sel = Selector::parse("table").unwrap();
    let row_sel = Selector::parse("tr").unwrap();
    let mut best: Option<(usize, ElementRef<'a>)> = None;
    for table in doc.select(&table_sel) {
        let rows = table.select(&row_sel).count();
        if best.as_ref().is_none_or(|(most, _)| rows > *most) {
            best = Some((rows, table));
        }
    }
    best.map(|(_, table)| table)
}

/// Finds the postback identifier embedded in one row's markup, if any.
/// Links invoking `__doPostBack` win; otherwise an input whose name
/// mentions the schedule grid is used verbatim. `None` means the row has
/// no detail page to fetch.
pub fn extract_postback_target(row_html: &str) -> Option<String> {
    let fragment = Html::parse_fragment(row_html);

    let link_sel = Selector::parse("a").unwrap();
    for link in fragment.select(&link_sel) {
        for attr in ["href", "onclick"] {
            if let Some(value) = link.value().attr(attr) {
                if let Some(caps) = POSTBACK_RE.captures(value) {
                    return Some(caps[1].to_string());
                }
            }
        }
    }

    let input_sel = Selector::parse("input").unwrap();
    for input in fragment.select(&input_sel) {
        if let Some(name) = input.value().attr("name") {
            if name.contains("Schedule") {
                return Some(name.to_string());
            }
        }
    }

    None
}

fn cell_text(el: ElementRef) -> String {
    el.text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
