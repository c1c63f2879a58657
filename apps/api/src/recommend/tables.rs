//! Row lookup in customer CSV tables.
//!
//! Tables have arbitrary schemas; the first column is taken to be the product
//! name. Parsing is lenient: ragged rows are accepted and malformed records
//! are skipped.

use tracing::warn;

/// A matched row as `(column, value)` pairs, empty cells omitted.
pub type Row = Vec<(String, String)>;

/// Finds the row describing `product_name`: an exact (case-insensitive,
/// trimmed) match on the first column wins, otherwise the first row whose
/// first column contains the name.
pub fn find_product_row(csv_text: &str, product_name: &str) -> Option<Row> {
    let needle = product_name.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    let text = csv_text.trim_start_matches('\u{FEFF}');
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = match reader.headers() {
        Ok(h) => h.clone(),
        Err(e) => {
            warn!("Failed to read CSV headers: {e}");
            return None;
        }
    };

    let mut partial: Option<csv::StringRecord> = None;
    for result in reader.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("Skipping malformed CSV record: {e}");
                continue;
            }
        };
        let first = record.get(0).unwrap_or_default().trim().to_lowercase();
        if first == needle {
            return Some(to_row(&headers, &record));
        }
        if partial.is_none() && first.contains(&needle) {
            partial = Some(record);
        }
    }

    partial.map(|record| to_row(&headers, &record))
}

fn to_row(headers: &csv::StringRecord, record: &csv::StringRecord) -> Row {
    headers
        .iter()
        .zip(record.iter())
        .map(|(h, v)| (h.trim().to_string(), v.trim().to_string()))
        .filter(|(_, v)| !v.is_empty())
        .collect()
}

/// Renders a row as `- column: value` lines.
pub fn render_row(row: &Row) -> String {
    row.iter()
        .map(|(column, value)| format!("- {column}: {value}\n"))
        .collect()
}
