//! CSV export of harvested records.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use article_harvest::ItemRecord;

/// Column order of every export.
pub const HEADER: [&str; 7] = [
    "title",
    "description",
    "published_date",
    "asset_reference",
    "asset_local_name",
    "phrase_count",
    "has_currency_mention",
];

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Write a single row, quoting fields per RFC 4180.
pub fn write_row<W: Write, S: AsRef<str>>(mut w: W, row: &[S]) -> io::Result<()> {
    let mut first = true;
    for cell in row {
        let cell = cell.as_ref();
        if !first {
            write!(w, ",")?;
        } else {
            first = false;
        }
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{cell}")?;
        }
    }
    // RFC 4180 line ending
    write!(w, "\r\n")
}

fn record_row(record: &ItemRecord) -> [String; 7] {
    [
        record.title.clone(),
        record.description.clone(),
        record.published_date.format("%Y-%m-%d").to_string(),
        record.asset_reference.clone(),
        record.asset_local_name.clone(),
        record.phrase_count.to_string(),
        record.has_currency_mention.to_string(),
    ]
}

/// Write `records` under the fixed header, in the order given.
pub fn write_to<W: Write>(mut w: W, records: &[ItemRecord]) -> io::Result<()> {
    write_row(&mut w, &HEADER)?;
    for record in records {
        write_row(&mut w, &record_row(record))?;
    }
    w.flush()
}

/// Write `records` to a CSV file, creating its directory if needed.
pub fn write_records(path: &Path, records: &[ItemRecord]) -> io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    write_to(BufWriter::new(File::create(path)?), records)
}
