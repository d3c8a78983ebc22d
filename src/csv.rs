// src/csv.rs
use std::io::{self, Write};

use crate::dataset::Dataset;

fn needs_quotes(field: &str, sep: char) -> bool {
    field.contains(sep) || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Write a single CSV/TSV row to any writer.
pub fn write_row<W: Write, S: AsRef<str>>(mut w: W, row: &[S], sep: char) -> io::Result<()> {
    let mut first = true;
    for cell in row {
        let cell = cell.as_ref();
        if !first { write!(w, "{}", sep)?; } else { first = false; }
        if needs_quotes(cell, sep) {
            let escaped = cell.replace('"', "\"\"");
            write!(w, "\"{}\"", escaped)?;
        } else {
            write!(w, "{}", cell)?;
        }
    }
    writeln!(w)
}

/// Stream a dataset: optional header line, then one line per row in row order.
/// Missing cells become empty fields.
pub fn write_dataset<W: Write>(mut w: W, ds: &Dataset, include_headers: bool, sep: char) -> io::Result<()> {
    if include_headers {
        write_row(&mut w, ds.columns(), sep)?;
    }
    for cells in ds.iter_rows() {
        let fields: Vec<String> = cells.into_iter().map(|c| c.to_string()).collect();
        write_row(&mut w, &fields, sep)?;
    }
    Ok(())
}

/// Whole export as a string (for previews and tests).
pub fn to_export_string(ds: &Dataset, include_headers: bool, sep: char) -> String {
    let mut buf: Vec<u8> = Vec::new();
    let _ = write_dataset(&mut buf, ds, include_headers, sep);

    match String::from_utf8(buf) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(&e.into_bytes()).into_owned(),
    }
}
