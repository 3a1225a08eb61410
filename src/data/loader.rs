use chrono::NaiveDateTime;
use log::debug;

use super::model::{RawRecord, RawTable};
use crate::error::{AcquireError, Result};
use crate::remote::{ColumnSpec, TableLayout};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Parse a delimited payload into raw records according to `layout`.
///
/// The first `layout.skip_rows` lines are metadata and are discarded; the
/// next line is the header. Empty cells and `NaN`/`NA` become missing values.
/// A non-empty cell that is not a number (or, for the time column, does not
/// match `layout.time_format`) is a parse error.
pub fn parse_table(payload: &[u8], layout: &TableLayout) -> Result<RawTable> {
    let body = skip_lines(payload, layout.skip_rows);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(body);

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let columns = resolve_columns(&headers, &layout.columns)?;

    let position_of = |wanted: &str| {
        columns
            .iter()
            .position(|(_, name)| name == wanted)
            .ok_or_else(|| AcquireError::MissingColumn(wanted.to_string()))
    };
    let time_pos = position_of(&layout.time_column)?;
    let depth_pos = position_of(&layout.depth_column)?;

    // Everything except the two coordinates is a measured variable.
    let var_cols: Vec<(usize, String)> = columns
        .iter()
        .enumerate()
        .filter(|(pos, _)| *pos != time_pos && *pos != depth_pos)
        .map(|(_, col)| col.clone())
        .collect();

    let time_idx = columns[time_pos].0;
    let depth_idx = columns[depth_pos].0;
    let line_offset = layout.skip_rows as u64;

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0) + line_offset;

        let time = parse_time(record.get(time_idx).unwrap_or(""), &layout.time_format, line)?;
        let depth = parse_value(record.get(depth_idx).unwrap_or(""), line)?;
        let values = var_cols
            .iter()
            .map(|(idx, _)| parse_value(record.get(*idx).unwrap_or(""), line))
            .collect::<Result<Vec<_>>>()?;

        records.push(RawRecord {
            line,
            time,
            depth,
            values,
        });
    }

    debug!(
        "parsed {} rows with {} variables",
        records.len(),
        var_cols.len()
    );

    Ok(RawTable {
        depth_name: layout.depth_column.clone(),
        variables: var_cols.into_iter().map(|(_, name)| name).collect(),
        records,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Drop the first `n` lines of `payload`.
fn skip_lines(payload: &[u8], n: usize) -> &[u8] {
    let mut rest = payload;
    for _ in 0..n {
        match rest.iter().position(|&b| b == b'\n') {
            Some(pos) => rest = &rest[pos + 1..],
            None => return &[],
        }
    }
    rest
}

/// Map the column selection onto header positions and output names.
fn resolve_columns(headers: &[String], specs: &[ColumnSpec]) -> Result<Vec<(usize, String)>> {
    if specs.is_empty() {
        return Ok(headers.iter().cloned().enumerate().collect());
    }

    specs
        .iter()
        .map(|spec| match spec {
            ColumnSpec::Index { index, rename } => {
                let header = headers
                    .get(*index)
                    .ok_or_else(|| AcquireError::MissingColumn(format!("#{index}")))?;
                Ok((*index, rename.clone().unwrap_or_else(|| header.clone())))
            }
            ColumnSpec::Name { name, rename } => {
                let index = headers
                    .iter()
                    .position(|h| h == name)
                    .ok_or_else(|| AcquireError::MissingColumn(name.clone()))?;
                Ok((index, rename.clone().unwrap_or_else(|| name.clone())))
            }
        })
        .collect()
}

fn is_missing(cell: &str) -> bool {
    cell.is_empty() || cell.eq_ignore_ascii_case("nan") || cell == "NA"
}

fn parse_value(cell: &str, line: u64) -> Result<Option<f64>> {
    if is_missing(cell) {
        return Ok(None);
    }
    let value = cell.parse::<f64>().map_err(|_| AcquireError::Parse {
        line,
        message: format!("'{cell}' is not a number"),
    })?;
    Ok(Some(value).filter(|v| !v.is_nan()))
}

fn parse_time(cell: &str, format: &str, line: u64) -> Result<Option<NaiveDateTime>> {
    if is_missing(cell) {
        return Ok(None);
    }
    NaiveDateTime::parse_from_str(cell, format)
        .map(Some)
        .map_err(|e| AcquireError::Parse {
            line,
            message: format!("'{cell}' does not match time format '{format}': {e}"),
        })
}
