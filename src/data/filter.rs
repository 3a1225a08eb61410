use std::collections::HashSet;

use log::{debug, info, trace};

use super::model::{Dataset, Depth, RawTable, Record};
use crate::config::DepthGrid;

// ---------------------------------------------------------------------------
// Reshape pipeline: raw table → keyed, deduplicated, gridded dataset
// ---------------------------------------------------------------------------

/// Which variables must be present for a row to survive [`complete_records`].
/// `None` means every variable of the table.
pub type Required<'a> = Option<&'a [String]>;

/// Keep only rows with a time, a depth and every required variable.
pub fn complete_records(table: &RawTable, required: Required<'_>) -> Vec<Record> {
    let required_idx: Vec<usize> = match required {
        None => (0..table.variables.len()).collect(),
        Some(names) => table
            .variables
            .iter()
            .enumerate()
            .filter(|(_, v)| names.contains(*v))
            .map(|(i, _)| i)
            .collect(),
    };

    table
        .records
        .iter()
        .filter_map(|raw| {
            let (Some(time), Some(depth)) = (raw.time, raw.depth) else {
                trace!("line {}: missing time or depth", raw.line);
                return None;
            };
            if let Some(&i) = required_idx.iter().find(|&&i| raw.values[i].is_none()) {
                trace!("line {}: no {} reading", raw.line, table.variables[i]);
                return None;
            }
            Some(Record {
                time,
                depth: Depth::new(depth),
                values: raw.values.clone(),
            })
        })
        .collect()
}

/// Drop every record whose (time, depth) key was already seen.
pub fn dedupe_first(records: Vec<Record>) -> Vec<Record> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|rec| seen.insert(rec.key()))
        .collect()
}

/// Keep only records whose depth lies on the sampling grid.
pub fn restrict_to_grid(records: Vec<Record>, grid: &DepthGrid) -> Vec<Record> {
    records
        .into_iter()
        .filter(|rec| grid.contains(rec.depth.value()))
        .collect()
}

/// Run the full pipeline and build the time × depth grid.
pub fn reshape(table: &RawTable, required: Required<'_>, grid: &DepthGrid) -> Dataset {
    let total = table.records.len();

    let complete = complete_records(table, required);
    let n_complete = complete.len();

    let unique = dedupe_first(complete);
    let n_unique = unique.len();

    let gridded = restrict_to_grid(unique, grid);
    debug!(
        "reshape: {total} rows, {} incomplete, {} duplicate keys, {} off-grid",
        total - n_complete,
        n_complete - n_unique,
        n_unique - gridded.len()
    );

    let dataset = Dataset::from_records(&table.depth_name, &table.variables, &gridded);
    info!(
        "dataset: {} times x {} {} levels, {} variables",
        dataset.times().len(),
        dataset.depths().len(),
        dataset.depth_name(),
        dataset.variables().len()
    );
    dataset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::RawRecord;
    use chrono::{NaiveDate, NaiveDateTime};

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2018, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn raw(line: u64, depth: f64, values: Vec<Option<f64>>) -> RawRecord {
        RawRecord {
            line,
            time: Some(t0()),
            depth: Some(depth),
            values,
        }
    }

    fn table(variables: &[&str], records: Vec<RawRecord>) -> RawTable {
        RawTable {
            depth_name: "pressure".to_string(),
            variables: variables.iter().map(|v| v.to_string()).collect(),
            records,
        }
    }

    #[test]
    fn duplicate_and_off_grid_rows_are_dropped() {
        let table = table(
            &["temp"],
            vec![
                raw(2, 0.5, vec![Some(5.0)]),
                raw(3, 0.5, vec![Some(9.0)]),
                raw(4, 1.3, vec![Some(6.0)]),
            ],
        );
        let ds = reshape(&table, None, &DepthGrid::default());

        assert_eq!(ds.times(), &[t0()]);
        assert_eq!(ds.depths(), &[Depth::new(0.5)]);
        assert_eq!(ds.get("temp", t0(), 0.5), Some(5.0));
        assert_eq!(ds.records().len(), 1);
    }

    #[test]
    fn incomplete_rows_are_dropped() {
        let mut no_time = raw(4, 2.0, vec![Some(1.0), Some(2.0)]);
        no_time.time = None;
        let table = table(
            &["temp", "oxygen"],
            vec![
                raw(2, 0.5, vec![Some(5.0), None]),
                raw(3, 1.0, vec![Some(6.0), Some(7.0)]),
                no_time,
            ],
        );

        let all = complete_records(&table, None);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].depth, Depth::new(1.0));

        let required = vec!["temp".to_string()];
        let temp_only = complete_records(&table, Some(&required));
        assert_eq!(temp_only.len(), 2);
        assert_eq!(temp_only[0].values, vec![Some(5.0), None]);
    }

    #[test]
    fn first_duplicate_wins_even_when_later_is_complete() {
        let records = vec![
            Record {
                time: t0(),
                depth: Depth::new(1.0),
                values: vec![Some(1.0)],
            },
            Record {
                time: t0(),
                depth: Depth::new(1.0),
                values: vec![Some(2.0)],
            },
        ];
        let unique = dedupe_first(records);
        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0].values, vec![Some(1.0)]);
    }

    #[test]
    fn every_key_unique_and_every_depth_on_grid() {
        let grid = DepthGrid {
            step: 0.5,
            max_depth: 10.0,
        };
        let mut records = Vec::new();
        for i in 0..200u32 {
            let depth = (i % 37) as f64 * 0.3;
            let mut rec = raw(i as u64, depth, vec![Some(i as f64)]);
            rec.time = t0().checked_add_signed(chrono::Duration::hours((i % 5) as i64));
            records.push(rec);
        }
        let ds = reshape(&table(&["temp"], records), None, &grid);

        for depth in ds.depths() {
            assert!(grid.contains(depth.value()), "{depth} is off the grid");
        }
        let keys: Vec<_> = ds.records().iter().map(Record::key).collect();
        let unique: HashSet<_> = keys.iter().collect();
        assert_eq!(keys.len(), unique.len());
    }
}
