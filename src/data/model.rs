use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDateTime;

// ---------------------------------------------------------------------------
// Depth – an orderable depth / pressure coordinate
// ---------------------------------------------------------------------------

/// Depth or pressure coordinate usable as a map key.
///
/// `-0.0` is folded into `0.0` so both compare and hash the same way.
/// NaN never reaches this type: the loader turns it into a missing value.
#[derive(Debug, Clone, Copy)]
pub struct Depth(f64);

impl Depth {
    pub fn new(value: f64) -> Self {
        if value == 0.0 {
            Depth(0.0)
        } else {
            Depth(value)
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

// -- Manual Eq/Ord so we can put Depth in BTreeMap / HashSet keys --

impl PartialEq for Depth {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for Depth {}

impl PartialOrd for Depth {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Depth {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl std::hash::Hash for Depth {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<f64> for Depth {
    fn from(value: f64) -> Self {
        Depth::new(value)
    }
}

// ---------------------------------------------------------------------------
// RawRecord / RawTable – rows as they arrive from the remote source
// ---------------------------------------------------------------------------

/// One row of the remote table. Any cell may be missing.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// 1-based line number in the payload, for diagnostics.
    pub line: u64,
    pub time: Option<NaiveDateTime>,
    pub depth: Option<f64>,
    /// One entry per variable of the owning [`RawTable`].
    pub values: Vec<Option<f64>>,
}

/// Parsed remote table: variable names plus unordered rows.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    /// Name of the depth coordinate (e.g. `pressure`).
    pub depth_name: String,
    /// Measured variable names, in column order.
    pub variables: Vec<String>,
    pub records: Vec<RawRecord>,
}

// ---------------------------------------------------------------------------
// Record – a complete row keyed by (time, depth)
// ---------------------------------------------------------------------------

/// A row that survived the completeness check.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub time: NaiveDateTime,
    pub depth: Depth,
    pub values: Vec<Option<f64>>,
}

impl Record {
    pub fn key(&self) -> (NaiveDateTime, Depth) {
        (self.time, self.depth)
    }
}

// ---------------------------------------------------------------------------
// Dataset – the labeled time × depth grid
// ---------------------------------------------------------------------------

/// One layer of the grid, stored time-major: `values[t * n_depth + d]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Cached dataset: every variable on a shared (time, depth) grid.
///
/// Axes are sorted and free of duplicates, so every (time, depth) key
/// addresses exactly one cell per variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    depth_name: String,
    times: Vec<NaiveDateTime>,
    depths: Vec<Depth>,
    variables: Vec<Variable>,
}

impl Dataset {
    /// Build the grid from records whose keys are already unique.
    ///
    /// If a key does repeat, the first record keeps its cell.
    pub fn from_records(depth_name: &str, variable_names: &[String], records: &[Record]) -> Self {
        let times: Vec<NaiveDateTime> = records
            .iter()
            .map(|r| r.time)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let depths: Vec<Depth> = records
            .iter()
            .map(|r| r.depth)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let time_idx: BTreeMap<NaiveDateTime, usize> =
            times.iter().enumerate().map(|(i, t)| (*t, i)).collect();
        let depth_idx: BTreeMap<Depth, usize> =
            depths.iter().enumerate().map(|(i, d)| (*d, i)).collect();

        let n_cells = times.len() * depths.len();
        let mut variables: Vec<Variable> = variable_names
            .iter()
            .map(|name| Variable {
                name: name.clone(),
                values: vec![None; n_cells],
            })
            .collect();
        let mut filled = vec![false; n_cells];

        for rec in records {
            let cell = time_idx[&rec.time] * depths.len() + depth_idx[&rec.depth];
            if filled[cell] {
                continue;
            }
            filled[cell] = true;
            for (var, value) in variables.iter_mut().zip(&rec.values) {
                var.values[cell] = *value;
            }
        }

        Dataset {
            depth_name: depth_name.to_string(),
            times,
            depths,
            variables,
        }
    }

    /// Name of the depth dimension.
    pub fn depth_name(&self) -> &str {
        &self.depth_name
    }

    pub fn times(&self) -> &[NaiveDateTime] {
        &self.times
    }

    pub fn depths(&self) -> &[Depth] {
        &self.depths
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable_names(&self) -> Vec<&str> {
        self.variables.iter().map(|v| v.name.as_str()).collect()
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Number of (time, depth) cells per variable.
    pub fn n_cells(&self) -> usize {
        self.times.len() * self.depths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_cells() == 0
    }

    /// Value of `name` at (time, depth), if the cell holds one.
    pub fn get(&self, name: &str, time: NaiveDateTime, depth: f64) -> Option<f64> {
        let t = self.times.binary_search(&time).ok()?;
        let d = self.depths.binary_search(&Depth::new(depth)).ok()?;
        self.variable(name)?.values[t * self.depths.len() + d]
    }

    /// Iterate over all cells as (time, depth, values of every variable).
    pub fn cells(&self) -> impl Iterator<Item = (NaiveDateTime, Depth, Vec<Option<f64>>)> + '_ {
        let n_depth = self.depths.len();
        (0..self.n_cells()).map(move |cell| {
            let values = self.variables.iter().map(|v| v.values[cell]).collect();
            (self.times[cell / n_depth], self.depths[cell % n_depth], values)
        })
    }

    /// Records for every cell holding at least one value.
    pub fn records(&self) -> Vec<Record> {
        self.cells()
            .filter(|(_, _, values)| values.iter().any(Option::is_some))
            .map(|(time, depth, values)| Record { time, depth, values })
            .collect()
    }

    /// Smallest and largest present value of a variable.
    pub fn range(&self, name: &str) -> Option<(f64, f64)> {
        self.variable(name)?
            .values
            .iter()
            .flatten()
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Sub-grid restricted to `start <= time <= end`.
    pub fn time_slice(&self, start: NaiveDateTime, end: NaiveDateTime) -> Dataset {
        let lo = self.times.partition_point(|t| *t < start);
        let hi = self.times.partition_point(|t| *t <= end).max(lo);
        let n_depth = self.depths.len();

        Dataset {
            depth_name: self.depth_name.clone(),
            times: self.times[lo..hi].to_vec(),
            depths: self.depths.clone(),
            variables: self
                .variables
                .iter()
                .map(|v| Variable {
                    name: v.name.clone(),
                    values: v.values[lo * n_depth..hi * n_depth].to_vec(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2018, 1, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn rec(h: u32, depth: f64, temp: f64) -> Record {
        Record {
            time: t(h),
            depth: Depth::new(depth),
            values: vec![Some(temp)],
        }
    }

    #[test]
    fn negative_zero_equals_zero() {
        assert_eq!(Depth::new(-0.0), Depth::new(0.0));
        assert!(Depth::new(0.5) < Depth::new(1.0));
    }

    #[test]
    fn grid_is_sorted_and_sparse() {
        let names = vec!["temperature".to_string()];
        let ds = Dataset::from_records(
            "pressure",
            &names,
            &[rec(2, 1.0, 4.0), rec(1, 0.5, 5.0), rec(1, 1.0, 6.0)],
        );

        assert_eq!(ds.times(), &[t(1), t(2)]);
        assert_eq!(ds.depths(), &[Depth::new(0.5), Depth::new(1.0)]);
        assert_eq!(ds.n_cells(), 4);
        assert_eq!(ds.get("temperature", t(1), 0.5), Some(5.0));
        assert_eq!(ds.get("temperature", t(2), 1.0), Some(4.0));
        assert_eq!(ds.get("temperature", t(2), 0.5), None);
        assert_eq!(ds.records().len(), 3);
    }

    #[test]
    fn first_record_keeps_its_cell() {
        let names = vec!["temperature".to_string()];
        let ds = Dataset::from_records("pressure", &names, &[rec(1, 0.5, 5.0), rec(1, 0.5, 9.0)]);
        assert_eq!(ds.get("temperature", t(1), 0.5), Some(5.0));
    }

    #[test]
    fn range_and_time_slice() {
        let names = vec!["temperature".to_string()];
        let ds = Dataset::from_records(
            "pressure",
            &names,
            &[rec(1, 0.5, 5.0), rec(2, 0.5, -1.0), rec(3, 0.5, 7.5)],
        );
        assert_eq!(ds.range("temperature"), Some((-1.0, 7.5)));
        assert_eq!(ds.range("salinity"), None);

        let sub = ds.time_slice(t(2), t(3));
        assert_eq!(sub.times(), &[t(2), t(3)]);
        assert_eq!(sub.get("temperature", t(3), 0.5), Some(7.5));
        assert_eq!(sub.get("temperature", t(1), 0.5), None);

        let empty = ds.time_slice(t(5), t(4));
        assert!(empty.is_empty());
    }
}
