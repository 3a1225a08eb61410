use std::collections::HashMap;
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, TimestampNanosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::DateTime;
use log::{debug, warn};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tempfile::NamedTempFile;

use super::filter::complete_records;
use super::loader::parse_table;
use super::model::{Dataset, Depth, Record};
use crate::error::{AcquireError, Result};
use crate::remote::TableLayout;

/// Schema metadata key naming the depth dimension.
const DEPTH_DIM_KEY: &str = "depth_dimension";

/// Time format of the `time` column in stored CSV files.
const CSV_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

// ---------------------------------------------------------------------------
// Format dispatch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFormat {
    Parquet,
    Csv,
}

impl StoreFormat {
    /// Pick the on-disk format from the file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "parquet" | "pq" => Ok(StoreFormat::Parquet),
            "csv" => Ok(StoreFormat::Csv),
            other => Err(AcquireError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Load a persisted dataset. Dispatch by extension.
pub fn load(path: &Path) -> Result<Dataset> {
    match StoreFormat::from_path(path)? {
        StoreFormat::Parquet => load_parquet(path),
        StoreFormat::Csv => load_csv(path),
    }
}

/// Persist a dataset, creating parent directories as needed.
///
/// The data goes to a temporary file in the target directory which is then
/// renamed over `path`, so readers never observe a half-written file.
pub fn save(dataset: &Dataset, path: &Path) -> Result<()> {
    let format = StoreFormat::from_path(path)?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    match format {
        StoreFormat::Parquet => write_parquet(dataset, tmp.as_file().try_clone()?)?,
        StoreFormat::Csv => write_csv(dataset, tmp.as_file_mut())?,
    }
    tmp.persist(path).map_err(|e| e.error)?;

    debug!("wrote {} cells to {}", dataset.n_cells(), path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Cache probing
// ---------------------------------------------------------------------------

/// What is currently stored at a local cache path.
#[derive(Debug)]
pub enum CacheState {
    Missing,
    Ready(Dataset),
    /// A file exists but does not decode as a dataset.
    Unreadable(AcquireError),
}

/// Classify the cache at `path`.
///
/// Only decoding failures are reported as [`CacheState::Unreadable`];
/// filesystem errors such as a permission denial are returned as errors.
pub fn probe(path: &Path) -> Result<CacheState> {
    if !path.is_file() {
        return Ok(CacheState::Missing);
    }
    match load(path) {
        Ok(dataset) => Ok(CacheState::Ready(dataset)),
        Err(e) if e.is_decode() => {
            warn!("cached file {} is unreadable: {e}", path.display());
            Ok(CacheState::Unreadable(e))
        }
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

/// One row per grid cell: `time`, the depth column, then one nullable
/// column per variable.
fn to_record_batch(dataset: &Dataset) -> Result<RecordBatch> {
    let mut fields = vec![
        Field::new(
            "time",
            DataType::Timestamp(TimeUnit::Nanosecond, None),
            false,
        ),
        Field::new(dataset.depth_name(), DataType::Float64, false),
    ];
    for var in dataset.variables() {
        fields.push(Field::new(&var.name, DataType::Float64, true));
    }
    let metadata = HashMap::from([(
        DEPTH_DIM_KEY.to_string(),
        dataset.depth_name().to_string(),
    )]);
    let schema = Arc::new(Schema::new_with_metadata(fields, metadata));

    let mut times = Vec::with_capacity(dataset.n_cells());
    let mut depths = Vec::with_capacity(dataset.n_cells());
    for (time, depth, _) in dataset.cells() {
        let nanos = time.and_utc().timestamp_nanos_opt().ok_or_else(|| {
            AcquireError::Format(format!("{time} is outside the nanosecond timestamp range"))
        })?;
        times.push(nanos);
        depths.push(depth.value());
    }

    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(TimestampNanosecondArray::from(times)),
        Arc::new(Float64Array::from(depths)),
    ];
    for var in dataset.variables() {
        columns.push(Arc::new(Float64Array::from(var.values.clone())));
    }

    Ok(RecordBatch::try_new(schema, columns)?)
}

fn write_parquet(dataset: &Dataset, file: File) -> Result<()> {
    let batch = to_record_batch(dataset)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn load_parquet(path: &Path) -> Result<Dataset> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();

    if schema.fields().len() < 2 {
        return Err(AcquireError::Format(
            "expected time and depth columns".to_string(),
        ));
    }
    let depth_name = schema
        .metadata()
        .get(DEPTH_DIM_KEY)
        .cloned()
        .unwrap_or_else(|| schema.field(1).name().clone());

    let time_idx = schema
        .index_of("time")
        .map_err(|_| AcquireError::Format("missing 'time' column".to_string()))?;
    let depth_idx = schema
        .index_of(&depth_name)
        .map_err(|_| AcquireError::Format(format!("missing '{depth_name}' column")))?;

    let var_cols: Vec<(usize, String)> = schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != time_idx && *i != depth_idx)
        .map(|(i, f)| (i, f.name().clone()))
        .collect();

    let reader = builder.build()?;
    let mut records = Vec::new();

    for batch_result in reader {
        let batch = batch_result?;
        let times = downcast::<TimestampNanosecondArray>(&batch, time_idx)?;
        let depths = downcast::<Float64Array>(&batch, depth_idx)?;
        let vars = var_cols
            .iter()
            .map(|(i, _)| downcast::<Float64Array>(&batch, *i))
            .collect::<Result<Vec<_>>>()?;

        for row in 0..batch.num_rows() {
            let time = DateTime::from_timestamp_nanos(times.value(row)).naive_utc();
            let values = vars
                .iter()
                .map(|arr| (!arr.is_null(row)).then(|| arr.value(row)))
                .collect();
            records.push(Record {
                time,
                depth: Depth::new(depths.value(row)),
                values,
            });
        }
    }

    let names: Vec<String> = var_cols.into_iter().map(|(_, name)| name).collect();
    Ok(Dataset::from_records(&depth_name, &names, &records))
}

fn downcast<'a, T: 'static>(batch: &'a RecordBatch, idx: usize) -> Result<&'a T> {
    let col = batch.column(idx);
    col.as_any().downcast_ref::<T>().ok_or_else(|| {
        AcquireError::Format(format!(
            "column '{}' has unexpected type {:?}",
            batch.schema().field(idx).name(),
            col.data_type()
        ))
    })
}

/// Render the first `n_rows` cells as a text table.
pub fn preview(dataset: &Dataset, n_rows: usize) -> Result<String> {
    let batch = to_record_batch(dataset)?;
    let head = batch.slice(0, n_rows.min(batch.num_rows()));
    Ok(arrow::util::pretty::pretty_format_batches(&[head])?.to_string())
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

fn write_csv(dataset: &Dataset, file: &mut File) -> Result<()> {
    let mut writer = csv::Writer::from_writer(file);

    let mut header = vec!["time".to_string(), dataset.depth_name().to_string()];
    header.extend(dataset.variable_names().iter().map(|n| n.to_string()));
    writer.write_record(&header)?;

    for (time, depth, values) in dataset.cells() {
        let mut row = vec![
            time.format(CSV_TIME_FORMAT).to_string(),
            depth.value().to_string(),
        ];
        row.extend(values.iter().map(|v| v.map(|x| x.to_string()).unwrap_or_default()));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

fn load_csv(path: &Path) -> Result<Dataset> {
    let payload = fs::read(path)?;

    let depth_name = {
        let mut reader = csv::Reader::from_reader(payload.as_slice());
        let headers = reader.headers()?;
        if headers.get(0) != Some("time") {
            return Err(AcquireError::Format("first column must be 'time'".to_string()));
        }
        headers
            .get(1)
            .ok_or_else(|| AcquireError::Format("missing depth column".to_string()))?
            .to_string()
    };

    let layout = TableLayout {
        time_column: "time".to_string(),
        depth_column: depth_name,
        time_format: CSV_TIME_FORMAT.to_string(),
        ..TableLayout::default()
    };
    let table = parse_table(&payload, &layout)?;

    // Empty cells are part of the grid; only the coordinates are required.
    let coordinates_only: &[String] = &[];
    let records = complete_records(&table, Some(coordinates_only));
    Ok(Dataset::from_records(
        &table.depth_name,
        &table.variables,
        &records,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn t(day: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2018, 1, day)
            .unwrap()
            .and_hms_opt(h, 15, 0)
            .unwrap()
    }

    fn sample() -> Dataset {
        let names = vec!["temperature".to_string(), "salinity".to_string()];
        let records = vec![
            Record {
                time: t(1, 0),
                depth: Depth::new(0.5),
                values: vec![Some(5.0), Some(30.25)],
            },
            Record {
                time: t(1, 0),
                depth: Depth::new(1.0),
                values: vec![Some(4.75), None],
            },
            Record {
                time: t(8, 12),
                depth: Depth::new(60.0),
                values: vec![None, Some(31.5)],
            },
        ];
        Dataset::from_records("pressure", &names, &records)
    }

    #[test]
    fn parquet_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/bbmp.parquet");

        let ds = sample();
        save(&ds, &path).unwrap();
        assert!(path.is_file());
        assert_eq!(load(&path).unwrap(), ds);
    }

    #[test]
    fn csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bbmp.csv");

        let ds = sample();
        save(&ds, &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("time,pressure,temperature,salinity\n"));
        assert!(text.contains("2018-01-01T00:15:00,1,4.75,\n"));
        assert_eq!(load(&path).unwrap(), ds);
    }

    #[test]
    fn sub_millisecond_times_stay_distinct() {
        let base = NaiveDate::from_ymd_opt(2015, 10, 27)
            .unwrap()
            .and_hms_micro_opt(16, 5, 12, 400)
            .unwrap();
        let later = base + chrono::Duration::microseconds(400);
        let records = vec![
            Record {
                time: base,
                depth: Depth::new(10.0),
                values: vec![Some(9.5)],
            },
            Record {
                time: later,
                depth: Depth::new(10.0),
                values: vec![Some(9.4)],
            },
        ];
        let ds = Dataset::from_records("depth", &["temperature".to_string()], &records);

        let dir = tempfile::tempdir().unwrap();
        for name in ["glider.parquet", "glider.csv"] {
            let path = dir.path().join(name);
            save(&ds, &path).unwrap();
            let loaded = load(&path).unwrap();
            assert_eq!(loaded.times(), &[base, later], "{name}");
            assert_eq!(loaded.get("temperature", later, 10.0), Some(9.4), "{name}");
            assert_eq!(loaded, ds);
        }
    }

    #[test]
    fn time_beyond_nanosecond_range_is_rejected() {
        let far = NaiveDate::from_ymd_opt(2300, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let ds = Dataset::from_records(
            "pressure",
            &["temperature".to_string()],
            &[Record {
                time: far,
                depth: Depth::new(0.5),
                values: vec![Some(1.0)],
            }],
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("far.parquet");

        let err = save(&ds, &path).unwrap_err();
        assert!(matches!(err, AcquireError::Format(_)));
        assert!(!path.exists());
    }

    #[test]
    fn empty_dataset_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let ds = Dataset::from_records("pressure", &["temperature".to_string()], &[]);
        for name in ["empty.parquet", "empty.csv"] {
            let path = dir.path().join(name);
            save(&ds, &path).unwrap();
            assert_eq!(load(&path).unwrap(), ds);
        }
    }

    #[test]
    fn unsupported_extension() {
        let err = save(&sample(), Path::new("out.nc")).unwrap_err();
        assert!(matches!(err, AcquireError::UnsupportedFormat(ref e) if e == "nc"));
    }

    #[test]
    fn probe_states() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.parquet");
        assert!(matches!(probe(&missing).unwrap(), CacheState::Missing));

        let corrupt = dir.path().join("corrupt.parquet");
        fs::write(&corrupt, b"not a parquet file").unwrap();
        assert!(matches!(probe(&corrupt).unwrap(), CacheState::Unreadable(_)));

        let good = dir.path().join("good.csv");
        save(&sample(), &good).unwrap();
        match probe(&good).unwrap() {
            CacheState::Ready(ds) => assert_eq!(ds, sample()),
            other => panic!("expected ready cache, got {other:?}"),
        }
    }

    #[test]
    fn preview_lists_cells() {
        let text = preview(&sample(), 2).unwrap();
        assert!(text.contains("temperature"));
        assert!(text.contains("4.75"));
        assert!(!text.contains("31.5"));
    }
}
