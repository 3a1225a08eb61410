//! Where a dataset comes from and how its table is laid out.
//!
//! A [`RemoteDescriptor`] pairs a [`RemoteSource`] (FTP, HTTP or a local
//! payload) with a [`TableLayout`] describing which columns to read and
//! which of them hold the time and depth coordinates. Descriptors
//! deserialize from JSON:
//!
//! ```json
//! {
//!   "source": { "kind": "ftp", "server": "ftp.dfo-mpo.gc.ca",
//!               "path": "BIOWebMaster/BBMP/CSV",
//!               "file": "bbmp_aggregated_profiles.csv" },
//!   "layout": { "columns": [{ "index": 0 }, { "index": 6 }, { "index": 7 }],
//!               "time_column": "time_string",
//!               "depth_column": "pressure" }
//! }
//! ```

use std::fmt;
use std::path::PathBuf;

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DepthGrid;

// ---------------------------------------------------------------------------
// RemoteSource
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemoteSource {
    /// A file on an FTP server. Without `file`, the last entry of the
    /// directory listing is retrieved.
    Ftp {
        server: String,
        path: String,
        #[serde(default)]
        file: Option<String>,
    },
    /// Any HTTP(S) endpoint returning delimited text.
    Http { url: String },
    /// A payload already on disk.
    File { path: PathBuf },
}

impl RemoteSource {
    /// ERDDAP `tabledap` query returning the given columns as `.csvp`.
    pub fn erddap(base_url: &str, dataset_id: &str, columns: &[&str]) -> Self {
        RemoteSource::Http {
            url: format!(
                "{}/{}.csvp?{}",
                base_url.trim_end_matches('/'),
                dataset_id,
                columns.join("%2C")
            ),
        }
    }
}

/// Replace `{year}` with the current UTC year.
pub fn expand_year(path: &str) -> String {
    path.replace("{year}", &Utc::now().year().to_string())
}

impl fmt::Display for RemoteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteSource::Ftp { server, path, file } => {
                let path = path.trim_matches('/');
                match file {
                    Some(file) => write!(f, "ftp://{server}/{path}/{file}"),
                    None => write!(f, "ftp://{server}/{path}/<latest>"),
                }
            }
            RemoteSource::Http { url } => write!(f, "{url}"),
            RemoteSource::File { path } => write!(f, "file://{}", path.display()),
        }
    }
}

// ---------------------------------------------------------------------------
// TableLayout
// ---------------------------------------------------------------------------

/// One selected column: by zero-based position or by header name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnSpec {
    Index {
        index: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rename: Option<String>,
    },
    Name {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rename: Option<String>,
    },
}

impl ColumnSpec {
    pub fn index(index: usize) -> Self {
        ColumnSpec::Index { index, rename: None }
    }

    pub fn name(name: &str) -> Self {
        ColumnSpec::Name {
            name: name.to_string(),
            rename: None,
        }
    }

    pub fn renamed(self, to: &str) -> Self {
        let rename = Some(to.to_string());
        match self {
            ColumnSpec::Index { index, .. } => ColumnSpec::Index { index, rename },
            ColumnSpec::Name { name, .. } => ColumnSpec::Name { name, rename },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableLayout {
    /// Metadata lines preceding the header row.
    pub skip_rows: usize,
    /// Columns to read; empty means every column of the header.
    pub columns: Vec<ColumnSpec>,
    pub time_column: String,
    pub depth_column: String,
    /// `chrono` format string for the time column.
    pub time_format: String,
    /// Variables that must be present for a row to be kept; all when absent.
    pub required: Option<Vec<String>>,
    /// Overrides the configured depth grid for this source.
    pub grid: Option<DepthGrid>,
}

impl Default for TableLayout {
    fn default() -> Self {
        Self {
            skip_rows: 0,
            columns: Vec::new(),
            time_column: "time".to_string(),
            depth_column: "pressure".to_string(),
            time_format: "%Y-%m-%d %H:%M:%S".to_string(),
            required: None,
            grid: None,
        }
    }
}

// ---------------------------------------------------------------------------
// RemoteDescriptor + presets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDescriptor {
    pub source: RemoteSource,
    #[serde(default)]
    pub layout: TableLayout,
}

const BBMP_SERVER: &str = "ftp.dfo-mpo.gc.ca";
const BBMP_PATH: &str = "BIOWebMaster/BBMP/CSV";
const OTN_ERDDAP: &str = "http://belafonte.ocean.dal.ca:8080/erddap/tabledap";

const GLIDER_COLUMNS: [(&str, &str); 10] = [
    ("time", "time"),
    ("depth", "depth"),
    ("latitude", "lat"),
    ("longitude", "lon"),
    ("conductivity", "conductivity"),
    ("temperature", "temperature"),
    ("salinity", "salinity"),
    ("density", "density"),
    ("pressure", "pressure"),
    ("profile_id", "profile_id"),
];

impl RemoteDescriptor {
    /// Bedford Basin Monitoring Program: all CTD casts in one aggregated CSV.
    pub fn bbmp_aggregated() -> Self {
        RemoteDescriptor {
            source: RemoteSource::Ftp {
                server: BBMP_SERVER.to_string(),
                path: BBMP_PATH.to_string(),
                file: Some("bbmp_aggregated_profiles.csv".to_string()),
            },
            layout: Self::bbmp_layout(),
        }
    }

    /// Column layout of the aggregated BBMP profile file.
    pub fn bbmp_layout() -> TableLayout {
        TableLayout {
            columns: [0, 6, 7, 13, 14, 15]
                .into_iter()
                .map(ColumnSpec::index)
                .collect(),
            time_column: "time_string".to_string(),
            depth_column: "pressure".to_string(),
            // Casts keep rows with blank sensor cells; only the keys must parse.
            required: Some(Vec::new()),
            ..TableLayout::default()
        }
    }

    /// Ocean Tracking Network glider deployment served by ERDDAP.
    pub fn otn_glider(dataset_id: &str) -> Self {
        let remote_names: Vec<&str> = GLIDER_COLUMNS.iter().map(|(remote, _)| *remote).collect();
        RemoteDescriptor {
            source: RemoteSource::erddap(OTN_ERDDAP, dataset_id, &remote_names),
            layout: TableLayout {
                // .csvp headers carry units ("time (UTC)"), so select by position.
                columns: GLIDER_COLUMNS
                    .iter()
                    .enumerate()
                    .map(|(i, (_, local))| ColumnSpec::index(i).renamed(local))
                    .collect(),
                time_column: "time".to_string(),
                depth_column: "depth".to_string(),
                time_format: "%Y-%m-%dT%H:%M:%SZ".to_string(),
                required: None,
                grid: Some(DepthGrid {
                    step: 0.5,
                    max_depth: 1000.0,
                }),
                ..TableLayout::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erddap_url_joins_columns() {
        let src = RemoteSource::erddap("http://host/erddap/tabledap/", "abc", &["time", "depth"]);
        assert_eq!(
            src,
            RemoteSource::Http {
                url: "http://host/erddap/tabledap/abc.csvp?time%2Cdepth".to_string()
            }
        );
    }

    #[test]
    fn glider_preset_url() {
        let desc = RemoteDescriptor::otn_glider("otn200_20151027_53_delayed");
        let RemoteSource::Http { url } = &desc.source else {
            panic!("expected HTTP source");
        };
        assert!(url.ends_with(
            "otn200_20151027_53_delayed.csvp?time%2Cdepth%2Clatitude%2Clongitude%2Cconductivity%2Ctemperature%2Csalinity%2Cdensity%2Cpressure%2Cprofile_id"
        ));
        assert_eq!(desc.layout.columns.len(), 10);
        assert_eq!(desc.layout.depth_column, "depth");
    }

    #[test]
    fn bbmp_preset_keeps_rows_with_blank_variables() {
        let desc = RemoteDescriptor::bbmp_aggregated();
        assert_eq!(desc.layout.required, Some(Vec::new()));
        assert_eq!(desc.layout.depth_column, "pressure");

        let glider = RemoteDescriptor::otn_glider("otn200_20151027_53_delayed");
        assert_eq!(glider.layout.required, None);
    }

    #[test]
    fn year_placeholder() {
        let expanded = expand_year("BIOWebMaster/BBMP/CSV/{year}");
        assert!(!expanded.contains("{year}"));
        assert!(expanded.starts_with("BIOWebMaster/BBMP/CSV/20"));
    }

    #[test]
    fn descriptor_from_json() {
        let desc: RemoteDescriptor = serde_json::from_str(
            r#"{
                "source": { "kind": "ftp", "server": "ftp.example.org", "path": "casts/{year}" },
                "layout": {
                    "skip_rows": 10,
                    "columns": [{ "index": 0, "rename": "time" }, { "name": "pressure" }],
                    "time_format": "%Y-%m-%dT%H:%M:%S"
                }
            }"#,
        )
        .unwrap();

        assert_eq!(
            desc.source,
            RemoteSource::Ftp {
                server: "ftp.example.org".to_string(),
                path: "casts/{year}".to_string(),
                file: None,
            }
        );
        assert_eq!(desc.layout.skip_rows, 10);
        assert_eq!(
            desc.layout.columns,
            vec![ColumnSpec::index(0).renamed("time"), ColumnSpec::name("pressure")]
        );
        assert_eq!(desc.layout.depth_column, "pressure");
        assert_eq!(desc.source.to_string(), "ftp://ftp.example.org/casts/{year}/<latest>");
    }
}
