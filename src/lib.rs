//! Fetch-or-load acquisition of oceanographic profile data.
//!
//! CTD casts and glider missions are published as delimited text on FTP
//! and ERDDAP servers. This crate downloads such a table once, keeps only
//! complete rows, deduplicates them by (time, depth), restricts depths to
//! a regular sampling grid and stores the resulting time × depth grid
//! locally. Later runs read the stored grid instead of downloading again.
//!
//! ```no_run
//! use ocean_acquire::{AcquireConfig, Acquirer, RemoteDescriptor};
//!
//! let acquirer = Acquirer::new(AcquireConfig::default().with_base_dir("/data/bbmp"))?;
//! let dataset = acquirer.acquire(
//!     "data/raw/bedford_basin_monitoring_program.parquet",
//!     &RemoteDescriptor::bbmp_aggregated(),
//! )?;
//! println!("{} casts", dataset.times().len());
//! # Ok::<(), ocean_acquire::AcquireError>(())
//! ```

pub mod acquire;
pub mod config;
pub mod data;
pub mod display;
pub mod error;
pub mod remote;

pub use acquire::{Acquirer, Fetch, NetworkFetcher};
pub use config::{AcquireConfig, DepthGrid};
pub use data::model::Dataset;
pub use error::AcquireError;
pub use remote::{RemoteDescriptor, RemoteSource, TableLayout};
