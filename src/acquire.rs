//! Fetch-or-load acquisition of a dataset.
//!
//! [`Acquirer::acquire`] returns the dataset stored at a local path when one
//! decodes cleanly. Otherwise it downloads the remote table, reshapes it
//! into a time × depth grid, writes it to the local path and returns it.

use std::io::Read;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use suppaftp::FtpStream;

use crate::config::{AcquireConfig, FtpLogin};
use crate::data::filter::reshape;
use crate::data::loader::parse_table;
use crate::data::model::Dataset;
use crate::data::store::{self, CacheState, StoreFormat};
use crate::error::{AcquireError, Result};
use crate::remote::{expand_year, RemoteDescriptor, RemoteSource};

// ---------------------------------------------------------------------------
// Fetch – retrieval of the raw payload
// ---------------------------------------------------------------------------

/// Retrieves the raw bytes behind a [`RemoteSource`].
pub trait Fetch {
    fn fetch(&self, source: &RemoteSource) -> Result<Vec<u8>>;
}

/// Blocking FTP / HTTP client.
pub struct NetworkFetcher {
    http: reqwest::blocking::Client,
    ftp: FtpLogin,
}

impl NetworkFetcher {
    pub fn new(config: &AcquireConfig) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.http_timeout())
            .build()?;
        Ok(Self {
            http,
            ftp: config.ftp.clone(),
        })
    }

    fn fetch_http(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.http.get(url).send()?.error_for_status()?;
        Ok(response.bytes()?.to_vec())
    }

    fn fetch_ftp(&self, server: &str, path: &str, file: Option<&str>) -> Result<Vec<u8>> {
        let path = expand_year(path);
        let mut ftp = FtpStream::connect((server, self.ftp.port))?;
        ftp.login(self.ftp.user.as_str(), self.ftp.password.as_str())?;
        if !path.is_empty() {
            ftp.cwd(&path)?;
        }

        let name = match file {
            Some(name) => name.to_string(),
            None => {
                let listing = ftp.nlst(None)?;
                debug!("{} entries in {path}", listing.len());
                listing
                    .last()
                    .cloned()
                    .ok_or_else(|| AcquireError::EmptyListing(path.clone()))?
            }
        };
        info!("retrieving ftp://{server}/{path}/{name}");

        let payload = ftp.retr_as_buffer(&name)?.into_inner();
        if let Err(e) = ftp.quit() {
            warn!("closing FTP session to {server}: {e}");
        }
        Ok(payload)
    }
}

impl Fetch for NetworkFetcher {
    fn fetch(&self, source: &RemoteSource) -> Result<Vec<u8>> {
        match source {
            RemoteSource::Ftp { server, path, file } => {
                self.fetch_ftp(server, path, file.as_deref())
            }
            RemoteSource::Http { url } => self.fetch_http(url),
            RemoteSource::File { path } => {
                let mut buf = Vec::new();
                std::fs::File::open(path)?.read_to_end(&mut buf)?;
                Ok(buf)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Acquirer
// ---------------------------------------------------------------------------

pub struct Acquirer<F = NetworkFetcher> {
    config: AcquireConfig,
    fetcher: F,
}

impl Acquirer<NetworkFetcher> {
    pub fn new(config: AcquireConfig) -> Result<Self> {
        config.validate()?;
        let fetcher = NetworkFetcher::new(&config)?;
        Ok(Self { config, fetcher })
    }
}

impl<F: Fetch> Acquirer<F> {
    pub fn with_fetcher(config: AcquireConfig, fetcher: F) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, fetcher })
    }

    pub fn config(&self) -> &AcquireConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Absolute location of a local path under the configured base directory.
    pub fn resolve(&self, local_path: &Path) -> PathBuf {
        self.config.resolve(local_path)
    }

    /// Load the dataset at `local_path`, or fetch, reshape and store it.
    ///
    /// A file that exists but fails to decode is replaced by a fresh
    /// download. Transport and parse errors propagate; nothing is written
    /// unless the whole download and reshape succeeded.
    pub fn acquire(
        &self,
        local_path: impl AsRef<Path>,
        descriptor: &RemoteDescriptor,
    ) -> Result<Dataset> {
        let path = self.resolve(local_path.as_ref());
        // Reject unknown extensions before touching the network.
        StoreFormat::from_path(&path)?;

        match store::probe(&path)? {
            CacheState::Ready(dataset) => {
                info!("loaded cached dataset {}", path.display());
                return Ok(dataset);
            }
            CacheState::Unreadable(e) => {
                warn!("refetching {} ({e})", path.display());
            }
            CacheState::Missing => {
                debug!("no cached dataset at {}", path.display());
            }
        }

        let dataset = self.fetch_remote(descriptor)?;
        store::save(&dataset, &path)?;
        info!("saved dataset to {}", path.display());
        Ok(dataset)
    }

    /// Download and reshape without touching the local cache.
    pub fn fetch_remote(&self, descriptor: &RemoteDescriptor) -> Result<Dataset> {
        // Local payloads resolve against the base directory like the cache does.
        let source = match &descriptor.source {
            RemoteSource::File { path } => RemoteSource::File {
                path: self.resolve(path),
            },
            other => other.clone(),
        };
        info!("fetching {source}");
        let payload = self.fetcher.fetch(&source)?;
        debug!("received {} bytes", payload.len());

        let layout = &descriptor.layout;
        let table = parse_table(&payload, layout)?;
        let grid = layout.grid.unwrap_or(self.config.grid);
        grid.validate()?;

        Ok(reshape(&table, layout.required.as_deref(), &grid))
    }
}
