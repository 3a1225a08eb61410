use thiserror::Error;

/// Everything that can go wrong while acquiring, reshaping or persisting a dataset.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("FTP transfer failed: {0}")]
    Ftp(#[from] suppaftp::FtpError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A cell that should hold a number or timestamp could not be parsed.
    #[error("Parse error at line {line}: {message}")]
    Parse { line: u64, message: String },

    #[error("Column '{0}' not found in table header")]
    MissingColumn(String),

    #[error("FTP directory '{0}' is empty")]
    EmptyListing(String),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// The stored file was readable but does not hold a time/depth grid.
    #[error("Malformed dataset file: {0}")]
    Format(String),

    #[error("Unsupported file extension: .{0}")]
    UnsupportedFormat(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl AcquireError {
    /// Whether the error came from decoding file contents rather than from
    /// the filesystem or the network.
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            AcquireError::Csv(_)
                | AcquireError::Parse { .. }
                | AcquireError::MissingColumn(_)
                | AcquireError::Arrow(_)
                | AcquireError::Parquet(_)
                | AcquireError::Format(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AcquireError>;
