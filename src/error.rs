use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("request to {url} failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("malformed XML")]
    Xml(#[from] quick_xml::Error),

    #[error("invalid zip archive")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error on {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path:?} is not valid UTF-8")]
    Utf8 {
        path: PathBuf,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("instrument record {record} has no {field} element")]
    MissingField { record: usize, field: &'static str },

    #[error("archive contains no extractable entries")]
    EmptyArchive,

    #[error("failed to write CSV")]
    Csv(#[from] csv::Error),

    #[error("invalid configuration")]
    Config(#[from] config::ConfigError),

    #[error("publication window starts {from} but ends {to}")]
    InvalidWindow { from: NaiveDate, to: NaiveDate },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Pipeline step a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Locate,
    Extract,
    Flatten,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Locate => "locate",
            Stage::Extract => "extract",
            Stage::Flatten => "flatten",
            Stage::Write => "write",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: Error,
}

/// Attach a pipeline stage to a crate error.
pub trait AtStage<T> {
    fn at(self, stage: Stage) -> std::result::Result<T, StageError>;
}

impl<T> AtStage<T> for Result<T> {
    fn at(self, stage: Stage) -> std::result::Result<T, StageError> {
        self.map_err(|source| StageError { stage, source })
    }
}
