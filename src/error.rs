use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Data not loaded: {0}")]
    NotLoaded(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Excel error: {0}")]
    Excel(#[from] calamine::XlsxError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("{0}")]
    General(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("InvalidData: {0}")]
    InvalidData(String),

    /// A weight table whose fractions do not form a probability distribution.
    #[error(
        "fraction of fuel transfers for {vessel} servicing {facility} does not sum to 1 in {}",
        .source_file.display()
    )]
    DataIntegrity {
        facility: String,
        vessel: String,
        source_file: PathBuf,
    },
}

#[cfg(feature = "python")]
impl From<TraceError> for pyo3::PyErr {
    fn from(err: TraceError) -> pyo3::PyErr {
        match err {
            TraceError::InvalidArgument(_) => {
                pyo3::exceptions::PyValueError::new_err(err.to_string())
            }
            other => pyo3::exceptions::PyRuntimeError::new_err(other.to_string()),
        }
    }
}

#[cfg(feature = "python")]
impl From<pyo3::PyErr> for TraceError {
    fn from(err: pyo3::PyErr) -> Self {
        TraceError::General(err.to_string())
    }
}

pub type Result<T, E = TraceError> = std::result::Result<T, E>;
