#[cfg(feature = "python")]
use pyo3::exceptions::PyRuntimeError;
#[cfg(feature = "python")]
use pyo3::PyErr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TradeError {
    #[error("Failed to load {source_name}: {reason}")]
    Load { source_name: String, reason: String },

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("InvalidData: {0}")]
    InvalidData(String),

    #[error("Config: {0}")]
    Config(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TradeError {
    /// True for the errors that mean a source table could not be used at all.
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            Self::Load { .. } | Self::MissingColumn(_) | Self::InvalidData(_) | Self::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TradeError>;

#[cfg(feature = "python")]
impl From<TradeError> for PyErr {
    fn from(err: TradeError) -> PyErr {
        PyRuntimeError::new_err(err.to_string())
    }
}
