use thiserror::Error;

#[derive(Error, Debug)]
pub enum PulseError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("{source_name} API error: {message}")]
    Api { source_name: String, message: String },

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Table is empty: {0}")]
    EmptyTable(String),

    #[error("Column '{column}' is not numeric (row {row}: '{value}')")]
    NonNumeric {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Forecast failed: {0}")]
    Forecast(String),
}

impl PulseError {
    pub fn api(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        PulseError::Api {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PulseError>;
