use thiserror::Error;

#[derive(Error, Debug)]
pub enum InsightsError {
    #[error("Sheet is empty: no data rows found")]
    EmptySheet,

    #[error("Sheet has {found} columns: at least {required} are required")]
    InsufficientColumns { found: usize, required: usize },

    #[error("No sales data available for analysis: upload at least one month first")]
    NoData,

    #[error("Gemini API request failed: {0}")]
    Request(String),

    #[error("Gemini API key is not configured")]
    MissingApiKey,

    #[error("Invalid month index {0}: must be between 0 and 11")]
    InvalidMonth(usize),

    #[error("Unsupported spreadsheet format: {0}")]
    UnsupportedFormat(String),

    #[error("Workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(feature = "gemini")]
impl From<reqwest::Error> for InsightsError {
    fn from(err: reqwest::Error) -> Self {
        InsightsError::Request(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, InsightsError>;
