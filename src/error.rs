use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashError {
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Validation: {0}")]
    Validation(String),

    #[error("InvalidData: {0}")]
    InvalidData(String),

    #[error("Insufficient data: {0}")]
    Insufficient(String),

    #[error("Append ordering: {0}")]
    AppendOrder(String),

    #[error("Unknown derive node: {0}")]
    UnknownNode(String),

    #[error("Cycle in derive graph involving: {0}")]
    Cycle(String),

    #[error("Forecast: {0}")]
    Forecast(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    General(String),
}
