use thiserror::Error;

/// Errors raised inside a translation job. These never propagate to the HTTP
/// layer; the job runner converts them into a terminal progress event.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("translation provider error: {0}")]
    Provider(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("font error: {0}")]
    Font(String),

    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("malformed document: {0}")]
    MalformedDocument(String),
}

pub type JobResult<T> = std::result::Result<T, JobError>;
