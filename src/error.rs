//! Error type shared by every stage of the digest run.
//!
//! Stages return `Result<_, DigestError>`; the pipeline turns a failed stage
//! into a note in the email instead of aborting the run.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DigestError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("script generation failed: {0}")]
    Llm(String),

    #[error("speech synthesis failed: {0}")]
    Tts(String),

    #[error("email delivery failed: {0}")]
    Email(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, DigestError>;
