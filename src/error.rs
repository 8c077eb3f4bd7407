//! Error handling and custom error types
//!
//! Provides unified error handling across the application using thiserror.
//! Pipeline stages convert these into degraded values at their boundary, so
//! an `Error` rarely reaches a client verbatim.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("AI provider error: {0}")]
    AiProvider(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("OCR error: {0}")]
    Ocr(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Generic error: {0}")]
    Generic(String),
}

pub type Result<T> = std::result::Result<T, Error>;
