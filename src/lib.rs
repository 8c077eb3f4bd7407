//! my-ai-agent: a query orchestration service
//!
//! Takes a natural-language query with an optional image or PDF attachment,
//! augments it with web search and OCR text when useful, and answers through
//! a generation backend either in one response or as a WebSocket stream.

pub mod ai;
pub mod app;
pub mod assembler;
pub mod attachment;
pub mod error;
pub mod generation;
pub mod history;
pub mod intent;
pub mod models;
pub mod ocr;
pub mod prompts;
pub mod search;
pub mod server;
pub mod stream;

pub use error::{Error, Result};
