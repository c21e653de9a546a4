//! Scraping client for TGStat's channel search and post feeds.
//!
//! TGStat exposes its analytics data only through server-rendered HTML
//! fragments wrapped in JSON envelopes from authenticated AJAX endpoints.
//! This crate maintains the anti-forgery token and cookie jar those
//! endpoints require, drives their two pagination protocols (page/offset
//! for channel search, post-id cursor for channel feeds), and extracts
//! typed records from markup whose selectors are only partially stable,
//! degrading field by field instead of failing a batch.
//!
//! The HTTP transport is injected as a [`http_client::HttpClient`] trait
//! object, so any backend (curl, wasm, or a test double) can be used.

pub mod client;
pub mod envelope;
pub mod error;
pub mod headers;
pub mod numbers;
pub mod parsing;
pub mod session;
pub mod types;

mod driver;

pub use client::TgStatClient;
pub use envelope::{PageCursor, PageEnvelope};
pub use error::TgStatError;
pub use parsing::TgStatParser;
pub use session::TokenSession;
pub use types::{
    ChannelRecord, ChannelSearchParams, PostRecord, ScrapeConfig, SearchSort, NOT_AVAILABLE,
};

// Re-export scraper types for testing
pub use scraper::Html;

pub type Result<T> = std::result::Result<T, TgStatError>;
