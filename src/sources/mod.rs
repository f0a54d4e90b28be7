//! Content sources for the digest.
//!
//! One submodule per external source. Each module keeps its network call
//! separate from a pure parse function, so the fragile extraction can be
//! exercised offline against fixture bodies.
//!
//! # Sources
//!
//! | Source | Module | Method | Feeds |
//! |--------|--------|--------|-------|
//! | RSS feeds | [`rss`] | XML deserialization | World news |
//! | Google Books | [`google_books`] | JSON API | English books, Chinese last resort |
//! | Open Library | [`open_library`] | JSON API | Chinese books |
//! | KCLS BiblioCommons lists | [`kcls`] | HTML scraping (DOM, then regex) | Chinese books |
//! | Award pages | [`award`] | Regex over `《…》` titles | Chinese books |
//!
//! # Failure handling
//!
//! A non-success status is surfaced as [`DigestError::Status`]. Multi-page
//! sources skip the failing page and keep going; single-call sources return
//! the error to the pipeline, which records it as a note in the email.

pub mod award;
pub mod google_books;
pub mod kcls;
pub mod open_library;
pub mod rss;

use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::error::{DigestError, Result};
use crate::models::Book;
use crate::utils::truncate_for_log;

pub const USER_AGENT: &str = concat!("kids_digest/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Multi-page sources never fetch more than this many configured pages.
pub const MAX_PAGES_PER_SOURCE: usize = 8;

/// Shared HTTP client for every source and API call in a run.
pub fn build_client() -> Result<Client> {
    Ok(Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()?)
}

/// Query parameters whose values never leave the process.
const SECRET_PARAMS: &[&str] = &["key", "api_key", "apikey", "token", "access_token"];

/// Replace secret query values with `REDACTED`.
///
/// Error messages end up in the email and the archive, so every URL that
/// goes into one passes through here first.
pub fn redact_url(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };
    if !parsed
        .query_pairs()
        .any(|(k, _)| SECRET_PARAMS.contains(&k.to_lowercase().as_str()))
    {
        return url.to_string();
    }
    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| {
            let v = if SECRET_PARAMS.contains(&k.to_lowercase().as_str()) {
                "REDACTED".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), v)
        })
        .collect();
    parsed.query_pairs_mut().clear().extend_pairs(pairs);
    parsed.to_string()
}

/// GET `url` and return the body as text.
///
/// # Arguments
///
/// * `client` - The shared client from [`build_client`]
/// * `url` - Absolute URL; may carry an API key in its query
///
/// # Returns
///
/// The body on any status below 400. Otherwise [`DigestError::Status`] with a
/// short body preview. Neither error variant carries the raw URL: transport
/// errors have it stripped and `Status` holds the [`redact_url`] form.
#[instrument(level = "debug", skip_all, fields(url = %redact_url(url)))]
pub async fn fetch_text(client: &Client, url: &str) -> Result<String> {
    let resp = client.get(url).send().await.map_err(reqwest::Error::without_url)?;
    let status = resp.status();
    let body = resp.text().await.map_err(reqwest::Error::without_url)?;
    if status.as_u16() >= 400 {
        return Err(DigestError::Status {
            url: redact_url(url),
            status: status.as_u16(),
            body: truncate_for_log(&body, 200),
        });
    }
    debug!(bytes = body.len(), status = status.as_u16(), "Fetched");
    Ok(body)
}

/// Extracts book candidates from one scraped page.
///
/// Implementations are pure: HTML in, books out. Scrapers that try several
/// layouts hold a prioritized list of parsers and keep the first non-empty
/// result.
pub trait PageParser {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn extract(&self, html: &str) -> Vec<Book>;
}

/// Run `parsers` in order and return the first non-empty extraction.
pub fn first_successful(parsers: &[&dyn PageParser], html: &str) -> Vec<Book> {
    for parser in parsers {
        let books = parser.extract(html);
        if !books.is_empty() {
            debug!(parser = parser.name(), count = books.len(), "Parser matched page");
            return books;
        }
    }
    Vec::new()
}
