//! Data models for one digest run.
//!
//! Everything here lives for a single run: items are created by the source
//! fetchers, merged and ranked, rendered into the email, and then dropped.
//!
//! - [`NewsItem`]: a headline from an RSS feed
//! - [`Book`]: a book candidate from any catalog, list page, or award page
//! - [`Podcast`]: the optional narrated audio attachment
//! - [`Digest`]: everything the composer and mailer need

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::normalize_key;

/// A news headline pulled from an RSS feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NewsItem {
    pub title: String,
    /// Article URL. Also the dedup key for news.
    pub link: String,
    /// Parsed `pubDate`, if the feed carried a readable one.
    pub published_at: Option<DateTime<Utc>>,
}

/// A children's book candidate.
///
/// Books from every source are normalized into this shape before merging.
/// Empty `authors` or `blurb` mean "unknown", not an error.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Book {
    pub title: String,
    /// Comma-separated author names.
    pub authors: String,
    pub link: String,
    pub blurb: String,
    pub published_year: Option<i32>,
}

impl Book {
    /// Key used when merging sources: the same title by different authors
    /// stays as two books.
    pub fn broad_key(&self) -> String {
        format!("{}|{}", normalize_key(&self.title), normalize_key(&self.authors))
    }

    /// Key used on the finalist list: one entry per title.
    pub fn title_key(&self) -> String {
        normalize_key(&self.title)
    }

    /// Whether the book's link points at `domain`.
    pub fn from_domain(&self, domain: &str) -> bool {
        self.link.contains(domain)
    }
}

/// The narrated audio attachment.
#[derive(Clone, Deserialize, Serialize)]
pub struct Podcast {
    pub file_name: String,
    pub script: String,
    #[serde(skip)]
    pub audio: Vec<u8>,
}

impl std::fmt::Debug for Podcast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Podcast")
            .field("file_name", &self.file_name)
            .field("script_chars", &self.script.chars().count())
            .field("audio_bytes", &self.audio.len())
            .finish()
    }
}

/// The composed result of one run.
///
/// `errors` holds one human-readable note per failed source or stage; the
/// email always goes out, with the notes rendered at the bottom.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Digest {
    pub date: NaiveDate,
    pub reader_name: String,
    pub news: Vec<NewsItem>,
    pub english_books: Vec<Book>,
    pub chinese_books: Vec<Book>,
    pub errors: Vec<String>,
    pub podcast: Option<Podcast>,
}

impl Digest {
    pub fn subject(&self) -> String {
        format!(
            "Daily News + Books for {} ({})",
            self.reader_name,
            self.date.format("%Y-%m-%d")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(title: &str, authors: &str, link: &str) -> Book {
        Book {
            title: title.to_string(),
            authors: authors.to_string(),
            link: link.to_string(),
            blurb: String::new(),
            published_year: None,
        }
    }

    #[test]
    fn test_keys_ignore_case_and_whitespace() {
        let a = book("The Wild  Robot", "Peter Brown", "https://a");
        let b = book("the wild robot ", "PETER BROWN", "https://b");
        assert_eq!(a.broad_key(), b.broad_key());
        assert_eq!(a.title_key(), b.title_key());
    }

    #[test]
    fn test_broad_key_keeps_authors_apart() {
        let a = book("Matilda", "Roald Dahl", "https://a");
        let b = book("Matilda", "Someone Else", "https://b");
        assert_ne!(a.broad_key(), b.broad_key());
        assert_eq!(a.title_key(), b.title_key());
    }

    #[test]
    fn test_subject() {
        let digest = Digest {
            date: NaiveDate::from_ymd_opt(2025, 5, 6).unwrap(),
            reader_name: "JoJo".into(),
            news: vec![],
            english_books: vec![],
            chinese_books: vec![],
            errors: vec![],
            podcast: None,
        };
        assert_eq!(digest.subject(), "Daily News + Books for JoJo (2025-05-06)");
    }
}
