//! Open Library search for Chinese-language children's books.
//!
//! Three fixed queries restricted to `language=chi`. A failing query is
//! logged and skipped.

use reqwest::Client;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::models::Book;
use crate::rank::dedupe_books;
use crate::sources::fetch_text;

const SEARCH_URL: &str = "https://openlibrary.org/search.json";
const WORK_BASE: &str = "https://openlibrary.org";

pub const QUERIES: &[&str] = &[r#"subject:"Children's stories, Chinese""#, "儿童文学", "少儿故事"];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<Doc>,
}

#[derive(Debug, Deserialize)]
struct Doc {
    title: Option<String>,
    #[serde(default)]
    author_name: Vec<String>,
    key: Option<String>,
    first_publish_year: Option<i32>,
}

/// Per-query result limit, within `[10, 25]`.
pub fn per_query_limit(max_results: usize) -> usize {
    (max_results / 2).clamp(10, 25)
}

pub fn search_url(query: &str, limit: usize) -> String {
    format!(
        "{SEARCH_URL}?q={}&language=chi&limit={limit}",
        urlencoding::encode(query)
    )
}

/// Run every query and merge the results.
#[instrument(level = "info", skip(client))]
pub async fn chinese_kids_books(client: &Client, max_results: usize) -> Vec<Book> {
    let limit = per_query_limit(max_results);
    let mut books = Vec::new();

    for query in QUERIES {
        let url = search_url(query, limit);
        match fetch_text(client, &url).await.and_then(|body| parse_search(&body)) {
            Ok(found) => {
                info!(query, count = found.len(), "Open Library query");
                books.extend(found);
            }
            Err(e) => warn!(query, error = %e, "Open Library query failed; skipping"),
        }
    }

    dedupe_books(books)
}

pub fn parse_search(body: &str) -> Result<Vec<Book>> {
    let resp: SearchResponse = serde_json::from_str(body)?;
    Ok(resp
        .docs
        .into_iter()
        .filter_map(|d| {
            let title = d.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())?;
            let key = d.key.filter(|k| !k.is_empty())?;
            let blurb = d
                .first_publish_year
                .map(|y| format!("First published: {y}"))
                .unwrap_or_default();
            Some(Book {
                title,
                authors: d.author_name.iter().take(2).cloned().collect::<Vec<_>>().join(", "),
                link: format!("{WORK_BASE}{key}"),
                blurb,
                published_year: d.first_publish_year,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search() {
        let body = r#"{
          "numFound": 3,
          "docs": [
            {
              "key": "/works/OL123W",
              "title": "草房子",
              "author_name": ["曹文轩", "Second", "Third"],
              "first_publish_year": 1997
            },
            { "key": "/works/OL456W", "title": "宝葫芦的秘密" },
            { "title": "No key" },
            { "key": "/works/OL789W", "title": "   " }
          ]
        }"#;
        let books = parse_search(body).unwrap();
        assert_eq!(books.len(), 2);
        assert_eq!(books[0].title, "草房子");
        assert_eq!(books[0].authors, "曹文轩, Second");
        assert_eq!(books[0].link, "https://openlibrary.org/works/OL123W");
        assert_eq!(books[0].blurb, "First published: 1997");
        assert_eq!(books[0].published_year, Some(1997));
        assert_eq!(books[1].blurb, "");
    }

    #[test]
    fn test_per_query_limit() {
        assert_eq!(per_query_limit(20), 10);
        assert_eq!(per_query_limit(40), 20);
        assert_eq!(per_query_limit(100), 25);
        assert_eq!(per_query_limit(2), 10);
    }

    #[test]
    fn test_search_url() {
        let url = search_url("少儿故事", 10);
        assert!(url.starts_with("https://openlibrary.org/search.json?q=%E5%B0%91"));
        assert!(url.ends_with("&language=chi&limit=10"));
    }
}
