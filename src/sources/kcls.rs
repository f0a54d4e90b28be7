//! KCLS BiblioCommons list pages.
//!
//! Librarian-curated lists of Chinese children's books. Each page is run
//! through two extraction variants in priority order; the first one that
//! finds any record for the page wins:
//!
//! 1. [`DomRecordParser`]: anchors in the parsed DOM
//! 2. [`RegexRecordParser`]: the same href pattern matched over raw HTML,
//!    which also sees anchors inside `<script>` templates
//!
//! Record links look like `/v2/record/S82C1234567` or `/item/show/1234567`
//! and are resolved against [`KCLS_BASE`].

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::models::Book;
use crate::rank::dedupe_books;
use crate::sources::{MAX_PAGES_PER_SOURCE, PageParser, fetch_text, first_successful};
use crate::utils::{clean_html_text, collapse_whitespace};

pub const KCLS_BASE: &str = "https://kcls.bibliocommons.com";
pub const KCLS_DOMAIN: &str = "kcls.bibliocommons.com";
pub const KCLS_BLURB: &str = "From KCLS Chinese kids list";

/// Titles longer than this are page chrome, not book titles.
pub const MAX_TITLE_CHARS: usize = 180;
pub const MAX_RECORDS_PER_PAGE: usize = 60;

static RECORD_HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:/v2/record/S82C\d+|/item/show/\d+)").unwrap());

static RECORD_ANCHOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<a[^>]+href="([^"]*(?:/v2/record/S82C\d+|/item/show/\d+)[^"]*)"[^>]*>(.*?)</a>"#)
        .unwrap()
});

static ARIA_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?i)aria-label="([^"]+)""#).unwrap());

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// Fetch up to [`MAX_PAGES_PER_SOURCE`] list pages and collect their records.
#[instrument(level = "info", skip_all, fields(pages = urls.len(), max_results = max_results))]
pub async fn chinese_kids_books(client: &Client, urls: &[String], max_results: usize) -> Vec<Book> {
    let mut books = Vec::new();
    for url in urls.iter().take(MAX_PAGES_PER_SOURCE) {
        match fetch_text(client, url).await {
            Ok(html) => {
                let found = extract_records(&html);
                info!(%url, count = found.len(), "Extracted KCLS records");
                books.extend(found);
            }
            Err(e) => warn!(%url, error = %e, "KCLS list fetch failed; skipping"),
        }
    }

    let mut books = dedupe_books(books);
    books.truncate(max_results);
    books
}

/// Run the extraction variants in priority order.
pub fn extract_records(html: &str) -> Vec<Book> {
    first_successful(&[&DomRecordParser, &RegexRecordParser], html)
}

/// Anchors found by walking the parsed document.
pub struct DomRecordParser;

impl PageParser for DomRecordParser {
    fn name(&self) -> &'static str {
        "kcls-dom"
    }

    fn extract(&self, html: &str) -> Vec<Book> {
        let document = Html::parse_document(html);
        let candidates = document.select(&ANCHOR).filter_map(|a| {
            let href = a.value().attr("href")?;
            if !RECORD_HREF.is_match(href) {
                return None;
            }
            let text = a.text().collect::<Vec<_>>().join(" ");
            let aria = a.value().attr("aria-label").unwrap_or_default();
            Some(Candidate {
                href: href.to_string(),
                text_title: collapse_whitespace(&text),
                aria_title: collapse_whitespace(aria),
            })
        });
        collect(candidates)
    }
}

/// Anchors matched directly in the raw markup.
pub struct RegexRecordParser;

impl PageParser for RegexRecordParser {
    fn name(&self) -> &'static str {
        "kcls-regex"
    }

    fn extract(&self, html: &str) -> Vec<Book> {
        let candidates = RECORD_ANCHOR.captures_iter(html).map(|caps| {
            let anchor = caps.get(0).map_or("", |m| m.as_str());
            let aria = ARIA_LABEL
                .captures(anchor)
                .and_then(|c| c.get(1))
                .map_or("", |m| m.as_str());
            Candidate {
                href: html_escape::decode_html_entities(&caps[1]).trim().to_string(),
                text_title: clean_html_text(&caps[2]),
                aria_title: clean_html_text(aria),
            }
        });
        collect(candidates)
    }
}

struct Candidate {
    href: String,
    text_title: String,
    aria_title: String,
}

/// Resolve links, pick titles, dedupe by link, and apply the per-page cap.
fn collect(candidates: impl Iterator<Item = Candidate>) -> Vec<Book> {
    let mut seen = HashSet::new();
    let mut books = Vec::new();

    for c in candidates {
        let Some(link) = resolve_link(&c.href) else {
            debug!(href = %c.href, "Unresolvable record link");
            continue;
        };
        let title = if c.text_title.is_empty() {
            c.aria_title
        } else {
            c.text_title
        };
        if title.is_empty() || title.chars().count() > MAX_TITLE_CHARS {
            continue;
        }
        if !seen.insert(link.clone()) {
            continue;
        }
        books.push(Book {
            title,
            authors: String::new(),
            link,
            blurb: KCLS_BLURB.to_string(),
            published_year: None,
        });
        if books.len() >= MAX_RECORDS_PER_PAGE {
            break;
        }
    }
    books
}

fn resolve_link(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    let base = Url::parse(KCLS_BASE).ok()?;
    base.join(href).ok().map(|u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST_PAGE: &str = r#"<!DOCTYPE html>
<html><body>
<div class="list-item">
  <a class="title-link" href="/v2/record/S82C1234567">大河的歌谣</a>
  <a class="cover" href="/v2/record/S82C1234567"><img alt=""></a>
</div>
<div class="list-item">
  <a href="https://kcls.bibliocommons.com/item/show/987654" aria-label="月光蟋蟀"><img src="x.jpg"></a>
</div>
<div class="list-item">
  <a href="/v2/record/S82C555"><span>   </span></a>
  <a href="/v2/search?query=kids">Search</a>
  <a href="/v2/record/S82C777">Tom &amp; <em>Jerry</em></a>
</div>
<script type="text/template"><a href="/v2/record/S82C42">额吉的河</a></script>
</body></html>"#;

    #[test]
    fn test_dom_parser_extracts_records() {
        let books = DomRecordParser.extract(LIST_PAGE);
        let titles: Vec<_> = books.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["大河的歌谣", "月光蟋蟀", "Tom & Jerry"]);
        assert_eq!(books[0].link, "https://kcls.bibliocommons.com/v2/record/S82C1234567");
        assert_eq!(books[1].link, "https://kcls.bibliocommons.com/item/show/987654");
        assert!(books.iter().all(|b| b.blurb == KCLS_BLURB));
    }

    #[test]
    fn test_first_variant_wins() {
        // The script-embedded anchor is only visible to the regex variant.
        let books = extract_records(LIST_PAGE);
        assert_eq!(books.len(), 3);
        assert!(!books.iter().any(|b| b.title == "额吉的河"));
    }

    #[test]
    fn test_regex_fallback() {
        let page = r#"<html><body><script type="text/template">
            <a href="/v2/record/S82C42" aria-label="额吉的河"></a>
            <a href="/item/show/77?x=1&amp;y=2">胡同也有小时候</a>
        </script></body></html>"#;
        assert!(DomRecordParser.extract(page).is_empty());

        let books = extract_records(page);
        assert_eq!(books.len(), 2);
        assert_eq!(books[0].title, "额吉的河");
        assert_eq!(books[0].link, "https://kcls.bibliocommons.com/v2/record/S82C42");
        assert_eq!(books[1].link, "https://kcls.bibliocommons.com/item/show/77?x=1&y=2");
    }

    #[test]
    fn test_dom_titles_decoded_once() {
        let page = r#"<a href="/v2/record/S82C9">Fish &amp;amp; Chips &lt;Vol. 2&gt;</a>
            <a href="/v2/record/S82C10" aria-label="A &amp;lt; B"></a>"#;
        let books = DomRecordParser.extract(page);
        let titles: Vec<_> = books.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["Fish &amp; Chips <Vol. 2>", "A &lt; B"]);
    }

    #[test]
    fn test_long_titles_dropped() {
        let page = format!(r#"<a href="/v2/record/S82C1">{}</a>"#, "长".repeat(MAX_TITLE_CHARS + 1));
        assert!(extract_records(&page).is_empty());
    }

    #[test]
    fn test_per_page_cap() {
        let page: String = (0..100)
            .map(|i| format!(r#"<a href="/v2/record/S82C{i}">书{i}</a>"#))
            .collect();
        assert_eq!(extract_records(&page).len(), MAX_RECORDS_PER_PAGE);
    }
}
