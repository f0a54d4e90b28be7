//! Official Chinese children's literature award pages.
//!
//! Award announcements list winners as `《书名》`. Titles are pulled out of
//! those brackets and filtered against words that mark the award itself,
//! the committee, or ordinal headings (`第十二届`).
//!
//! When the pages yield fewer than [`MIN_CURATED_TITLES`] titles, the
//! curated fallback list from the 12th National Outstanding Children's
//! Literature Award (2025) is appended in full.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use tracing::{info, instrument, warn};

use crate::models::Book;
use crate::rank::{dedupe_books, dedupe_strings};
use crate::sources::{MAX_PAGES_PER_SOURCE, PageParser, fetch_text};

pub const AWARD_DOMAIN: &str = "chinawriter.com.cn";
pub const AWARD_HOME: &str = "https://www.chinawriter.com.cn";

pub const AWARD_BLURB: &str = "Curated from official Chinese children's literature award/list source";
pub const FALLBACK_BLURB: &str = "Curated classic Chinese kids book";

/// Below this many extracted titles the curated fallback list is added.
pub const MIN_CURATED_TITLES: usize = 6;

pub const CURATED_FALLBACK_TITLES: &[&str] = &[
    "我人生最开始的好朋友",
    "大河的歌谣",
    "万花筒",
    "方一禾，快跑",
    "狼洞的外婆",
    "额吉的河",
    "胡同也有小时候",
    "我知道所有问题的答案了",
    "外婆变成了麻猫",
    "器成千年",
    "白夜梦想家",
    "月光蟋蟀",
    "我的，我的",
    "改造天才",
    "火苗照亮宇宙：暗生命传奇",
    "不能没有",
    "妈妈的剪影",
    "守护神",
];

const STOP_WORDS: &[&str] = &[
    "全国优秀儿童文学奖",
    "中国作家协会",
    "评奖",
    "名单",
    "奖项",
    "委员会",
    "通知",
    "文学奖",
    "获奖",
    "作品",
    "图书",
];

static BRACKET_TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"《([^《》\r\n]{2,40})》").unwrap());
static ORDINAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"第[一二三四五六七八九十0-9]+").unwrap());

/// Extracts `《…》` titles from an award page.
pub struct BracketTitleParser<'a> {
    /// Link recorded on every extracted book.
    pub page_url: &'a str,
}

impl PageParser for BracketTitleParser<'_> {
    fn name(&self) -> &'static str {
        "award-brackets"
    }

    fn extract(&self, html: &str) -> Vec<Book> {
        extract_bracket_titles(html)
            .into_iter()
            .map(|title| Book {
                title,
                authors: String::new(),
                link: self.page_url.to_string(),
                blurb: AWARD_BLURB.to_string(),
                published_year: None,
            })
            .collect()
    }
}

/// Bracketed titles with award chrome and ordinal headings removed.
pub fn extract_bracket_titles(html: &str) -> Vec<String> {
    let titles = BRACKET_TITLE
        .captures_iter(html)
        .map(|caps| caps[1].trim().to_string())
        .filter(|t| !t.is_empty())
        .filter(|t| !STOP_WORDS.iter().any(|w| t.contains(w)))
        .filter(|t| !ORDINAL.is_match(t))
        .collect();
    dedupe_strings(titles)
}

/// Fetch the award pages, falling back to the curated list when thin.
#[instrument(level = "info", skip_all, fields(pages = urls.len(), max_results = max_results))]
pub async fn chinese_kids_books(client: &Client, urls: &[String], max_results: usize) -> Vec<Book> {
    let mut books = Vec::new();
    for url in urls.iter().take(MAX_PAGES_PER_SOURCE) {
        match fetch_text(client, url).await {
            Ok(html) => {
                let found = BracketTitleParser { page_url: url }.extract(&html);
                info!(%url, count = found.len(), "Extracted award titles");
                books.extend(found);
            }
            Err(e) => warn!(%url, error = %e, "Award page fetch failed; skipping"),
        }
    }

    let first_url = urls.first().map(String::as_str);
    finalize(books, first_url, max_results)
}

/// Apply the curated fallback, dedupe, and cap at `max_results`.
pub fn finalize(mut books: Vec<Book>, first_url: Option<&str>, max_results: usize) -> Vec<Book> {
    if books.len() < MIN_CURATED_TITLES {
        info!(
            extracted = books.len(),
            threshold = MIN_CURATED_TITLES,
            "Too few award titles; adding curated fallback list"
        );
        books.extend(curated_fallback(first_url.unwrap_or(AWARD_HOME)));
    }
    let mut books = dedupe_books(books);
    books.truncate(max_results);
    books
}

pub fn curated_fallback(link: &str) -> Vec<Book> {
    CURATED_FALLBACK_TITLES
        .iter()
        .map(|t| Book {
            title: t.to_string(),
            authors: String::new(),
            link: link.to_string(),
            blurb: FALLBACK_BLURB.to_string(),
            published_year: None,
        })
        .collect()
}
