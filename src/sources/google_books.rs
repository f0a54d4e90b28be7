//! Google Books volume search.
//!
//! Used for the English list and as the last resort for the Chinese list.
//! Each run picks a random query variant and a random start offset so the
//! digest does not repeat the same books every day.

use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, rng};
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::error::Result;
use crate::models::Book;
use crate::sources::fetch_text;
use crate::utils::{strip_tags, truncate_chars};

const VOLUMES_URL: &str = "https://www.googleapis.com/books/v1/volumes";

/// Blurbs are cut to this many characters.
pub const BLURB_CHARS: usize = 220;

pub const ENGLISH_QUERY_VARIANTS: &[&str] = &[
    r#"subject:"juvenile fiction""#,
    r#"subject:"children's fiction""#,
    r#"subject:"juvenile fiction" subject:"adventure""#,
    r#"subject:"juvenile fiction" subject:"fantasy""#,
    r#"subject:"children's books""#,
];

pub const CHINESE_QUERY_VARIANTS: &[&str] = &[
    r#"subject:"Children's stories, Chinese""#,
    r#"subject:"juvenile fiction" 儿童文学"#,
    "儿童文学",
    "少儿故事",
    "儿童小说",
];

/// Fetch this many candidates per requested book, within `[20, 40]`.
pub fn max_results_for(limit: usize) -> usize {
    limit.saturating_mul(4).clamp(20, 40)
}

/// One volume search.
#[derive(Debug, Clone)]
pub struct VolumeQuery<'a> {
    pub query: &'a str,
    pub lang: &'a str,
    pub country: &'a str,
    pub max_results: usize,
    pub start_index: usize,
    pub api_key: Option<&'a str>,
}

impl VolumeQuery<'_> {
    pub fn url(&self) -> String {
        let mut url = format!(
            "{VOLUMES_URL}?q={}&maxResults={}&startIndex={}&printType=books&langRestrict={}&country={}",
            urlencoding::encode(self.query),
            self.max_results,
            self.start_index,
            urlencoding::encode(self.lang),
            urlencoding::encode(self.country),
        );
        if let Some(key) = self.api_key.filter(|k| !k.is_empty()) {
            url.push_str(&format!("&key={}", urlencoding::encode(key)));
        }
        url
    }
}

#[derive(Debug, Deserialize)]
struct VolumesResponse {
    #[serde(rename = "totalItems", default)]
    total_items: u64,
    #[serde(default)]
    items: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
struct Volume {
    #[serde(rename = "volumeInfo", default)]
    volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeInfo {
    title: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
    description: Option<String>,
    preview_link: Option<String>,
    info_link: Option<String>,
    published_date: Option<String>,
}

/// Run one volume search. A non-success status fails the call.
#[instrument(level = "info", skip_all, fields(query = %q.query, lang = %q.lang, start = q.start_index))]
pub async fn search(client: &Client, q: &VolumeQuery<'_>) -> Result<Vec<Book>> {
    let body = fetch_text(client, &q.url()).await?;
    let (books, total) = parse_volumes(&body)?;
    info!(count = books.len(), total_items = total, max_results = q.max_results, "Google Books response");
    Ok(books)
}

/// Random English children's books: fetch up to 4x `limit`, shuffle, keep `limit`.
#[instrument(level = "info", skip(client, api_key))]
pub async fn popular_kids_books(
    client: &Client,
    limit: usize,
    api_key: Option<&str>,
) -> Result<Vec<Book>> {
    let (query, start_index) = random_query(ENGLISH_QUERY_VARIANTS);
    let q = VolumeQuery {
        query,
        lang: "en",
        country: "US",
        max_results: max_results_for(limit),
        start_index,
        api_key,
    };

    let mut books = search(client, &q).await?;
    books.shuffle(&mut rng());
    books.truncate(limit);
    Ok(books)
}

/// Chinese last-resort search with a random Chinese query variant.
pub async fn chinese_kids_books(
    client: &Client,
    max_results: usize,
    api_key: Option<&str>,
) -> Result<Vec<Book>> {
    let (query, start_index) = random_query(CHINESE_QUERY_VARIANTS);
    let q = VolumeQuery {
        query,
        lang: "zh",
        country: "US",
        max_results,
        start_index,
        api_key,
    };
    search(client, &q).await
}

/// Pick a query variant and a start offset in `0..=10`.
fn random_query(variants: &'static [&'static str]) -> (&'static str, usize) {
    let mut r = rng();
    let query = variants.choose(&mut r).copied().unwrap_or(variants[0]);
    (query, r.random_range(0..=10))
}

/// Parse a volumes response. Returns the books and the API's `totalItems`.
pub fn parse_volumes(body: &str) -> Result<(Vec<Book>, u64)> {
    let resp: VolumesResponse = serde_json::from_str(body)?;
    let books = resp
        .items
        .into_iter()
        .filter_map(|item| {
            let v = item.volume_info;
            let title = v.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())?;
            let link = v
                .preview_link
                .or(v.info_link)
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())?;
            let description = strip_tags(v.description.as_deref().unwrap_or_default());
            Some(Book {
                title,
                authors: v.authors.join(", "),
                link,
                blurb: truncate_chars(&description, BLURB_CHARS),
                published_year: v.published_date.as_deref().and_then(leading_year),
            })
        })
        .collect();
    Ok((books, resp.total_items))
}

fn leading_year(date: &str) -> Option<i32> {
    date.get(..4)?.parse().ok()
}
