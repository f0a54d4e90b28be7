//! RSS 2.0 news feeds.
//!
//! Every configured feed is fetched and parsed independently. A feed that
//! fails is reported and skipped; the run only loses the news section when
//! every feed fails.
//!
//! Selection rules, applied across all feeds:
//! - drop items without a title or link
//! - drop titles that hit the news deny-list
//! - drop items dated more than [`MAX_AGE_HOURS`] before now (undated items stay)
//! - newest first, dedupe by link, keep `limit`

use chrono::{DateTime, Duration, Utc};
use itertools::Itertools;
use quick_xml::de::from_str;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::error::{DigestError, Result};
use crate::models::NewsItem;
use crate::sources::{fetch_text, redact_url};
use crate::utils::{clean_html_text, deny_hit};

pub const MAX_AGE_HOURS: i64 = 48;

pub const NEWS_DENY: &[&str] = &[
    "shooting", "killed", "dead", "murder", "rape", "porn", "terror", "isis", "massacre",
    "hostage", "bomb", "explosion",
];

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Option<Channel>,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

/// Items kept across all feeds plus one note per failed feed.
#[derive(Debug, Default)]
pub struct NewsReport {
    pub items: Vec<NewsItem>,
    pub failures: Vec<String>,
}

/// Fetch all feeds and select the newest `limit` items.
///
/// # Arguments
///
/// * `client` - Shared HTTP client
/// * `urls` - RSS 2.0 feed URLs, fetched in order
/// * `limit` - Maximum number of items to keep across all feeds
/// * `now` - Reference time for the [`MAX_AGE_HOURS`] cutoff
///
/// # Returns
///
/// The selected items plus one `News feed <url> failed: <reason>` note per
/// failed feed. When every feed fails the whole call fails, and the error
/// carries each feed's note.
#[instrument(level = "info", skip_all, fields(feeds = urls.len(), limit = limit))]
pub async fn fetch_news(
    client: &Client,
    urls: &[String],
    limit: usize,
    now: DateTime<Utc>,
) -> Result<NewsReport> {
    let mut all = Vec::new();
    let mut failures = Vec::new();

    for url in urls {
        match fetch_text(client, url).await.and_then(|xml| parse_feed(&xml)) {
            Ok(items) => {
                info!(url = %redact_url(url), count = items.len(), "Parsed RSS feed");
                all.extend(items);
            }
            Err(e) => {
                warn!(url = %redact_url(url), error = %e, "RSS feed failed; skipping");
                failures.push(format!("News feed {} failed: {e}", redact_url(url)));
            }
        }
    }

    if !urls.is_empty() && failures.len() == urls.len() {
        return Err(DigestError::Other(format!(
            "all {} news feeds failed ({})",
            urls.len(),
            failures.join("; ")
        )));
    }

    let items = select_news(all, now, limit);
    info!(count = items.len(), "Selected news items");
    Ok(NewsReport { items, failures })
}

/// Parse one RSS document into items with a title and link.
pub fn parse_feed(xml: &str) -> Result<Vec<NewsItem>> {
    let cleaned = scrub_html_entities_for_xml(xml);
    let rss: Rss = from_str(&cleaned)?;
    let Some(channel) = rss.channel else {
        return Ok(Vec::new());
    };

    Ok(channel
        .items
        .into_iter()
        .filter_map(|it| {
            let title = clean_html_text(it.title.as_deref().unwrap_or_default());
            let link = it.link.as_deref().unwrap_or_default().trim().to_string();
            if title.is_empty() || link.is_empty() {
                return None;
            }
            let published_at = it.pub_date.as_deref().and_then(parse_pub_date);
            Some(NewsItem {
                title,
                link,
                published_at,
            })
        })
        .collect())
}

/// Apply the deny-list and age cutoff, sort newest first, dedupe by link.
pub fn select_news(items: Vec<NewsItem>, now: DateTime<Utc>, limit: usize) -> Vec<NewsItem> {
    let cutoff = now - Duration::hours(MAX_AGE_HOURS);
    items
        .into_iter()
        .filter(|it| !deny_hit(&it.title, NEWS_DENY))
        .filter(|it| it.published_at.is_none_or(|ts| ts >= cutoff))
        // Undated items sort after every dated one.
        .sorted_by(|a, b| b.published_at.cmp(&a.published_at))
        .unique_by(|it| it.link.clone())
        .take(limit)
        .collect()
}

fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// quick-xml rejects HTML-only entities that some feeds leave in text.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{build_client, test_server};
    use chrono::TimeZone;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>BBC News - World</title>
    <link>https://www.bbc.co.uk/news/world</link>
    <item>
      <title><![CDATA[Giant panda cubs make first public appearance]]></title>
      <link>https://www.bbc.co.uk/news/pandas</link>
      <pubDate>Tue, 06 May 2025 08:00:00 GMT</pubDate>
      <guid isPermaLink="false">pandas</guid>
    </item>
    <item>
      <title>Explosion at factory&nbsp;site</title>
      <link>https://www.bbc.co.uk/news/explosion</link>
      <pubDate>Tue, 06 May 2025 09:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Old story about comets</title>
      <link>https://www.bbc.co.uk/news/comets</link>
      <pubDate>Thu, 01 May 2025 09:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Undated story about kites</title>
      <link>https://www.bbc.co.uk/news/kites</link>
    </item>
    <item>
      <title></title>
      <link>https://www.bbc.co.uk/news/no-title</link>
    </item>
  </channel>
</rss>"#;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 6, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_feed_skips_items_without_title() {
        let items = parse_feed(FEED).unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(items[0].title, "Giant panda cubs make first public appearance");
        assert!(items[0].published_at.is_some());
        assert_eq!(items[1].title, "Explosion at factory site");
        assert!(items[3].published_at.is_none());
    }

    #[test]
    fn test_select_news_filters_and_orders() {
        let items = parse_feed(FEED).unwrap();
        let selected = select_news(items, now(), 5);
        let titles: Vec<_> = selected.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Giant panda cubs make first public appearance",
                "Undated story about kites"
            ]
        );
    }

    #[test]
    fn test_select_news_dedupes_by_link_and_limits() {
        let mk = |title: &str, link: &str, hour: u32| NewsItem {
            title: title.into(),
            link: link.into(),
            published_at: Some(Utc.with_ymd_and_hms(2025, 5, 6, hour, 0, 0).unwrap()),
        };
        let items = vec![
            mk("A", "https://x/1", 9),
            mk("A again", "https://x/1", 10),
            mk("B", "https://x/2", 8),
            mk("C", "https://x/3", 7),
        ];
        let selected = select_news(items, now(), 2);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].title, "A again");
        assert_eq!(selected[1].title, "B");
        assert!(selected.iter().map(|n| &n.link).all_unique());
    }

    #[test]
    fn test_parse_feed_without_channel() {
        let items = parse_feed(r#"<rss version="2.0"></rss>"#).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_parse_feed_rejects_garbage() {
        assert!(parse_feed("<rss><channel><item><title>broken").is_err());
    }

    #[tokio::test]
    async fn test_fetch_news_partial_failure_keeps_other_feeds() {
        let good = test_server::serve(200, FEED).await;
        let bad = test_server::serve(500, "upstream down").await;
        let client = build_client().unwrap();
        let urls = vec![format!("{bad}/world.xml"), format!("{good}/world.xml")];

        let report = fetch_news(&client, &urls, 5, now()).await.unwrap();
        assert_eq!(report.items.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].starts_with(&format!("News feed {bad}/world.xml failed: HTTP 500")));
    }

    #[tokio::test]
    async fn test_fetch_news_total_failure_keeps_reasons() {
        let first = test_server::serve(500, "upstream down").await;
        let second = test_server::serve(200, "<rss><channel><item><title>broken").await;
        let client = build_client().unwrap();
        let urls = vec![format!("{first}/a.xml"), format!("{second}/b.xml")];

        let err = fetch_news(&client, &urls, 5, now()).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("all 2 news feeds failed"), "{msg}");
        assert!(msg.contains(&format!("News feed {first}/a.xml failed: HTTP 500")), "{msg}");
        assert!(msg.contains(&format!("News feed {second}/b.xml failed: XML parse error")), "{msg}");
    }
}
