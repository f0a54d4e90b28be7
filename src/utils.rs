//! Text helpers shared by the fetchers, the ranker, and the composer.
//!
//! - Trimming, truncation, and tag stripping for scraped text
//! - Dedup key normalization
//! - Deny-list and script detection
//! - File system validation for the archive directory

use once_cell::sync::Lazy;
use regex::Regex;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

use crate::error::Result;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Truncate a string for logging purposes.
///
/// Long strings are cut at a char boundary at or below `max` bytes and get an
/// ellipsis plus the number of dropped bytes appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Truncate to at most `n` characters, ending in `…` when shortened.
pub fn truncate_chars(s: &str, n: usize) -> String {
    if s.chars().count() <= n {
        return s.to_string();
    }
    let head: String = s.chars().take(n.saturating_sub(1)).collect();
    format!("{}…", head.trim())
}

/// Remove HTML tags and collapse whitespace runs to single spaces.
pub fn strip_tags(s: &str) -> String {
    let without_tags = TAG_RE.replace_all(s, " ");
    WS_RE.replace_all(&without_tags, " ").trim().to_string()
}

/// Collapse whitespace runs to single spaces and trim.
///
/// For text that is already decoded, like DOM text nodes and attributes.
pub fn collapse_whitespace(s: &str) -> String {
    WS_RE.replace_all(s, " ").trim().to_string()
}

/// Strip tags, decode entities, and trim. Used on raw markup fragments.
pub fn clean_html_text(s: &str) -> String {
    let stripped = strip_tags(s);
    let decoded = html_escape::decode_html_entities(&stripped);
    WS_RE.replace_all(&decoded, " ").trim().to_string()
}

/// Dedup key: lowercase with all whitespace and punctuation removed.
///
/// `"The Wild Robot!"` and `"the  wild robot"` map to the same key, and so do
/// `"《大河的歌谣》"` and `"大河的歌谣"`.
pub fn normalize_key(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Case-insensitive substring match against a fixed word list.
pub fn deny_hit(text: &str, deny: &[&str]) -> bool {
    let t = text.to_lowercase();
    deny.iter().any(|w| t.contains(&w.to_lowercase()))
}

/// Whether `s` contains a CJK unified ideograph (U+3400..=U+9FFF).
pub fn contains_cjk(s: &str) -> bool {
    s.chars().any(|c| ('\u{3400}'..='\u{9FFF}').contains(&c))
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then writes and removes a scratch file.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<()> {
    fs::create_dir_all(path).await?;
    let scratch_path = format!("{}/..__write_check__", path.trim_end_matches('/'));
    stdfs::File::create(&scratch_path)?;
    let _ = stdfs::remove_file(&scratch_path);
    info!("Output directory is writable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte() {
        // Each ideograph is 3 bytes; a cut at 4 must back off to 3.
        let result = truncate_for_log("儿童文学", 4);
        assert!(result.starts_with("儿…"));
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 220), "short");
        let long = "x".repeat(300);
        let cut = truncate_chars(&long, 220);
        assert_eq!(cut.chars().count(), 220);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("<p>Hello <b>there</b></p>\n\n  friend"), "Hello there friend");
    }

    #[test]
    fn test_collapse_whitespace_keeps_entities() {
        assert_eq!(collapse_whitespace("  Tom &amp;\n\t Jerry  "), "Tom &amp; Jerry");
        assert_eq!(collapse_whitespace("a < b"), "a < b");
    }

    #[test]
    fn test_clean_html_text_decodes_entities() {
        assert_eq!(clean_html_text("<span>Tom &amp; Jerry&#39;s</span>"), "Tom & Jerry's");
        assert_eq!(clean_html_text("&#x5927;&#27827;"), "大河");
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("The Wild  Robot!"), "thewildrobot");
        assert_eq!(normalize_key(" the wild robot "), "thewildrobot");
        assert_eq!(normalize_key("《大河的歌谣》"), "大河的歌谣");
        assert_eq!(normalize_key("方一禾，快跑"), "方一禾快跑");
    }

    #[test]
    fn test_deny_hit() {
        assert!(deny_hit("Bomb threat downtown", &["bomb"]));
        assert!(deny_hit("言情小说精选", &["言情"]));
        assert!(!deny_hit("Puppies rescued", &["bomb", "killed"]));
    }

    #[test]
    fn test_contains_cjk() {
        assert!(contains_cjk("Hello 世界"));
        assert!(!contains_cjk("Hello world"));
    }
}
