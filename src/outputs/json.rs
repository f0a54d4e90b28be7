//! JSON snapshot of a digest.
//!
//! The snapshot holds the selected items and the failure notes. Podcast audio
//! is written as its own file; only its name and script land in the JSON.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

use crate::error::Result;
use crate::models::Digest;

pub const FILE_NAME: &str = "digest.json";

/// Write `digest.json` into `dir`.
#[instrument(level = "info", skip_all, fields(dir = %dir.display()))]
pub async fn write_digest(dir: &Path, digest: &Digest) -> Result<PathBuf> {
    let json = serde_json::to_string_pretty(digest)?;
    let path = dir.join(FILE_NAME);

    if let Err(e) = fs::write(&path, json).await {
        error!(path = %path.display(), error = %e, "Failed writing JSON");
        return Err(e.into());
    }
    info!(path = %path.display(), "Wrote digest JSON");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Book, Podcast};
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_snapshot_keeps_items_and_drops_audio() {
        let dir = std::env::temp_dir().join(format!("kids_digest_json_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let digest = Digest {
            date: NaiveDate::from_ymd_opt(2025, 5, 6).unwrap(),
            reader_name: "JoJo".into(),
            news: vec![],
            english_books: vec![],
            chinese_books: vec![Book {
                title: "大河的歌谣".into(),
                authors: String::new(),
                link: "https://www.chinawriter.com.cn/x.html".into(),
                blurb: "Curated classic Chinese kids book".into(),
                published_year: None,
            }],
            errors: vec!["News fetch failed: all feeds failed".into()],
            podcast: Some(Podcast {
                file_name: "kids-digest-2025-05-06.mp3".into(),
                script: "Good morning".into(),
                audio: vec![1, 2, 3],
            }),
        };

        let path = write_digest(&dir, &digest).await.unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("大河的歌谣"));
        assert!(!raw.contains("audio"));

        let back: Digest = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.chinese_books, digest.chinese_books);
        assert_eq!(back.errors, digest.errors);
        let podcast = back.podcast.unwrap();
        assert_eq!(podcast.script, "Good morning");
        assert!(podcast.audio.is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
