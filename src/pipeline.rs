//! One digest run, end to end.
//!
//! ```text
//! gather ─┬─ news            ─┐
//!         ├─ English books    ├─► Digest ─► podcast ─► render ─► archive ─► send
//!         └─ Chinese books   ─┘
//! ```
//!
//! Every stage returns a `Result`. A failed stage becomes a note in
//! `Digest::errors` and the run continues with an empty result, so exactly
//! one email goes out per run. Only a delivery failure is returned to the
//! caller.

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use tracing::{error, info, instrument, warn};

use crate::api::{ChatClient, ScriptWriter, SpeechClient, SpeechSynth};
use crate::compose::{render_html, render_text};
use crate::config::Config;
use crate::error::Result;
use crate::mail::{AudioAttachment, Mailer, OutgoingEmail};
use crate::models::{Book, Digest, NewsItem};
use crate::outputs::write_archive;
use crate::podcast::generate_podcast;
use crate::rank::{merge_sources, select_chinese_kids_books};
use crate::sources::google_books::{self, max_results_for};
use crate::sources::{award, kcls, open_library, rss};

pub const NEWS_STAGE: &str = "News fetch";
pub const ENGLISH_STAGE: &str = "English books fetch";
pub const CHINESE_STAGE: &str = "Chinese books fetch";
pub const PODCAST_STAGE: &str = "Podcast generation";

/// Item lists from the fetch stages plus their failure notes.
#[derive(Debug, Default)]
pub struct Gathered {
    pub news: Vec<NewsItem>,
    pub english_books: Vec<Book>,
    pub chinese_books: Vec<Book>,
    pub errors: Vec<String>,
}

/// Script writer and speech synth for the podcast stage.
pub struct PodcastStage<'a, W, S> {
    pub writer: Option<&'a W>,
    pub synth: &'a S,
}

/// Unwrap a stage result, recording `"<stage> failed: <reason>"` on error.
pub fn settle<T: Default>(stage: &str, result: Result<T>, errors: &mut Vec<String>) -> T {
    result.unwrap_or_else(|e| {
        warn!(stage, error = %e, "Stage failed; continuing with an empty result");
        errors.push(format!("{stage} failed: {e}"));
        T::default()
    })
}

/// Run the three fetch stages in order.
#[instrument(level = "info", skip_all)]
pub async fn gather(client: &Client, cfg: &Config, now: DateTime<Utc>) -> Gathered {
    let mut errors = Vec::new();

    let report = settle(
        NEWS_STAGE,
        rss::fetch_news(client, &cfg.news_rss_urls, cfg.news_limit, now).await,
        &mut errors,
    );
    errors.extend(report.failures);

    let english_books = settle(
        ENGLISH_STAGE,
        google_books::popular_kids_books(client, cfg.book_limit, cfg.google_books_api_key.as_deref())
            .await,
        &mut errors,
    );

    let chinese_books = settle(CHINESE_STAGE, chinese_books(client, cfg).await, &mut errors);

    info!(
        news = report.items.len(),
        english = english_books.len(),
        chinese = chinese_books.len(),
        errors = errors.len(),
        "Fetch stages complete"
    );
    Gathered {
        news: report.items,
        english_books,
        chinese_books,
        errors,
    }
}

/// Build the Chinese book list from every Chinese source.
///
/// Library lists, award pages, and Open Library are fetched first and merged
/// (each shuffled, then deduped by title and authors). Google Books is only
/// queried when that merge holds fewer than `cfg.book_limit` books.
///
/// # Arguments
///
/// * `client` - Shared HTTP client
/// * `cfg` - Source URLs, the book limit, and the optional catalog API key
///
/// # Returns
///
/// At most `cfg.book_limit` filtered, ranked books with distinct titles. The
/// only error is a failed catalog top-up; the multi-page sources skip their
/// own failures.
#[instrument(level = "info", skip_all, fields(limit = cfg.book_limit))]
pub async fn chinese_books(client: &Client, cfg: &Config) -> Result<Vec<Book>> {
    let limit = cfg.book_limit;
    let max_results = max_results_for(limit);

    let kcls_books = kcls::chinese_kids_books(client, &cfg.kcls_list_urls, max_results).await;
    let award_books = award::chinese_kids_books(client, &cfg.award_urls, max_results).await;
    let ol_books = open_library::chinese_kids_books(client, max_results).await;
    info!(
        kcls = kcls_books.len(),
        curated = award_books.len(),
        open_library = ol_books.len(),
        "Primary Chinese sources"
    );

    let mut merged = merge_sources(vec![kcls_books, award_books, ol_books]);
    if merged.len() < limit {
        let google = google_books::chinese_kids_books(
            client,
            max_results,
            cfg.google_books_api_key.as_deref(),
        )
        .await?;
        info!(google = google.len(), merged = merged.len(), "Topping up from the book catalog");
        merged = merge_sources(vec![merged, google]);
    }

    Ok(select_chinese_kids_books(merged, limit))
}

pub fn assemble(cfg: &Config, date: NaiveDate, gathered: Gathered) -> Digest {
    Digest {
        date,
        reader_name: cfg.reader_name.clone(),
        news: gathered.news,
        english_books: gathered.english_books,
        chinese_books: gathered.chinese_books,
        errors: gathered.errors,
        podcast: None,
    }
}

pub fn outgoing_email(cfg: &Config, digest: &Digest, html: String, text: String) -> OutgoingEmail {
    OutgoingEmail {
        to: cfg.recipients.clone(),
        subject: digest.subject(),
        text,
        html,
        attachment: digest.podcast.as_ref().map(|p| AudioAttachment {
            file_name: p.file_name.clone(),
            bytes: p.audio.clone(),
        }),
    }
}

/// Podcast, render, archive, and send.
///
/// # Arguments
///
/// * `cfg` - Recipients for the email
/// * `digest` - The assembled digest, fetch-stage notes included
/// * `podcast` - Writer and synth when the podcast is enabled, else `None`
/// * `mailer` - Transport for the single email of the run
/// * `output_dir` - Archive root, if archiving is enabled
///
/// # Returns
///
/// The digest as sent, including any `Podcast generation failed` note.
/// Archive failures are only logged. A send failure is logged and returned,
/// after the archive has been written.
#[instrument(level = "info", skip_all, fields(date = %digest.date))]
pub async fn finish<W, S, M>(
    cfg: &Config,
    mut digest: Digest,
    podcast: Option<PodcastStage<'_, W, S>>,
    mailer: &M,
    output_dir: Option<&str>,
) -> Result<Digest>
where
    W: ScriptWriter,
    S: SpeechSynth,
    M: Mailer,
{
    if let Some(stage) = podcast {
        let result = generate_podcast(&digest, stage.writer, stage.synth).await.map(Some);
        digest.podcast = settle(PODCAST_STAGE, result, &mut digest.errors);
    }

    let html = render_html(&digest);
    let text = render_text(&digest);

    if let Some(dir) = output_dir {
        if let Err(e) = write_archive(dir, &digest, &html, &text).await {
            error!(output_dir = %dir, error = %e, "Failed to archive digest");
        }
    }

    let email = outgoing_email(cfg, &digest, html, text);
    if let Err(e) = mailer.send(&email).await {
        error!(error = %e, subject = %email.subject, "Email delivery failed");
        return Err(e);
    }

    info!(
        date = %digest.date,
        news_count = digest.news.len(),
        english_book_count = digest.english_books.len(),
        chinese_book_count = digest.chinese_books.len(),
        podcast = digest.podcast.is_some(),
        errors = ?digest.errors,
        "digest sent"
    );
    Ok(digest)
}

/// Full run against the live services.
///
/// # Arguments
///
/// * `now` - Reference time for the news age cutoff
/// * `date` - Digest date, used in the subject and file names
/// * `mailer` - [`crate::mail::SmtpMailer`] or [`crate::mail::DryRunMailer`]
pub async fn run<M: Mailer>(
    client: &Client,
    cfg: &Config,
    now: DateTime<Utc>,
    date: NaiveDate,
    mailer: &M,
    output_dir: Option<&str>,
) -> Result<Digest> {
    let digest = assemble(cfg, date, gather(client, cfg, now).await);

    let writer = cfg
        .podcast
        .as_ref()
        .and_then(|p| p.llm.as_ref())
        .map(|llm| ChatClient::new(client, llm));
    let synth = cfg.podcast.as_ref().map(|p| SpeechClient::new(client, &p.tts));
    let stage = synth.as_ref().map(|synth| PodcastStage {
        writer: writer.as_ref(),
        synth,
    });

    finish(cfg, digest, stage, mailer, output_dir).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::error::DigestError;
    use crate::podcast::tests::{FixedWriter, RecordingSynth};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        fail: bool,
        sent: Mutex<Vec<OutgoingEmail>>,
    }

    impl Mailer for RecordingMailer {
        async fn send(&self, email: &OutgoingEmail) -> Result<()> {
            self.sent.lock().unwrap().push(email.clone());
            if self.fail {
                return Err(DigestError::Email("connection refused".into()));
            }
            Ok(())
        }
    }

    fn config() -> Config {
        let mut s = Settings::default();
        s.set("READER_EMAIL", "kid@example.com");
        s.set("PARENT_EMAIL", "parent@example.com");
        s.set("READER_NAME", "JoJo");
        s.set("NEWS_RSS_URLS", r#"["https://feeds.example/world.xml"]"#);
        Config::from_settings(&s, false).unwrap()
    }

    fn digest(cfg: &Config) -> Digest {
        let gathered = Gathered {
            news: vec![NewsItem {
                title: "Pandas return to the zoo".into(),
                link: "https://news.example/pandas".into(),
                published_at: None,
            }],
            english_books: vec![],
            chinese_books: vec![],
            errors: vec!["News feed https://feeds.example/b.xml failed: HTTP 500".into()],
        };
        assemble(cfg, NaiveDate::from_ymd_opt(2025, 5, 6).unwrap(), gathered)
    }

    #[test]
    fn test_settle() {
        let mut errors = Vec::new();
        let ok: Vec<u8> = settle(NEWS_STAGE, Ok(vec![1]), &mut errors);
        assert_eq!(ok, vec![1]);
        assert!(errors.is_empty());

        let failed: Vec<u8> = settle(CHINESE_STAGE, Err(DigestError::Other("timeout".into())), &mut errors);
        assert!(failed.is_empty());
        assert_eq!(errors, vec!["Chinese books fetch failed: timeout"]);
    }

    #[tokio::test]
    async fn test_podcast_failure_still_sends_email() {
        let cfg = config();
        let synth = RecordingSynth {
            fail: true,
            ..Default::default()
        };
        let stage = PodcastStage::<FixedWriter, _> {
            writer: None,
            synth: &synth,
        };
        let mailer = RecordingMailer::default();

        let sent = finish(&cfg, digest(&cfg), Some(stage), &mailer, None).await.unwrap();
        assert!(sent.podcast.is_none());
        assert!(sent.errors.iter().any(|e| e.starts_with("Podcast generation failed")));

        let emails = mailer.sent.lock().unwrap();
        assert_eq!(emails.len(), 1);
        let email = &emails[0];
        assert!(email.attachment.is_none());
        assert!(email.text.contains("Podcast generation failed"));
        assert!(email.html.contains("Podcast generation failed"));
        assert_eq!(email.to, vec!["kid@example.com", "parent@example.com"]);
        assert_eq!(email.subject, "Daily News + Books for JoJo (2025-05-06)");
    }

    #[tokio::test]
    async fn test_podcast_attached_on_success() {
        let cfg = config();
        let writer = FixedWriter(Ok("Good morning, JoJo! ".repeat(30)));
        let synth = RecordingSynth::default();
        let stage = PodcastStage {
            writer: Some(&writer),
            synth: &synth,
        };
        let mailer = RecordingMailer::default();

        let sent = finish(&cfg, digest(&cfg), Some(stage), &mailer, None).await.unwrap();
        assert!(sent.podcast.is_some());

        let emails = mailer.sent.lock().unwrap();
        let attachment = emails[0].attachment.as_ref().unwrap();
        assert_eq!(attachment.file_name, "kids-digest-2025-05-06.mp3");
        assert_eq!(attachment.bytes, b"ID3fake-mp3");
        assert!(!emails[0].text.contains("Podcast generation failed"));
    }

    #[tokio::test]
    async fn test_no_podcast_stage() {
        let cfg = config();
        let mailer = RecordingMailer::default();
        let sent = finish::<FixedWriter, RecordingSynth, _>(&cfg, digest(&cfg), None, &mailer, None)
            .await
            .unwrap();
        assert!(sent.podcast.is_none());
        assert_eq!(sent.errors.len(), 1);

        let emails = mailer.sent.lock().unwrap();
        assert_eq!(emails.len(), 1);
        assert!(emails[0].text.contains("News feed https://feeds.example/b.xml failed"));
    }

    #[tokio::test]
    async fn test_send_failure_is_returned() {
        let cfg = config();
        let mailer = RecordingMailer {
            fail: true,
            ..Default::default()
        };
        let err = finish::<FixedWriter, RecordingSynth, _>(&cfg, digest(&cfg), None, &mailer, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DigestError::Email(_)));
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_archive_failure_does_not_block_send() {
        let cfg = config();
        let blocker = std::env::temp_dir().join(format!("kids_digest_blocker_{}", std::process::id()));
        std::fs::write(&blocker, "not a directory").unwrap();
        let mailer = RecordingMailer::default();

        let result = finish::<FixedWriter, RecordingSynth, _>(
            &cfg,
            digest(&cfg),
            None,
            &mailer,
            Some(&blocker.to_string_lossy()),
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);

        let _ = std::fs::remove_file(&blocker);
    }
}
