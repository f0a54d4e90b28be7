//! Run configuration.
//!
//! Settings are a flat key/value store: an optional YAML file, overridden by
//! environment variables with the same key names. [`Config::from_settings`]
//! validates them once at start-up into an immutable [`Config`] that is passed
//! explicitly to every stage.
//!
//! List-valued settings (`NEWS_RSS_URLS`, ...) may be a YAML sequence or a
//! JSON array string, so the same value works in the file and in the
//! environment.
//!
//! A missing reader address or an empty news feed list aborts the run before
//! any network activity. Every other malformed value falls back to its
//! default with a warning.

use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{DigestError, Result};

pub const DEFAULT_KCLS_CHINESE_KIDS_LIST_URLS: &[&str] =
    &["https://kcls.bibliocommons.com/v2/list/display/209392283/1188591387"];

pub const DEFAULT_CHINESE_KIDS_AWARD_URLS: &[&str] =
    &["https://www.chinawriter.com.cn/n1/2025/0725/c403937-40529641.html"];

pub const DEFAULT_READER_NAME: &str = "friend";
pub const DEFAULT_LIMIT: usize = 5;
/// Largest accepted `NEWS_LIMIT` / `BOOK_LIMIT`.
pub const MAX_LIMIT: usize = 50;

pub const DEFAULT_LLM_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TTS_API_URL: &str = "https://api.openai.com/v1/audio/speech";
pub const DEFAULT_TTS_MODEL: &str = "tts-1";
pub const DEFAULT_TTS_VOICE: &str = "alloy";

pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Every key read from the environment.
const KNOWN_KEYS: &[&str] = &[
    "READER_EMAIL",
    "PARENT_EMAIL",
    "READER_NAME",
    "NEWS_RSS_URLS",
    "GOOGLE_BOOKS_API_KEY",
    "KCLS_CHINESE_KIDS_LIST_URLS",
    "CHINESE_KIDS_AWARD_URLS",
    "NEWS_LIMIT",
    "BOOK_LIMIT",
    "PODCAST_ENABLED",
    "LLM_API_URL",
    "LLM_API_KEY",
    "LLM_MODEL",
    "TTS_API_URL",
    "TTS_API_KEY",
    "TTS_MODEL",
    "TTS_VOICE",
    "SMTP_HOST",
    "SMTP_PORT",
    "SMTP_USER",
    "SMTP_PASS",
    "MAIL_FROM",
];

/// Raw key/value settings before validation.
#[derive(Debug, Default, Clone)]
pub struct Settings {
    values: BTreeMap<String, Value>,
}

impl Settings {
    /// Load the YAML file (if any), then apply environment overrides.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut settings = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        for key in KNOWN_KEYS {
            if let Ok(v) = std::env::var(key) {
                debug!(key, "Setting overridden from environment");
                settings.set(key, v);
            }
        }
        Ok(settings)
    }

    pub fn from_file(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            return Err(DigestError::Config(format!("settings file not found: {path}")));
        }
        let raw = std::fs::read_to_string(path)?;
        let settings = Self::from_yaml_str(&raw)?;
        info!(path, keys = settings.values.len(), "Loaded settings file");
        Ok(settings)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let values: BTreeMap<String, Value> = serde_yaml::from_str(raw)
            .map_err(|e| DigestError::Config(format!("invalid settings YAML: {e}")))?;
        Ok(Self { values })
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), Value::String(value.into()));
    }

    /// Scalar setting as a trimmed string; empty values count as missing.
    fn get(&self, key: &str) -> Option<String> {
        let s = match self.values.get(key)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => return None,
            other => {
                warn!(key, value = ?other, "Expected a scalar setting; ignoring");
                return None;
            }
        };
        (!s.is_empty()).then_some(s)
    }

    /// List setting. `None` when absent, `Some(Err)` when present but unusable.
    fn get_list(&self, key: &str) -> Option<std::result::Result<Vec<String>, String>> {
        let value = self.values.get(key)?;
        let parsed = match value {
            Value::Sequence(seq) => seq
                .iter()
                .map(|v| match v {
                    Value::String(s) => Ok(s.trim().to_string()),
                    other => Err(format!("non-string list entry {other:?}")),
                })
                .collect::<std::result::Result<Vec<_>, _>>(),
            Value::String(s) => {
                serde_json::from_str::<Vec<String>>(s).map_err(|e| format!("not a JSON array: {e}"))
            }
            Value::Null => return None,
            other => Err(format!("unexpected value {other:?}")),
        };
        Some(parsed.map(|v| v.into_iter().filter(|s| !s.is_empty()).collect()))
    }

    /// Optional list with a default for absent, malformed, or empty values.
    fn list_or_default(&self, key: &str, default: &[&str]) -> Vec<String> {
        let fallback = || default.iter().map(|s| s.to_string()).collect();
        match self.get_list(key) {
            None => fallback(),
            Some(Ok(list)) if !list.is_empty() => list,
            Some(Ok(_)) => {
                warn!(key, "Empty list setting; using default list");
                fallback()
            }
            Some(Err(e)) => {
                warn!(key, error = %e, "Invalid list setting; using default list");
                fallback()
            }
        }
    }

    /// Count in `1..=max`; anything else falls back to `default`.
    fn count_or_default(&self, key: &str, default: usize, max: usize) -> usize {
        match self.get(key) {
            None => default,
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if (1..=max).contains(&n) => n,
                _ => {
                    warn!(key, value = %raw, default, max, "Invalid count setting; using default");
                    default
                }
            },
        }
    }

    fn bool_or_default(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            None => default,
            Some(raw) => match raw.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => true,
                "false" | "0" | "no" | "off" => false,
                _ => {
                    warn!(key, value = %raw, default, "Invalid boolean setting; using default");
                    default
                }
            },
        }
    }
}

/// Chat-completions endpoint used to write the narration script.
#[derive(Clone)]
pub struct LlmConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

/// Speech endpoint used to turn the script into MP3.
#[derive(Clone)]
pub struct TtsConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub voice: String,
}

impl std::fmt::Debug for TtsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtsConfig")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("voice", &self.voice)
            .finish_non_exhaustive()
    }
}

/// Podcast settings. Present only when the podcast is enabled and usable.
#[derive(Debug, Clone)]
pub struct PodcastConfig {
    /// Without an LLM the templated script is used directly.
    pub llm: Option<LlmConfig>,
    pub tts: TtsConfig,
}

#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

/// Validated configuration for one run.
#[derive(Clone)]
pub struct Config {
    pub recipients: Vec<String>,
    pub reader_name: String,
    pub news_rss_urls: Vec<String>,
    pub google_books_api_key: Option<String>,
    pub kcls_list_urls: Vec<String>,
    pub award_urls: Vec<String>,
    pub news_limit: usize,
    pub book_limit: usize,
    pub podcast: Option<PodcastConfig>,
    /// `None` only in dry-run mode.
    pub smtp: Option<SmtpConfig>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("recipients", &self.recipients)
            .field("reader_name", &self.reader_name)
            .field("news_rss_urls", &self.news_rss_urls)
            .field("google_books_api_key", &self.google_books_api_key.as_ref().map(|_| "<set>"))
            .field("kcls_list_urls", &self.kcls_list_urls)
            .field("award_urls", &self.award_urls)
            .field("news_limit", &self.news_limit)
            .field("book_limit", &self.book_limit)
            .field("podcast", &self.podcast)
            .field("smtp", &self.smtp)
            .finish()
    }
}

impl Config {
    /// Validate raw settings.
    ///
    /// `require_smtp` is false in dry-run mode, where nothing is sent.
    pub fn from_settings(settings: &Settings, require_smtp: bool) -> Result<Self> {
        let reader_email = settings
            .get("READER_EMAIL")
            .ok_or_else(|| DigestError::Config("missing setting: READER_EMAIL".into()))?;
        let mut recipients = vec![reader_email];
        if let Some(parent) = settings.get("PARENT_EMAIL") {
            recipients.push(parent);
        }

        let news_rss_urls = match settings.get_list("NEWS_RSS_URLS") {
            Some(Ok(list)) if !list.is_empty() => list,
            Some(Err(e)) => {
                return Err(DigestError::Config(format!(
                    "invalid setting NEWS_RSS_URLS (JSON array expected): {e}"
                )));
            }
            _ => {
                return Err(DigestError::Config(
                    "missing setting: NEWS_RSS_URLS (non-empty JSON array)".into(),
                ));
            }
        };

        let reader_name = settings.get("READER_NAME").unwrap_or_else(|| {
            warn!(default = DEFAULT_READER_NAME, "READER_NAME not set; using default");
            DEFAULT_READER_NAME.to_string()
        });

        let config = Self {
            recipients,
            reader_name,
            news_rss_urls,
            google_books_api_key: settings.get("GOOGLE_BOOKS_API_KEY"),
            kcls_list_urls: settings
                .list_or_default("KCLS_CHINESE_KIDS_LIST_URLS", DEFAULT_KCLS_CHINESE_KIDS_LIST_URLS),
            award_urls: settings
                .list_or_default("CHINESE_KIDS_AWARD_URLS", DEFAULT_CHINESE_KIDS_AWARD_URLS),
            news_limit: settings.count_or_default("NEWS_LIMIT", DEFAULT_LIMIT, MAX_LIMIT),
            book_limit: settings.count_or_default("BOOK_LIMIT", DEFAULT_LIMIT, MAX_LIMIT),
            podcast: podcast_config(settings),
            smtp: smtp_config(settings, require_smtp)?,
        };

        info!(
            recipients = config.recipients.len(),
            feeds = config.news_rss_urls.len(),
            kcls_lists = config.kcls_list_urls.len(),
            award_pages = config.award_urls.len(),
            podcast = config.podcast.is_some(),
            "Configuration validated"
        );
        Ok(config)
    }
}

fn podcast_config(settings: &Settings) -> Option<PodcastConfig> {
    if !settings.bool_or_default("PODCAST_ENABLED", false) {
        return None;
    }

    let llm = settings.get("LLM_API_KEY").map(|api_key| LlmConfig {
        api_url: settings
            .get("LLM_API_URL")
            .unwrap_or_else(|| DEFAULT_LLM_API_URL.to_string()),
        api_key,
        model: settings
            .get("LLM_MODEL")
            .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
    });

    let Some(tts_key) = settings
        .get("TTS_API_KEY")
        .or_else(|| llm.as_ref().map(|l| l.api_key.clone()))
    else {
        warn!("PODCAST_ENABLED is set but neither TTS_API_KEY nor LLM_API_KEY is; podcast disabled");
        return None;
    };

    Some(PodcastConfig {
        llm,
        tts: TtsConfig {
            api_url: settings
                .get("TTS_API_URL")
                .unwrap_or_else(|| DEFAULT_TTS_API_URL.to_string()),
            api_key: tts_key,
            model: settings
                .get("TTS_MODEL")
                .unwrap_or_else(|| DEFAULT_TTS_MODEL.to_string()),
            voice: settings
                .get("TTS_VOICE")
                .unwrap_or_else(|| DEFAULT_TTS_VOICE.to_string()),
        },
    })
}

fn smtp_config(settings: &Settings, required: bool) -> Result<Option<SmtpConfig>> {
    let (Some(username), Some(password)) = (settings.get("SMTP_USER"), settings.get("SMTP_PASS"))
    else {
        if required {
            return Err(DigestError::Config(
                "missing setting: SMTP_USER and SMTP_PASS are required to send".into(),
            ));
        }
        return Ok(None);
    };

    let port = match settings.get("SMTP_PORT") {
        None => DEFAULT_SMTP_PORT,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(value = %raw, default = DEFAULT_SMTP_PORT, "Invalid SMTP_PORT; using default");
            DEFAULT_SMTP_PORT
        }),
    };

    Ok(Some(SmtpConfig {
        host: settings
            .get("SMTP_HOST")
            .unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
        port,
        from: settings.get("MAIL_FROM").unwrap_or_else(|| username.clone()),
        username,
        password,
    }))
}
