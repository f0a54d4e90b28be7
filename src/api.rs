//! Generative-text and text-to-speech API clients.
//!
//! Both endpoints speak the OpenAI-compatible wire format, so any compatible
//! server (OpenAI, Azure OpenAI, a local gateway) can be configured.
//!
//! # Architecture
//!
//! - [`ScriptWriter`]: async trait for "prompt in, text out"
//! - [`SpeechSynth`]: async trait for "text in, MP3 bytes out"
//! - [`ChatClient`] / [`SpeechClient`]: reqwest-backed implementations
//!
//! The podcast stage is generic over the traits so it can be driven by stub
//! implementations in tests. Calls are made once; there is no retry.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::config::{LlmConfig, TtsConfig};
use crate::error::{DigestError, Result};
use crate::utils::truncate_for_log;

/// Speech endpoints reject longer inputs.
pub const MAX_TTS_INPUT_CHARS: usize = 4096;

/// Writes text from a system prompt and a user prompt.
pub trait ScriptWriter {
    async fn write(&self, system: &str, user: &str) -> Result<String>;
}

/// Turns text into MP3 audio.
pub trait SpeechSynth {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// Chat-completions client.
#[derive(Debug)]
pub struct ChatClient<'a> {
    client: &'a Client,
    config: &'a LlmConfig,
}

impl<'a> ChatClient<'a> {
    pub fn new(client: &'a Client, config: &'a LlmConfig) -> Self {
        Self { client, config }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

impl ScriptWriter for ChatClient<'_> {
    #[instrument(level = "info", skip_all, fields(model = %self.config.model))]
    async fn write(&self, system: &str, user: &str) -> Result<String> {
        let t0 = Instant::now();
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.7,
        };

        let resp = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            warn!(status = status.as_u16(), body = %truncate_for_log(&body, 300), "Chat API error");
            return Err(DigestError::Llm(format!(
                "HTTP {}: {}",
                status.as_u16(),
                truncate_for_log(&body, 200)
            )));
        }

        let text = parse_chat_response(&body)?;
        info!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            chars = text.chars().count(),
            "Chat API succeeded"
        );
        Ok(text)
    }
}

/// First choice's message content, trimmed.
pub fn parse_chat_response(body: &str) -> Result<String> {
    let resp: ChatResponse = serde_json::from_str(body)?;
    resp.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DigestError::Llm("response contained no message content".into()))
}

/// Speech endpoint client.
#[derive(Debug)]
pub struct SpeechClient<'a> {
    client: &'a Client,
    config: &'a TtsConfig,
}

impl<'a> SpeechClient<'a> {
    pub fn new(client: &'a Client, config: &'a TtsConfig) -> Self {
        Self { client, config }
    }
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

impl SpeechSynth for SpeechClient<'_> {
    #[instrument(level = "info", skip_all, fields(model = %self.config.model, voice = %self.config.voice))]
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let t0 = Instant::now();
        let input = clamp_tts_input(text);
        let request = SpeechRequest {
            model: &self.config.model,
            input: &input,
            voice: &self.config.voice,
            response_format: "mp3",
        };

        let resp = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DigestError::Tts(format!(
                "HTTP {}: {}",
                status.as_u16(),
                truncate_for_log(&body, 200)
            )));
        }

        let audio = resp.bytes().await?.to_vec();
        if audio.is_empty() {
            return Err(DigestError::Tts("empty audio response".into()));
        }
        info!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            bytes = audio.len(),
            "Speech API succeeded"
        );
        Ok(audio)
    }
}

/// Cut the script at the last sentence end that fits the input limit.
pub fn clamp_tts_input(text: &str) -> String {
    if text.chars().count() <= MAX_TTS_INPUT_CHARS {
        return text.to_string();
    }
    let head: String = text.chars().take(MAX_TTS_INPUT_CHARS).collect();
    match head.rfind(['.', '!', '?', '。', '！', '？']) {
        Some(idx) => {
            let end = idx + head[idx..].chars().next().map_or(1, char::len_utf8);
            head[..end].to_string()
        }
        None => head,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_response() {
        let body = r#"{
          "id": "chatcmpl-1",
          "choices": [
            {"index": 0, "message": {"role": "assistant", "content": "  Good morning, JoJo!  "}}
          ]
        }"#;
        assert_eq!(parse_chat_response(body).unwrap(), "Good morning, JoJo!");
    }

    #[test]
    fn test_parse_chat_response_empty() {
        assert!(parse_chat_response(r#"{"choices": []}"#).is_err());
        assert!(parse_chat_response(r#"{"choices": [{"message": {"content": null}}]}"#).is_err());
        assert!(parse_chat_response("not json").is_err());
    }

    #[test]
    fn test_clamp_tts_input_short() {
        assert_eq!(clamp_tts_input("Hello there."), "Hello there.");
    }

    #[test]
    fn test_clamp_tts_input_cuts_at_sentence() {
        let text = format!("{} Tail without an end", "A sentence. ".repeat(400));
        let clamped = clamp_tts_input(&text);
        assert!(clamped.chars().count() <= MAX_TTS_INPUT_CHARS);
        assert!(clamped.ends_with('.'));
    }

    #[test]
    fn test_clamp_tts_input_cjk_punctuation() {
        let text = "你好。".repeat(2000);
        let clamped = clamp_tts_input(&text);
        assert!(clamped.chars().count() <= MAX_TTS_INPUT_CHARS);
        assert!(clamped.ends_with('。'));
    }
}
