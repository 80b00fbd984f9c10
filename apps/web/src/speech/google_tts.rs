use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::Client;
use tracing::debug;

use super::{SpeechBackend, SpeechError};

const TTS_URL: &str = "https://translate.google.com/translate_tts";
/// The endpoint rejects longer `q` values.
const MAX_CHUNK_CHARS: usize = 100;

/// Google Translate's public speech endpoint (the one gTTS-style clients use).
///
/// Text is split into word-aligned chunks of at most 100 characters, each
/// chunk is fetched in order, and the MP3 pieces are concatenated. One
/// request per chunk, no retries.
#[derive(Clone)]
pub struct GoogleTranslateTts {
    client: Client,
}

impl GoogleTranslateTts {
    pub fn new(timeout: Duration) -> Result<Self, SpeechError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
        })
    }
}

#[async_trait]
impl SpeechBackend for GoogleTranslateTts {
    async fn synthesize(&self, text: &str, lang: &str) -> Result<Bytes, SpeechError> {
        let chunks = chunk_text(text, MAX_CHUNK_CHARS);
        let total = chunks.len().to_string();
        let mut audio = BytesMut::new();

        for (idx, chunk) in chunks.iter().enumerate() {
            let idx_param = idx.to_string();
            let len_param = chunk.len().to_string();
            let response = self
                .client
                .get(TTS_URL)
                .query(&[
                    ("ie", "UTF-8"),
                    ("client", "tw-ob"),
                    ("tl", lang),
                    ("q", chunk.as_str()),
                    ("total", total.as_str()),
                    ("idx", idx_param.as_str()),
                    ("textlen", len_param.as_str()),
                ])
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(SpeechError::Status {
                    status: status.as_u16(),
                    chunk: idx,
                });
            }

            let bytes = response.bytes().await?;
            debug!("TTS chunk {}/{}: {} bytes", idx + 1, total, bytes.len());
            audio.extend_from_slice(&bytes);
        }

        Ok(audio.freeze())
    }
}

/// Splits on whitespace into chunks of at most `max_chars` characters.
/// A single word longer than that is cut into `max_chars` pieces.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        while word.len() > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(max_chars);
            chunks.push(word.into_iter().collect());
            word = rest;
        }

        let word: String = word.into_iter().collect();
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };

        if needed > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
