//! Read-aloud support: sanitize generated text, hand it to a TTS backend,
//! return the whole MP3 in memory. Nothing is cached or written to disk.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use thiserror::Error;
use tracing::info;

pub mod google_tts;
pub mod sanitize;

pub use google_tts::GoogleTranslateTts;

pub const MP3_MIME_TYPE: &str = "audio/mpeg";

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TTS backend returned status {status} for chunk {chunk}")]
    Status { status: u16, chunk: usize },

    #[error("TTS backend returned no audio")]
    EmptyAudio,
}

/// Encoded audio, positioned at the start: read it all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPayload {
    pub bytes: Bytes,
    pub mime_type: &'static str,
}

impl AudioPayload {
    pub fn mp3(bytes: Bytes) -> Self {
        Self {
            bytes,
            mime_type: MP3_MIME_TYPE,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// `data:` URI for an inline `<audio>` source.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }
}

/// Text-to-speech engine for one language at a time.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    async fn synthesize(&self, text: &str, lang: &str) -> Result<Bytes, SpeechError>;
}

#[derive(Clone)]
pub struct SpeechRenderer {
    backend: Arc<dyn SpeechBackend>,
    default_lang: String,
}

impl SpeechRenderer {
    pub fn new(backend: Arc<dyn SpeechBackend>, default_lang: impl Into<String>) -> Self {
        Self {
            backend,
            default_lang: default_lang.into(),
        }
    }

    pub fn default_lang(&self) -> &str {
        &self.default_lang
    }

    /// Speaks `text` in the configured default language.
    pub async fn synthesize(&self, text: &str) -> Result<AudioPayload, SpeechError> {
        self.synthesize_in(text, &self.default_lang).await
    }

    pub async fn synthesize_in(&self, text: &str, lang: &str) -> Result<AudioPayload, SpeechError> {
        let clean = sanitize::speakable(text);
        let audio = AudioPayload::mp3(self.backend.synthesize(&clean, lang).await?);
        if audio.is_empty() {
            return Err(SpeechError::EmptyAudio);
        }
        info!(
            "Synthesized {} chars of text into {} bytes of audio ({lang})",
            clean.len(),
            audio.len()
        );
        Ok(audio)
    }
}


#[cfg(test)]
mod tests {
    use super::sanitize::FALLBACK_SENTENCE;
    use super::testing::EchoSpeech;
    use super::*;

    fn renderer() -> (Arc<EchoSpeech>, SpeechRenderer) {
        let backend = Arc::new(EchoSpeech::default());
        (backend.clone(), SpeechRenderer::new(backend, "en"))
    }

    #[tokio::test]
    async fn test_empty_text_speaks_fallback() {
        let (backend, speech) = renderer();
        for input in ["", "   "] {
            let audio = speech.synthesize(input).await.unwrap();
            assert!(!audio.is_empty());
        }
        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|(text, _)| text == FALLBACK_SENTENCE));
    }

    #[tokio::test]
    async fn test_text_is_sanitized_before_synthesis() {
        let (backend, speech) = renderer();
        speech.synthesize("## **Fit:** 80% 🚀").await.unwrap();
        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls[0], ("Fit: 80%".to_string(), "en".to_string()));
    }

    #[tokio::test]
    async fn test_language_is_forwarded() {
        let (backend, speech) = renderer();
        speech.synthesize_in("Bonjour", "fr").await.unwrap();
        assert_eq!(backend.calls.lock().unwrap()[0].1, "fr");
    }

    #[tokio::test]
    async fn test_identical_text_is_synthesized_every_time() {
        let (backend, speech) = renderer();
        speech.synthesize("Same text").await.unwrap();
        speech.synthesize("Same text").await.unwrap();
        assert_eq!(backend.calls.lock().unwrap().len(), 2);
    }

    struct SilentSpeech;

    #[async_trait]
    impl SpeechBackend for SilentSpeech {
        async fn synthesize(&self, _text: &str, _lang: &str) -> Result<Bytes, SpeechError> {
            Ok(Bytes::new())
        }
    }

    #[tokio::test]
    async fn test_empty_audio_is_an_error() {
        let speech = SpeechRenderer::new(Arc::new(SilentSpeech), "en");
        let err = speech.synthesize("Hello").await.unwrap_err();
        assert!(matches!(err, SpeechError::EmptyAudio));
    }

    #[test]
    fn test_data_uri() {
        let audio = AudioPayload::mp3(Bytes::from_static(b"ID3"));
        assert_eq!(audio.to_data_uri(), "data:audio/mpeg;base64,SUQz");
    }
}
