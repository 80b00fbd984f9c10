//! Evaluation: sends one resume page and a job description to the model and
//! always comes back with something to show.
//!
//! Backend failures never reach the caller as errors. They come back as
//! `EvaluationOutcome::Degraded`, tagged with a reason so the view can render
//! them differently from genuine model output.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::document::EncodedImage;
use crate::llm_client::prompts::{ANALYSIS_PROMPT, MATCH_PROMPT};
use crate::llm_client::LlmError;

/// Shown instead of model output when the free-tier quota is used up.
pub const QUOTA_WARNING: &str = "⚠️ Gemini API quota exceeded for the free tier.\n\n\
Please wait for a short time before trying again, \
or reduce how often you click the buttons.";

/// Prefix carried by every degraded message.
pub const WARNING_MARKER: &str = "⚠️";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Analysis,
    Match,
}

impl PromptKind {
    pub fn instruction(&self) -> &'static str {
        match self {
            PromptKind::Analysis => ANALYSIS_PROMPT,
            PromptKind::Match => MATCH_PROMPT,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PromptKind::Analysis => "analysis",
            PromptKind::Match => "match",
        }
    }
}

/// One model call. Built fresh per user action and never mutated.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub prompt: PromptKind,
    pub document: EncodedImage,
    pub job_description: String,
}

impl EvaluationRequest {
    pub fn new(prompt: PromptKind, document: EncodedImage, job_description: String) -> Self {
        Self {
            prompt,
            document,
            job_description,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradeReason {
    QuotaExceeded,
    BackendFailure,
    TimedOut,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationOutcome {
    Generated(String),
    Degraded {
        reason: DegradeReason,
        message: String,
    },
}

impl EvaluationOutcome {
    /// The text shown to (and read aloud for) the user, whichever variant.
    pub fn text(&self) -> &str {
        match self {
            EvaluationOutcome::Generated(text) => text,
            EvaluationOutcome::Degraded { message, .. } => message,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, EvaluationOutcome::Degraded { .. })
    }

    fn from_error(err: &LlmError) -> Self {
        if err.is_quota() {
            EvaluationOutcome::Degraded {
                reason: DegradeReason::QuotaExceeded,
                message: QUOTA_WARNING.to_string(),
            }
        } else {
            EvaluationOutcome::Degraded {
                reason: DegradeReason::BackendFailure,
                message: format!("{WARNING_MARKER} Error while calling Gemini: {err}"),
            }
        }
    }
}

/// Anything that can turn an `EvaluationRequest` into model text.
/// `GeminiClient` in production, fakes in tests.
#[async_trait]
pub trait EvaluationBackend: Send + Sync {
    async fn generate(&self, request: &EvaluationRequest) -> Result<String, LlmError>;
}

/// Wraps a backend with the degrade-not-fail policy, a timeout and cancellation.
#[derive(Clone)]
pub struct Evaluator {
    backend: Arc<dyn EvaluationBackend>,
    timeout: Duration,
}

impl Evaluator {
    pub fn new(backend: Arc<dyn EvaluationBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub async fn evaluate(
        &self,
        request: &EvaluationRequest,
        cancel: &CancellationToken,
    ) -> EvaluationOutcome {
        let kind = request.prompt.as_str();
        info!(
            "Evaluating resume ({kind}), job description {} chars",
            request.job_description.len()
        );

        let call = tokio::time::timeout(self.timeout, self.backend.generate(request));

        let outcome = tokio::select! {
            _ = cancel.cancelled() => EvaluationOutcome::Degraded {
                reason: DegradeReason::Cancelled,
                message: format!(
                    "{WARNING_MARKER} The request was cancelled before Gemini responded."
                ),
            },
            result = call => match result {
                Ok(Ok(text)) => EvaluationOutcome::Generated(text),
                Ok(Err(err)) => {
                    warn!("Evaluation ({kind}) degraded: {err}");
                    EvaluationOutcome::from_error(&err)
                }
                Err(_) => EvaluationOutcome::Degraded {
                    reason: DegradeReason::TimedOut,
                    message: format!(
                        "{WARNING_MARKER} Gemini did not respond within {} seconds. Please try again.",
                        self.timeout.as_secs()
                    ),
                },
            },
        };

        match &outcome {
            EvaluationOutcome::Generated(text) => {
                info!("Evaluation ({kind}) returned {} chars", text.len())
            }
            EvaluationOutcome::Degraded { reason, .. } => {
                warn!("Evaluation ({kind}) finished degraded: {reason:?}")
            }
        }
        outcome
    }
}
