//! Session Controller: the glue between the page and the backends.
//!
//! A session holds three independent result slots. Analyze writes
//! `analysis_result`, Match writes `match_result`, and both overwrite
//! `last_result`. Nothing is cleared when the inputs change; a slot only
//! changes when its own action runs again.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::document::{DocumentPreprocessor, UploadedDocument};
use crate::errors::AppError;
use crate::evaluation::{
    DegradeReason, EvaluationOutcome, EvaluationRequest, Evaluator, PromptKind,
};
use crate::speech::{AudioPayload, SpeechRenderer};

pub mod handlers;
pub mod store;
pub mod view;

pub use store::SessionStore;

pub const UPLOAD_WARNING: &str = "Please upload the resume";
pub const NO_RESPONSE_WARNING: &str = "No response available yet. Generate a response first.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResult {
    pub outcome: EvaluationOutcome,
    pub generated_at: DateTime<Utc>,
}

impl StoredResult {
    pub fn new(outcome: EvaluationOutcome) -> Self {
        Self {
            outcome,
            generated_at: Utc::now(),
        }
    }

    pub fn text(&self) -> &str {
        self.outcome.text()
    }
}

/// Everything one user has entered or received so far.
#[derive(Debug, Default, Clone)]
pub struct SessionState {
    pub job_description: String,
    pub upload: Option<UploadedDocument>,
    pub analysis_result: Option<StoredResult>,
    pub match_result: Option<StoredResult>,
    pub last_result: Option<StoredResult>,
}

impl SessionState {
    pub fn slot(&self, target: ReadAloudTarget) -> Option<&StoredResult> {
        match target {
            ReadAloudTarget::Analysis => self.analysis_result.as_ref(),
            ReadAloudTarget::Match => self.match_result.as_ref(),
            ReadAloudTarget::Last => self.last_result.as_ref(),
        }
    }

    fn store(&mut self, kind: PromptKind, result: StoredResult) {
        match kind {
            PromptKind::Analysis => self.analysis_result = Some(result.clone()),
            PromptKind::Match => self.match_result = Some(result.clone()),
        }
        self.last_result = Some(result);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadAloudTarget {
    Analysis,
    Match,
    Last,
}

impl ReadAloudTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadAloudTarget::Analysis => "analysis",
            ReadAloudTarget::Match => "match",
            ReadAloudTarget::Last => "last",
        }
    }
}

impl FromStr for ReadAloudTarget {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "analysis" => Ok(ReadAloudTarget::Analysis),
            "match" => Ok(ReadAloudTarget::Match),
            "last" => Ok(ReadAloudTarget::Last),
            other => Err(AppError::NotFound(format!("No read-aloud target '{other}'"))),
        }
    }
}

/// What one interaction produced besides state changes. Shown once, never stored.
#[derive(Debug, Default)]
pub struct Feedback {
    pub warnings: Vec<String>,
    pub audio: Option<(ReadAloudTarget, AudioPayload)>,
}

impl Feedback {
    pub fn warn(message: impl Into<String>) -> Self {
        Self {
            warnings: vec![message.into()],
            audio: None,
        }
    }

    pub fn audio_for(&self, target: ReadAloudTarget) -> Option<&AudioPayload> {
        self.audio
            .as_ref()
            .filter(|(t, _)| *t == target)
            .map(|(_, audio)| audio)
    }
}

#[derive(Clone)]
pub struct SessionController {
    preprocessor: DocumentPreprocessor,
    evaluator: Evaluator,
    speech: SpeechRenderer,
}

impl SessionController {
    pub fn new(
        preprocessor: DocumentPreprocessor,
        evaluator: Evaluator,
        speech: SpeechRenderer,
    ) -> Self {
        Self {
            preprocessor,
            evaluator,
            speech,
        }
    }

    /// "Tell Me About the Resume".
    pub async fn analyze(
        &self,
        state: &mut SessionState,
        cancel: &CancellationToken,
    ) -> Result<Feedback, AppError> {
        self.evaluate(state, PromptKind::Analysis, cancel).await
    }

    /// "Percentage Match".
    pub async fn match_resume(
        &self,
        state: &mut SessionState,
        cancel: &CancellationToken,
    ) -> Result<Feedback, AppError> {
        self.evaluate(state, PromptKind::Match, cancel).await
    }

    async fn evaluate(
        &self,
        state: &mut SessionState,
        kind: PromptKind,
        cancel: &CancellationToken,
    ) -> Result<Feedback, AppError> {
        if state.upload.is_none() {
            warn!("{} requested without an uploaded resume", kind.as_str());
            return Ok(Feedback::warn(UPLOAD_WARNING));
        }

        // Decode failures are fatal for this interaction and leave state untouched.
        let document = self.preprocessor.prepare(state.upload.as_ref()).await?;
        let request = EvaluationRequest::new(kind, document, state.job_description.clone());
        let outcome = self.evaluator.evaluate(&request, cancel).await;

        // A user-initiated cancel keeps whatever the slots held before.
        if let EvaluationOutcome::Degraded {
            reason: DegradeReason::Cancelled,
            message,
        } = outcome
        {
            info!("{} cancelled, stored results left as they were", kind.as_str());
            return Ok(Feedback::warn(message));
        }

        state.store(kind, StoredResult::new(outcome));
        info!("Stored {} result", kind.as_str());
        Ok(Feedback::default())
    }

    /// Synthesizes the text currently in `target`'s slot. Fresh audio every call.
    pub async fn read_aloud(
        &self,
        state: &SessionState,
        target: ReadAloudTarget,
    ) -> Result<Feedback, AppError> {
        let Some(result) = state.slot(target).filter(|r| !r.text().is_empty()) else {
            return Ok(Feedback::warn(match target {
                ReadAloudTarget::Last => NO_RESPONSE_WARNING.to_string(),
                other => format!("No {} response to read yet.", other.as_str()),
            }));
        };

        let audio = self.speech.synthesize(result.text()).await?;
        Ok(Feedback {
            warnings: Vec::new(),
            audio: Some((target, audio)),
        })
    }
}
