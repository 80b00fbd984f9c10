//! Axum route handlers for the interactive page.
//!
//! Every handler ends by re-rendering the whole page from session state, so
//! whatever the user sees always reflects the latest committed result.

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, HeaderMap},
    response::{Html, IntoResponse, Redirect, Response},
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::document::UploadedDocument;
use crate::errors::AppError;
use crate::evaluation::PromptKind;
use crate::session::store::{session_cookie, session_id_from_headers};
use crate::session::{view, Feedback, ReadAloudTarget, SessionState};
use crate::state::AppState;

const JOB_DESCRIPTION_FIELD: &str = "job_description";
const RESUME_FIELD: &str = "resume";

/// Inputs submitted with Analyze, Match and Read Aloud.
#[derive(Debug, Default)]
pub struct ActionForm {
    pub job_description: Option<String>,
    pub upload: Option<UploadedDocument>,
    /// Name of a submitted file that was not a PDF.
    pub rejected_file: Option<String>,
}

impl ActionForm {
    /// Copies the inputs into the session. Stored results are left alone even
    /// when the resume or job description changes.
    fn apply(self, state: &mut SessionState) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Some(job_description) = self.job_description {
            state.job_description = job_description;
        }
        if let Some(upload) = self.upload {
            info!(
                "Resume uploaded: '{}' ({} bytes)",
                upload.file_name,
                upload.bytes.len()
            );
            state.upload = Some(upload);
        }
        if let Some(name) = self.rejected_file {
            warn!("Rejected non-PDF upload '{name}'");
            warnings.push(format!(
                "'{name}' is not a PDF. Please upload your resume in PDF format only."
            ));
        }
        warnings
    }
}

fn is_pdf(file_name: &str, content_type: Option<&str>) -> bool {
    content_type == Some("application/pdf") || file_name.to_ascii_lowercase().ends_with(".pdf")
}

fn form_error(e: MultipartError) -> AppError {
    AppError::Validation(format!("Malformed form data: {e}"))
}

async fn read_action_form(mut multipart: Multipart) -> Result<ActionForm, AppError> {
    let mut form = ActionForm::default();

    while let Some(field) = multipart.next_field().await.map_err(form_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(JOB_DESCRIPTION_FIELD) => {
                form.job_description = Some(field.text().await.map_err(form_error)?);
            }
            Some(RESUME_FIELD) => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(form_error)?;

                // Browsers send an empty part when no file was chosen.
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                if is_pdf(&file_name, content_type.as_deref()) {
                    form.upload = Some(UploadedDocument::new(file_name, bytes));
                } else {
                    form.rejected_file = Some(file_name);
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

fn page_response(id: Uuid, created: bool, html: String) -> Result<Response, AppError> {
    let mut response = Html(html).into_response();
    if created {
        response
            .headers_mut()
            .insert(header::SET_COOKIE, session_cookie(id)?);
    }
    Ok(response)
}

/// GET /
pub async fn handle_index(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let (id, handle, created) = state.sessions.resolve(session_id_from_headers(&headers)).await;

    let html = if handle.is_evaluating() {
        view::render_busy_page()
    } else {
        let session = handle.state.lock().await;
        view::render_page(&session, &Feedback::default())
    };
    page_response(id, created, html)
}

/// POST /analyze
pub async fn handle_analyze(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, AppError> {
    run_evaluation(state, headers, multipart, PromptKind::Analysis).await
}

/// POST /match
pub async fn handle_match(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, AppError> {
    run_evaluation(state, headers, multipart, PromptKind::Match).await
}

async fn run_evaluation(
    state: AppState,
    headers: HeaderMap,
    multipart: Multipart,
    kind: PromptKind,
) -> Result<Response, AppError> {
    let form = read_action_form(multipart).await?;
    let (id, handle, created) = state.sessions.resolve(session_id_from_headers(&headers)).await;

    let mut session = handle.state.lock().await;
    let mut warnings = form.apply(&mut session);

    let feedback = {
        let guard = handle.begin_evaluation();
        match kind {
            PromptKind::Analysis => state.controller.analyze(&mut session, &guard.token).await,
            PromptKind::Match => state.controller.match_resume(&mut session, &guard.token).await,
        }
    };
    let mut feedback = feedback?;

    warnings.append(&mut feedback.warnings);
    feedback.warnings = warnings;
    page_response(id, created, view::render_page(&session, &feedback))
}

/// POST /read-aloud/:target
///
/// The page submits the input form along with the request, so unsaved edits
/// to the job description survive. A bare POST works too.
pub async fn handle_read_aloud(
    State(state): State<AppState>,
    Path(target): Path<String>,
    headers: HeaderMap,
    multipart: Option<Multipart>,
) -> Result<Response, AppError> {
    let target: ReadAloudTarget = target.parse()?;
    let form = match multipart {
        Some(multipart) => read_action_form(multipart).await?,
        None => ActionForm::default(),
    };
    let (id, handle, created) = state.sessions.resolve(session_id_from_headers(&headers)).await;

    let mut session = handle.state.lock().await;
    let mut warnings = form.apply(&mut session);
    let mut feedback = state.controller.read_aloud(&session, target).await?;

    warnings.append(&mut feedback.warnings);
    feedback.warnings = warnings;
    page_response(id, created, view::render_page(&session, &feedback))
}

/// POST /cancel
pub async fn handle_cancel(State(state): State<AppState>, headers: HeaderMap) -> Redirect {
    if let Some(id) = session_id_from_headers(&headers) {
        if let Some(handle) = state.sessions.get(id).await {
            if handle.cancel_inflight() {
                info!("Cancelled running evaluation for session {id}");
            }
        }
    }
    Redirect::to("/")
}
