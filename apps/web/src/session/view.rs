//! The page, re-derived from session state on every request.
//!
//! Nothing here mutates state. Each call renders every non-empty slot, the
//! transient feedback of the current interaction, and the floating control.

use std::fmt::Write as _;

use super::{Feedback, ReadAloudTarget, SessionState, StoredResult};
use crate::speech::AudioPayload;

pub const PAGE_TITLE: &str = "Resume Tracking Expert";

/// Every action button submits this form, so the inputs travel with each click.
const INPUT_FORM_ID: &str = "inputs";

const STYLE: &str = r#"
body { font-family: sans-serif; max-width: 860px; margin: 2rem auto; padding: 0 1rem; }
textarea { width: 100%; min-height: 10rem; }
.warning { background: #fff4ce; border-left: 4px solid #f0b400; padding: .6rem 1rem; margin: .6rem 0; }
.success { background: #e7f6ea; border-left: 4px solid #2e9d4b; padding: .6rem 1rem; margin: .6rem 0; }
.result { display: flex; gap: 1rem; align-items: flex-start; }
.result .text { flex: 4; white-space: pre-wrap; }
.result .controls { flex: 1; }
.result.degraded .text { color: #8a5300; }
.meta { color: #777; font-size: .8rem; }
audio { width: 100%; margin-top: 10px; }
.floating-audio-btn button {
    position: fixed;
    bottom: 20px;
    right: 20px;
    border-radius: 50%;
    height: 60px;
    width: 60px;
    font-size: 26px;
    box-shadow: 0 4px 10px rgba(0,0,0,0.3);
    z-index: 9999;
}
"#;

pub fn render_page(state: &SessionState, feedback: &Feedback) -> String {
    let mut html = String::with_capacity(8 * 1024);
    render_head(&mut html);
    render_inputs(&mut html, state);

    for warning in &feedback.warnings {
        let _ = write!(html, "<div class=\"warning\">{}</div>", escape_html(warning));
    }

    if let Some(result) = state.analysis_result.as_ref().filter(|r| !r.text().is_empty()) {
        render_result(
            &mut html,
            "Analysis: Tell Me About the Resume",
            ReadAloudTarget::Analysis,
            result,
            feedback,
        );
    }
    if let Some(result) = state.match_result.as_ref().filter(|r| !r.text().is_empty()) {
        render_result(
            &mut html,
            "Analysis: Percentage Match",
            ReadAloudTarget::Match,
            result,
            feedback,
        );
    }

    if let Some(audio) = feedback.audio_for(ReadAloudTarget::Last) {
        render_audio(&mut html, audio);
    }
    let _ = write!(
        html,
        "<div class=\"floating-audio-btn\">\
         <button type=\"submit\" form=\"{INPUT_FORM_ID}\" formaction=\"/read-aloud/last\" \
         title=\"Read last response\">🔊</button></div>"
    );

    html.push_str("</body></html>");
    html
}

/// Shown while another request of the same session holds its state.
pub fn render_busy_page() -> String {
    let mut html = String::with_capacity(2 * 1024);
    render_head(&mut html);
    html.push_str(
        "<div class=\"warning\">An evaluation is still running for this session. \
         Refresh this page to see the result when it finishes.</div>\
         <form method=\"post\" action=\"/cancel\">\
         <button type=\"submit\">Cancel running evaluation</button></form>\
         </body></html>",
    );
    html
}

fn render_head(html: &mut String) {
    let _ = write!(
        html,
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">\
         <title>{PAGE_TITLE}</title><style>{STYLE}</style></head><body>\
         <h1>{PAGE_TITLE}</h1>"
    );
}

fn render_inputs(html: &mut String, state: &SessionState) {
    let _ = write!(
        html,
        "<form id=\"{INPUT_FORM_ID}\" method=\"post\" action=\"/analyze\" enctype=\"multipart/form-data\">\
         <label for=\"job_description\">Job Description: </label>\
         <textarea id=\"job_description\" name=\"job_description\">{}</textarea>\
         <p><label for=\"resume\">Upload your resume in PDF format only!</label><br>\
         <input type=\"file\" id=\"resume\" name=\"resume\" accept=\".pdf,application/pdf\"></p>",
        escape_html(&state.job_description)
    );

    if let Some(upload) = &state.upload {
        let _ = write!(
            html,
            "<div class=\"success\">Your PDF uploaded successfully <span class=\"meta\">({})</span></div>",
            escape_html(&upload.file_name)
        );
    }

    html.push_str(
        "<p><button type=\"submit\" formaction=\"/analyze\">Tell Me About the Resume</button> \
         <button type=\"submit\" formaction=\"/match\">Percentage Match</button></p></form>",
    );
}

fn render_result(
    html: &mut String,
    heading: &str,
    target: ReadAloudTarget,
    result: &StoredResult,
    feedback: &Feedback,
) {
    let class = if result.outcome.is_degraded() {
        "result degraded"
    } else {
        "result"
    };
    let _ = write!(
        html,
        "<section id=\"{id}\"><h2>{heading}</h2><div class=\"{class}\">\
         <div class=\"text\">{text}</div>\
         <div class=\"controls\"><button type=\"submit\" form=\"{INPUT_FORM_ID}\" \
         formaction=\"/read-aloud/{id}\">🔊 Read Aloud</button></div></div>\
         <p class=\"meta\">Generated {time}</p>",
        id = target.as_str(),
        text = escape_html(result.text()),
        time = result.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
    );
    if let Some(audio) = feedback.audio_for(target) {
        render_audio(html, audio);
    }
    html.push_str("</section>");
}

fn render_audio(html: &mut String, audio: &AudioPayload) {
    let _ = write!(
        html,
        "<audio controls autoplay><source src=\"{uri}\" type=\"{mime}\">\
         Your browser does not support the audio element.</audio>",
        uri = audio.to_data_uri(),
        mime = audio.mime_type,
    );
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::document::UploadedDocument;
    use crate::evaluation::{DegradeReason, EvaluationOutcome};

    fn stored(text: &str) -> StoredResult {
        StoredResult::new(EvaluationOutcome::Generated(text.to_string()))
    }

    #[test]
    fn test_empty_session_has_inputs_and_floating_button_only() {
        let html = render_page(&SessionState::default(), &Feedback::default());
        assert!(html.contains("<h1>Resume Tracking Expert</h1>"));
        assert!(html.contains("Tell Me About the Resume"));
        assert!(html.contains("formaction=\"/read-aloud/last\""));
        assert!(!html.contains("<section"));
        assert!(!html.contains("uploaded successfully"));
        assert!(!html.contains("/cancel"));
    }

    #[test]
    fn test_both_slots_render_with_own_controls() {
        let state = SessionState {
            analysis_result: Some(stored("Good fit")),
            match_result: Some(stored("85%")),
            ..Default::default()
        };
        let html = render_page(&state, &Feedback::default());
        assert!(html.contains("Analysis: Tell Me About the Resume"));
        assert!(html.contains("Analysis: Percentage Match"));
        assert!(html.contains("formaction=\"/read-aloud/analysis\""));
        assert!(html.contains("formaction=\"/read-aloud/match\""));
    }

    #[test]
    fn test_model_output_is_escaped() {
        let state = SessionState {
            job_description: "</textarea><script>".into(),
            analysis_result: Some(stored("<b>bold</b> & more")),
            ..Default::default()
        };
        let html = render_page(&state, &Feedback::default());
        assert!(html.contains("&lt;b&gt;bold&lt;/b&gt; &amp; more"));
        assert!(html.contains("&lt;/textarea&gt;&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_degraded_result_is_marked() {
        let state = SessionState {
            match_result: Some(StoredResult::new(EvaluationOutcome::Degraded {
                reason: DegradeReason::QuotaExceeded,
                message: "quota".into(),
            })),
            ..Default::default()
        };
        let html = render_page(&state, &Feedback::default());
        assert!(html.contains("result degraded"));
    }

    #[test]
    fn test_audio_rendered_next_to_its_target() {
        let state = SessionState {
            analysis_result: Some(stored("Good fit")),
            last_result: Some(stored("Good fit")),
            ..Default::default()
        };
        let feedback = Feedback {
            warnings: vec![],
            audio: Some((
                ReadAloudTarget::Analysis,
                AudioPayload::mp3(Bytes::from_static(b"ID3")),
            )),
        };
        let html = render_page(&state, &feedback);

        let section_end = html.find("</section>").unwrap();
        let audio_at = html.find("<audio controls autoplay>").unwrap();
        assert!(audio_at < section_end);
        assert!(html.contains("data:audio/mpeg;base64,SUQz"));
    }

    #[test]
    fn test_upload_confirmation_and_warnings() {
        let state = SessionState {
            upload: Some(UploadedDocument::new("cv.pdf", &b"%PDF"[..])),
            ..Default::default()
        };
        let html = render_page(&state, &Feedback::warn("Please upload the resume"));
        assert!(html.contains("Your PDF uploaded successfully"));
        assert!(html.contains("cv.pdf"));
        assert!(html.contains("<div class=\"warning\">Please upload the resume</div>"));
    }

    #[test]
    fn test_read_aloud_buttons_submit_the_input_form() {
        let state = SessionState {
            analysis_result: Some(stored("Good fit")),
            ..Default::default()
        };
        let html = render_page(&state, &Feedback::default());
        assert!(html.contains("<form id=\"inputs\""));
        assert_eq!(html.matches("form=\"inputs\" formaction=\"/read-aloud/").count(), 2);
        assert_eq!(html.matches("<form").count(), 1);
    }

    #[test]
    fn test_busy_page_offers_cancel() {
        let html = render_busy_page();
        assert!(html.contains("action=\"/cancel\""));
        assert!(html.contains(PAGE_TITLE));
    }
}
