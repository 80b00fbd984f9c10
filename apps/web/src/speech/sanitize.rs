use lazy_static::lazy_static;
use regex::Regex;

/// Read out instead of an empty string when nothing speakable is left.
pub const FALLBACK_SENTENCE: &str = "I am sorry, the response text cannot be read aloud.";

lazy_static! {
    static ref BULLETS: Regex = Regex::new("[•●▪▫\u{FE0F}■□▶►–\\-*]+").unwrap();
    static ref BRACKETS: Regex = Regex::new(r"[|\[\](){}/\\]+").unwrap();
    static ref NON_PRINTABLE: Regex = Regex::new(r"[^\x20-\x7E]+").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Strips markdown and symbol noise from model output so a speech engine
/// doesn't read it out. `None` and `""` both give `""`.
///
/// The result is plain printable ASCII with single spaces, and applying it
/// twice changes nothing.
pub fn sanitize(text: Option<&str>) -> String {
    match text {
        Some(text) if !text.is_empty() => sanitize_str(text),
        _ => String::new(),
    }
}

fn sanitize_str(text: &str) -> String {
    let text = BULLETS.replace_all(text, " ");
    let text = text.replace('#', "").replace("**", "").replace("__", "");
    let text = BRACKETS.replace_all(&text, " ");
    let text = NON_PRINTABLE.replace_all(&text, " ");
    let text = WHITESPACE.replace_all(&text, " ");
    text.trim().to_string()
}

/// Sanitized text, or `FALLBACK_SENTENCE` if that comes out empty.
pub fn speakable(text: &str) -> String {
    let clean = sanitize(Some(text));
    if clean.is_empty() {
        FALLBACK_SENTENCE.to_string()
    } else {
        clean
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "",
        "   ",
        "## Strengths\n\n* **Python** – 5 years\n* __Spark__ (PySpark)\n",
        "● Match: 78%\n▪️ Missing: Kubernetes, Terraform\n► Final thoughts: solid",
        "Skills | [Rust] {async} / C\\C++ — ok",
        "emoji 🚀🔥 and accents café naïve",
        "tabs\tand\r\nnewlines\u{7}bell",
        "_#_ ___# #__ *#*",
        "a - b -- c --- d",
        "⚠️ Gemini API quota exceeded for the free tier.\n\nPlease wait.",
    ];

    #[test]
    fn test_empty_and_none() {
        assert_eq!(sanitize(None), "");
        assert_eq!(sanitize(Some("")), "");
    }

    #[test]
    fn test_markdown_resume_feedback() {
        let input = "## Strengths\n\n* **Python** – 5 years\n* __Spark__ (PySpark)\n";
        assert_eq!(sanitize_str(input), "Strengths Python 5 years Spark PySpark");
    }

    #[test]
    fn test_bullet_glyphs_removed() {
        let input = "● Match: 78%\n▪️ Missing: Kubernetes\n► Done";
        assert_eq!(sanitize_str(input), "Match: 78% Missing: Kubernetes Done");
    }

    #[test]
    fn test_brackets_and_slashes_become_spaces() {
        assert_eq!(sanitize_str("CI/CD [GitHub] (Actions)|x"), "CI CD GitHub Actions x");
    }

    #[test]
    fn test_non_ascii_removed() {
        assert_eq!(sanitize_str("café 🚀 launch"), "caf launch");
    }

    #[test]
    fn test_warning_marker_is_not_spoken() {
        assert_eq!(
            sanitize_str("⚠️ Error while calling Gemini: timeout"),
            "Error while calling Gemini: timeout"
        );
    }

    #[test]
    fn test_output_is_printable_ascii_single_spaced() {
        for sample in SAMPLES {
            let out = sanitize_str(sample);
            assert!(
                out.chars().all(|c| (' '..='~').contains(&c)),
                "non-printable output for {sample:?}: {out:?}"
            );
            assert!(!out.contains("  "), "double space for {sample:?}: {out:?}");
            assert!(!out.contains('#') && !out.contains("**") && !out.contains("__"));
            assert!(!out.contains('*') && !out.contains('-'));
            assert_eq!(out, out.trim());
        }
    }

    #[test]
    fn test_idempotent() {
        for sample in SAMPLES {
            let once = sanitize_str(sample);
            assert_eq!(sanitize_str(&once), once, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn test_speakable_falls_back_on_empty() {
        assert_eq!(speakable(""), FALLBACK_SENTENCE);
        assert_eq!(speakable("   "), FALLBACK_SENTENCE);
        assert_eq!(speakable("** -- ##"), FALLBACK_SENTENCE);
        assert_eq!(speakable("Good fit."), "Good fit.");
    }
}
