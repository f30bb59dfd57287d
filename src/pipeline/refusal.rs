//! Refusal detection: did the model decline to transcribe?
//!
//! Vision models sometimes answer a page of handwriting with "I'm sorry, I
//! can't transcribe this image." That answer is a successful HTTP response
//! but a failed transcription, so the retry loop treats it as a retryable
//! failure. Detection is heuristic and lives behind [`RefusalDetector`] so a
//! different strategy can be swapped in without touching the retry logic.

/// Decides whether a model response is a refusal.
pub trait RefusalDetector: Send + Sync {
    fn is_refusal(&self, text: &str) -> bool;
}

impl<F> RefusalDetector for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_refusal(&self, text: &str) -> bool {
        self(text)
    }
}

/// Responses shorter than this are checked against [`SHORT_RESPONSE_PHRASES`].
const SHORT_RESPONSE_LEN: usize = 100;

/// Phrases that only signal a refusal in a short response.
///
/// A long transcription may legitimately contain "I can't" or "unable to"
/// in the author's own words.
const SHORT_RESPONSE_PHRASES: &[&str] = &[
    "i'm sorry",
    "i can't",
    "i cannot",
    "unable to",
    "can't assist",
    "can't help",
    "i'm unable",
];

/// Phrases that signal a refusal at any response length.
const REFUSAL_PHRASES: &[&str] = &[
    "can't transcribe",
    "cannot transcribe",
    "unable to transcribe",
    "not able to transcribe",
    "i can't assist",
    "i cannot assist",
    "i'm unable to assist",
    "not able to assist",
    "i can't help",
    "i cannot help",
    "not able to help",
    "i'm not able to",
    "i am not able to",
    "content policy",
    "against my usage policies",
    "against my policies",
    "against my guidelines",
    "inappropriate content",
    "violates my",
];

/// The default phrase-matching detector.
///
/// A response is a refusal when any of these holds (case-insensitive):
/// 1. it contains "sorry", "transcribe" and one of "can't"/"cannot"/"unable";
/// 2. it is shorter than 100 bytes and contains a short apology phrase;
/// 3. it contains an unambiguous refusal phrase.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhraseRefusalDetector;

impl RefusalDetector for PhraseRefusalDetector {
    fn is_refusal(&self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return false;
        }
        // Curly apostrophes are common in model output.
        let lower = trimmed.to_lowercase().replace('\u{2019}', "'");

        if lower.contains("sorry")
            && lower.contains("transcribe")
            && ["can't", "cannot", "unable"].iter().any(|n| lower.contains(n))
        {
            return true;
        }

        if trimmed.len() < SHORT_RESPONSE_LEN
            && SHORT_RESPONSE_PHRASES.iter().any(|p| lower.contains(p))
        {
            return true;
        }

        REFUSAL_PHRASES.iter().any(|p| lower.contains(p))
    }
}
