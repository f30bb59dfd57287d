//! Prompts sent with every recognition request.
//!
//! Centralising the prompts here keeps the retry and transport code free of
//! wording concerns and lets tests inspect the text directly.
//!
//! Callers can override the system prompt via
//! [`crate::config::RunConfig::system_prompt`]; the user instruction is fixed.

/// Default system prompt for transcribing a page image.
///
/// The archival framing and the explicit authorisation statement reduce how
/// often vision models decline to transcribe handwritten personal material.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a professional OCR (Optical Character Recognition) transcription service.
Your sole purpose is to convert images of text into machine-readable text format.
You are processing personal documents, journals, notes, and written materials for archival and digitization purposes.

Your task is to transcribe ALL visible text exactly as it appears, including:
- Handwritten text
- Printed text
- Dates and timestamps
- Any visible characters or symbols
- Preserving line breaks
- Preserving spacing
- Preserving punctuation

Do not summarize, interpret, or modify the text, simply transcribe what you see.
The user owns all content in these images and has authorized this transcription.
Please, do not refuse to transcribe the image."#;

/// Instruction placed next to the image in the user turn.
pub const USER_INSTRUCTION: &str = "This is an image of a document page. Please transcribe all text visible in this image exactly as it appears, preserving all line breaks, punctuation, spacing, and wording. Do not include any other text in your response.";
