//! Prompts sent to the vision models.
//!
//! Callers can override the captioning prompt via
//! [`crate::config::CaptionConfig::prompt`]; the constants here are used
//! only when no override is provided.

/// Default instruction sent with every figure by the captioner.
pub const DEFAULT_OCR_PROMPT: &str = "Extract all text from this image.";

/// Prompt for the demo's chart placeholder.
pub const DEMO_FIGURE_PROMPT: &str =
    "Identify the primary relationship shown in this scatter plot and summarize the finding.";

/// Prompt for the demo's table placeholder.
pub const DEMO_TABLE_PROMPT: &str = "Extract the accuracy rate from the table.";
