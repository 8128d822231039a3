//! Building blocks shared by the two stages.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and the stage drivers in [`crate::extract`] and [`crate::caption`]
//! read as a sequence of calls.
//!
//! ## Data Flow
//!
//! ```text
//! extract:  scan ──▶ converter ──▶ naming ──▶ write
//!          (.pdf)   (JSON/MD/PNG)  (prefix)   (atomic)
//!
//! caption:  scan ──▶ encode ──▶ llm ──▶ postprocess ──▶ naming ──▶ write
//!          (images)  (base64)   (VLM)    (cleanup)      (stem)     (report)
//! ```
//!
//! 1. [`scan`]        — recursive, sorted directory enumeration; PDF magic check
//! 2. [`encode`]      — PNG encoding, base64, `data:` URIs
//! 3. [`llm`]         — one inference request per (image, model); never fails
//! 4. [`postprocess`] — deterministic cleanup of model text
//! 5. [`naming`]      — timestamped, collision-free output names
//! 6. [`write`]       — atomic file writes and report rendering

pub mod encode;
pub mod llm;
pub mod naming;
pub mod postprocess;
pub mod scan;
pub mod write;
