//! Pipeline stages for receipt-to-bill extraction.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and the vision backend can be swapped without touching
//! the rest.
//!
//! ## Data Flow
//!
//! ```text
//! intake ──▶ encode ──▶ vision ──▶ normalize ──▶ deserialize
//! (checks)   (base64)   (Gemini)   (fences)      (Bill + rules)
//! ```
//!
//! 1. [`intake`] — reject uploads with the wrong extension, size or content
//! 2. [`encode`] — base64-wrap the image and build the `generateContent` body
//! 3. [`vision`] — the only stage with network I/O; one call, no retry
//! 4. [`normalize`] — pull the model text out of the envelope and strip
//!    markdown fences
//! 5. [`deserialize`] — parse the JSON into a bill draft and enforce the
//!    business rules before anything is stored

pub mod deserialize;
pub mod encode;
pub mod intake;
pub mod normalize;
pub mod vision;
