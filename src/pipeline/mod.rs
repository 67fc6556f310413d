//! Pipeline stages for one PDF-to-Word conversion.
//!
//! Each submodule implements exactly one step. Stages return values or invoke
//! callbacks; none of them touches session state, which only
//! [`crate::session::SessionController`] mutates.
//!
//! ## Data Flow
//!
//! ```text
//! validate ──▶ upload ──▶ poll ──────────▶ download
//! (local)      (POST)     (GET, repeated)  (GET, save .docx)
//! ```
//!
//! 1. [`validate`] — type and size checks; no network I/O
//! 2. [`upload`]   — single multipart submission with percentage progress
//! 3. [`poll`]     — generation-tagged loop until `COMPLETED` or `FAILED`
//! 4. [`download`] — fetch the finished document and save it atomically

pub mod download;
pub mod poll;
pub mod upload;
pub mod validate;
