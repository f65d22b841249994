//! Integrity stamping for generated answers.
//!
//! A stamp certifies "this exact text was produced at this exact time": the
//! digest covers the full answer text concatenated with the timestamp, so
//! identical answers produced at different times carry different hashes.
//! Stamps are computed once per answer, after streaming completes, never
//! per-chunk.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Hash + timestamp receipt for one generated answer.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityStamp {
    /// SHA-256 over `{text}|{timestamp}`, lowercase hex.
    pub hash: String,
    /// RFC 3339 timestamp taken at stream completion.
    pub timestamp: String,
}

impl IntegrityStamp {
    /// Stamp `full_text` at the current time.
    pub fn generate(full_text: &str) -> Self {
        Self::at(full_text, Utc::now())
    }

    /// Stamp `full_text` at an explicit instant. Deterministic for a fixed
    /// `(full_text, when)` pair.
    pub fn at(full_text: &str, when: DateTime<Utc>) -> Self {
        let timestamp = when.to_rfc3339();
        let mut hasher = Sha256::new();
        hasher.update(full_text.as_bytes());
        hasher.update(b"|");
        hasher.update(timestamp.as_bytes());
        let hash = hex::encode(hasher.finalize());
        Self { hash, timestamp }
    }

    /// Render the trailing stream chunk carrying this stamp.
    ///
    /// The fixed prefix keeps the stamp distinguishable from answer content.
    pub fn render_marker(&self) -> String {
        format!(
            "\n\n[🛡️ HASH: {} | TIMESTAMP: {}]",
            self.hash, self.timestamp
        )
    }
}
