//! Content-addressed cache key generation.

use sha2::{Digest, Sha256};

/// Compute the answer-cache key for a question.
///
/// The digest covers the exact question text, so identical questions map to
/// the same key across runs and processes.
pub fn question_digest(question: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(question.as_bytes());
    hex::encode(hasher.finalize())
}
