//! Content-addressed identifiers for batches and topics.
//!
//! Identifiers are SHA-256 digests of the window bounds (and the topic name),
//! so re-running over an identical window converges on the same records
//! instead of duplicating them.

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

fn render(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn digest(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// `H(start, end)`: the identifier of the batch for a window.
pub fn batch_id(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    digest(&format!("{}-{}", render(start), render(end)))
}

/// `H(name, start, end)`: the identifier of a topic within a window.
pub fn topic_id(name: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    digest(&format!("{}-{}-{}", name, render(start), render(end)))
}
