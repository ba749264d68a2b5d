//! Timestamp utilities for naming produced artifacts.
//!
//! Artifact names embed an ISO 8601 instant truncated to whole seconds,
//! with `:` replaced so the result is safe on every filesystem.

use chrono::{DateTime, Utc};

/// Prefix carried by every produced video name.
pub const ARTIFACT_PREFIX: &str = "audio-video-";

/// Extension carried by every produced video name.
pub const ARTIFACT_EXTENSION: &str = "mp4";

/// Filesystem-safe timestamp, e.g. `2024-05-01T09-15-30`.
pub fn filesafe_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H-%M-%S").to_string()
}

/// Artifact file name for a completion at the given instant.
pub fn artifact_name_at(at: DateTime<Utc>) -> String {
    format!(
        "{ARTIFACT_PREFIX}{}.{ARTIFACT_EXTENSION}",
        filesafe_timestamp(at)
    )
}

/// Artifact file name for a completion happening now.
pub fn artifact_name_now() -> String {
    artifact_name_at(Utc::now())
}
