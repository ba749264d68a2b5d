//! Find a cover image and an audio track in a directory.
//!
//! A bundle directory holds `cover.<image ext>` and `audio.<audio ext>`.
//! Files with other extensions are ignored.

use std::path::{Path, PathBuf};

use coverreel_common::error::{CoverreelError, CoverreelResult};

/// Image extensions accepted for `cover.*`.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif"];

/// Audio extensions accepted for `audio.*`.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "flac", "aac", "ogg"];

/// The two inputs found in a bundle directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub cover: PathBuf,
    pub audio: PathBuf,
}

/// Locate `cover.*` and `audio.*` in `dir`.
///
/// Missing inputs are reported together in a single validation error.
pub fn discover_bundle(dir: &Path) -> CoverreelResult<Bundle> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    entries.sort();

    let cover = find_stem(&entries, "cover", IMAGE_EXTENSIONS);
    let audio = find_stem(&entries, "audio", AUDIO_EXTENSIONS);

    match (cover, audio) {
        (Some(cover), Some(audio)) => {
            tracing::debug!(cover = %cover.display(), audio = %audio.display(), "Bundle discovered");
            Ok(Bundle { cover, audio })
        }
        (cover, audio) => {
            let mut missing = Vec::new();
            if audio.is_none() {
                missing.push(format!("audio file (audio.{})", AUDIO_EXTENSIONS.join(", audio.")));
            }
            if cover.is_none() {
                missing.push(format!("image file (cover.{})", IMAGE_EXTENSIONS.join(", cover.")));
            }
            Err(CoverreelError::validation(format!(
                "Missing in {}: {}",
                dir.display(),
                missing.join("; ")
            )))
        }
    }
}

/// Whether `name` has one of the accepted image extensions.
pub fn is_image_name(name: &str) -> bool {
    has_extension(Path::new(name), IMAGE_EXTENSIONS)
}

/// Whether `name` has one of the accepted audio extensions.
pub fn is_audio_name(name: &str) -> bool {
    has_extension(Path::new(name), AUDIO_EXTENSIONS)
}

fn find_stem(entries: &[PathBuf], stem: &str, extensions: &[&str]) -> Option<PathBuf> {
    entries
        .iter()
        .find(|path| {
            path.file_stem().and_then(|s| s.to_str()) == Some(stem)
                && has_extension(path, extensions)
        })
        .cloned()
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| extensions.contains(&e.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn test_finds_cover_and_audio_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "cover.PNG");
        touch(dir.path(), "audio.flac");
        touch(dir.path(), "notes.txt");

        let bundle = discover_bundle(dir.path()).unwrap();
        assert_eq!(bundle.cover, dir.path().join("cover.PNG"));
        assert_eq!(bundle.audio, dir.path().join("audio.flac"));
    }

    #[test]
    fn test_ignores_unsupported_extensions() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "cover.psd");
        touch(dir.path(), "audio.mid");
        touch(dir.path(), "audio.wav");

        let err = discover_bundle(dir.path()).unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, CoverreelError::Validation { .. }));
        assert!(message.contains("image file"));
        assert!(!message.contains("audio file"));
    }

    #[test]
    fn test_reports_both_missing_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let message = discover_bundle(dir.path()).unwrap_err().to_string();
        assert!(message.contains("audio file"));
        assert!(message.contains("image file"));
    }

    #[test]
    fn test_extension_predicates() {
        assert!(is_image_name("Cover.JPEG"));
        assert!(!is_image_name("cover"));
        assert!(is_audio_name("track.m4a"));
        assert!(!is_audio_name("track.mp4"));
    }
}
