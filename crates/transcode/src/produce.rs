//! Produce one video from a still image and an audio track.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

use coverreel_common::clock::artifact_name_now;
use coverreel_common::config::EncodeSettings;
use coverreel_common::error::{CoverreelError, CoverreelResult};

use crate::engine::{EventSender, TranscodeEngine, TranscodeEvent};

/// Extension assumed for images whose name carries none.
pub const DEFAULT_IMAGE_EXTENSION: &str = "jpg";

/// Extension assumed for audio whose name carries none.
pub const DEFAULT_AUDIO_EXTENSION: &str = "mp3";

/// Stem used for the audio input when it would collide with the image.
pub const AUDIO_COLLISION_STEM: &str = "input-audio";

/// Name of the encode output inside the engine namespace.
pub const OUTPUT_NAME: &str = "output.mp4";

/// Media type declared for produced videos.
pub const VIDEO_MEDIA_TYPE: &str = "video/mp4";

/// A named byte buffer handed to the coordinator.
#[derive(Debug, Clone, Copy)]
pub struct MediaSource<'a> {
    pub name: &'a str,
    pub bytes: &'a [u8],
}

impl<'a> MediaSource<'a> {
    pub fn new(name: &'a str, bytes: &'a [u8]) -> Self {
        Self { name, bytes }
    }
}

/// A produced video, ready to be downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    pub file_name: String,
    pub media_type: &'static str,
    pub bytes: Vec<u8>,
}

impl OutputArtifact {
    /// Write the artifact into `dir` under its suggested name.
    pub fn save_to(&self, dir: &Path) -> CoverreelResult<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

fn staged_extension(original: &str, fallback: &str) -> String {
    Path::new(original)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| fallback.to_string())
}

/// Staged input name preserving the original extension.
///
/// `pic.PNG` becomes `input.png`; a name without a usable extension
/// falls back to `input.<fallback>`.
pub fn staged_input_name(original: &str, fallback: &str) -> String {
    format!("input.{}", staged_extension(original, fallback))
}

/// Staged names for the image and audio inputs of one encode.
///
/// The two names always differ: when both sides resolve to the same
/// extension the audio is staged as `input-audio.<ext>`.
pub fn staged_names(image: &str, audio: &str) -> (String, String) {
    let image_ext = staged_extension(image, DEFAULT_IMAGE_EXTENSION);
    let audio_ext = staged_extension(audio, DEFAULT_AUDIO_EXTENSION);
    let audio_stem = if audio_ext == image_ext {
        AUDIO_COLLISION_STEM
    } else {
        "input"
    };
    (
        format!("input.{image_ext}"),
        format!("{audio_stem}.{audio_ext}"),
    )
}

/// The fixed encode argument template.
///
/// Loops the image as the video source, mixes in the audio, and stops at
/// the end of the shorter stream.
pub fn encode_args(
    settings: &EncodeSettings,
    image_name: &str,
    audio_name: &str,
    output_name: &str,
) -> Vec<String> {
    let mut args: Vec<String> = [
        "-y",
        "-loop",
        "1",
        "-i",
        image_name,
        "-i",
        audio_name,
        "-c:v",
        settings.video_codec.as_str(),
        "-tune",
        settings.tune.as_str(),
        "-c:a",
        settings.audio_codec.as_str(),
        "-b:a",
        settings.audio_bitrate.as_str(),
        "-pix_fmt",
        settings.pixel_format.as_str(),
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    if settings.pad_to_even {
        // yuv420p needs even frame dimensions.
        args.push("-vf".to_string());
        args.push("pad=ceil(iw/2)*2:ceil(ih/2)*2".to_string());
    }

    args.push("-shortest".to_string());
    args.push(output_name.to_string());
    args
}

/// Files placed in the engine namespace for one encode.
///
/// Every tracked name gets exactly one delete attempt in [`release`],
/// whatever happened in between.
///
/// [`release`]: StagedFiles::release
#[derive(Debug)]
struct StagedFiles {
    names: Vec<String>,
}

impl StagedFiles {
    fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    async fn release(self, engine: &mut dyn TranscodeEngine) {
        for name in self.names {
            if let Err(e) = engine.delete_file(&name).await {
                tracing::debug!(name = %name, error = %e, "Ignoring staged file cleanup failure");
            }
        }
    }
}

/// Produce one video on `engine`.
///
/// Progress ratios are clamped to [0.0, 1.0] and, like log lines,
/// forwarded on `events` in arrival order.
pub async fn produce_video(
    engine: &mut dyn TranscodeEngine,
    settings: &EncodeSettings,
    image: MediaSource<'_>,
    audio: MediaSource<'_>,
    events: &EventSender,
) -> CoverreelResult<OutputArtifact> {
    let (image_name, audio_name) = staged_names(image.name, audio.name);

    tracing::info!(
        engine = engine.name(),
        image = %image_name,
        image_bytes = image.bytes.len(),
        audio = %audio_name,
        audio_bytes = audio.bytes.len(),
        "Starting video production"
    );

    let staged = StagedFiles::new(vec![
        image_name.clone(),
        audio_name.clone(),
        OUTPUT_NAME.to_string(),
    ]);

    let result = encode_staged(
        engine,
        settings,
        (image_name.as_str(), image.bytes),
        (audio_name.as_str(), audio.bytes),
        events,
    )
    .await;

    staged.release(engine).await;

    match result {
        Ok(bytes) => {
            let artifact = OutputArtifact {
                file_name: artifact_name_now(),
                media_type: VIDEO_MEDIA_TYPE,
                bytes,
            };
            tracing::info!(
                file = %artifact.file_name,
                bytes = artifact.bytes.len(),
                "Video produced"
            );
            Ok(artifact)
        }
        Err(e) => {
            tracing::error!(kind = e.kind(), error = %e, "Video production failed");
            Err(e)
        }
    }
}

async fn encode_staged(
    engine: &mut dyn TranscodeEngine,
    settings: &EncodeSettings,
    (image_name, image_bytes): (&str, &[u8]),
    (audio_name, audio_bytes): (&str, &[u8]),
    events: &EventSender,
) -> CoverreelResult<Vec<u8>> {
    engine
        .write_input(image_name, image_bytes)
        .await
        .map_err(|e| recategorize(e, "staging", |m| CoverreelError::staging(m)))?;
    engine
        .write_input(audio_name, audio_bytes)
        .await
        .map_err(|e| recategorize(e, "staging", |m| CoverreelError::staging(m)))?;

    let args = encode_args(settings, image_name, audio_name, OUTPUT_NAME);

    let (engine_tx, mut engine_rx) = mpsc::unbounded_channel::<TranscodeEvent>();
    let run = async {
        let tx = engine_tx;
        engine.run(&args, &tx).await
    };
    let relay = async {
        while let Some(event) = engine_rx.recv().await {
            let _ = events.send(event.clamped());
        }
    };
    let (run_result, ()) = tokio::join!(run, relay);
    run_result.map_err(|e| recategorize(e, "encode", |m| CoverreelError::encode(m)))?;

    engine
        .read_output(OUTPUT_NAME)
        .await
        .map_err(|e| recategorize(e, "output_read", |m| {
            CoverreelError::output_read(m)
        }))
}

/// Keep errors already in `kind`; wrap anything else into it.
fn recategorize(
    err: CoverreelError,
    kind: &str,
    wrap: fn(String) -> CoverreelError,
) -> CoverreelError {
    if err.kind() == kind {
        err
    } else {
        wrap(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staged_names_keep_extension() {
        assert_eq!(staged_input_name("pic.png", "jpg"), "input.png");
        assert_eq!(staged_input_name("Song.MP3", "mp3"), "input.mp3");
        assert_eq!(staged_input_name("archive.tar.flac", "mp3"), "input.flac");
    }

    #[test]
    fn test_staged_names_fall_back_without_extension() {
        assert_eq!(staged_input_name("cover", "jpg"), "input.jpg");
        assert_eq!(staged_input_name("trailing.", "mp3"), "input.mp3");
        assert_eq!(staged_input_name(".hidden", "jpg"), "input.jpg");
        assert_eq!(staged_input_name("weird.p g", "jpg"), "input.jpg");
    }

    #[test]
    fn test_staged_names_never_collide() {
        assert_eq!(
            staged_names("pic.png", "song.mp3"),
            ("input.png".to_string(), "input.mp3".to_string())
        );
        assert_eq!(
            staged_names("cover", "track.jpg"),
            ("input.jpg".to_string(), "input-audio.jpg".to_string())
        );
        assert_eq!(
            staged_names("song.MP3", "song.mp3"),
            ("input.mp3".to_string(), "input-audio.mp3".to_string())
        );
    }

    #[test]
    fn test_encode_args_template() {
        let args = encode_args(
            &EncodeSettings::default(),
            "input.png",
            "input.mp3",
            OUTPUT_NAME,
        );
        let expected = [
            "-y",
            "-loop",
            "1",
            "-i",
            "input.png",
            "-i",
            "input.mp3",
            "-c:v",
            "libx264",
            "-tune",
            "stillimage",
            "-c:a",
            "aac",
            "-b:a",
            "192k",
            "-pix_fmt",
            "yuv420p",
            "-vf",
            "pad=ceil(iw/2)*2:ceil(ih/2)*2",
            "-shortest",
            "output.mp4",
        ];
        assert_eq!(args, expected);
    }

    #[test]
    fn test_encode_args_without_padding() {
        let settings = EncodeSettings {
            pad_to_even: false,
            audio_bitrate: "320k".to_string(),
            ..EncodeSettings::default()
        };
        let args = encode_args(&settings, "input.jpg", "input.wav", OUTPUT_NAME);
        assert!(!args.iter().any(|a| a == "-vf"));
        assert!(args.windows(2).any(|w| w[0] == "-b:a" && w[1] == "320k"));
        assert_eq!(args.last().map(String::as_str), Some("output.mp4"));
    }

    #[test]
    fn test_artifact_save_to_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = OutputArtifact {
            file_name: "audio-video-2024-01-01T00-00-00.mp4".to_string(),
            media_type: VIDEO_MEDIA_TYPE,
            bytes: vec![0, 0, 0, 24],
        };
        let path = artifact.save_to(&dir.path().join("out")).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), vec![0, 0, 0, 24]);
    }
}
