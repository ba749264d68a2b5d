//! Render `cover.*` and `audio.*` found in one directory.

use std::path::PathBuf;
use std::sync::Arc;

use coverreel_common::config::AppConfig;
use coverreel_common::error::CoverreelResult;
use coverreel_image_store::{ImageInput, MemoryFileStore};
use coverreel_session::{discover_bundle, AudioInput};

use super::Console;

pub async fn run(config: &AppConfig, dir: PathBuf, output: Option<PathBuf>) -> anyhow::Result<()> {
    println!("Working directory: {}", dir.display());
    let bundle = discover_bundle(&dir)?;
    println!("  Cover: {}", bundle.cover.display());
    println!("  Audio: {}", bundle.audio.display());

    let image = ImageInput::from_path(&bundle.cover)?;
    let audio = AudioInput::from_path(&bundle.audio)?;

    // The bundle's cover is only used for this render; the stored cover
    // in the private file area stays as it is.
    let console = Console::with_store(config, Some(Arc::new(MemoryFileStore::new())));
    let result: CoverreelResult<_> = async {
        console.session.store_image(image)?;
        console.session.select_audio(audio).await;
        console.session.produce_video().await
    }
    .await;
    console.close().await;

    let artifact = result?;
    let path = match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, &artifact.bytes)?;
            path
        }
        None => artifact.save_to(&dir)?,
    };
    println!("Video written: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use coverreel_common::config::EngineConfig;
    use coverreel_image_store::{DirFileStore, ImageStore};

    #[tokio::test]
    async fn test_bundle_leaves_stored_cover_untouched() {
        let store_dir = tempfile::tempdir().unwrap();
        let bundle_dir = tempfile::tempdir().unwrap();
        let stored = ImageStore::new(Arc::new(DirFileStore::open(store_dir.path()).unwrap()));
        stored
            .save(&ImageInput::new("saved.png", b"SAVED".to_vec()))
            .unwrap();

        std::fs::write(bundle_dir.path().join("cover.jpg"), b"BUNDLE").unwrap();
        std::fs::write(bundle_dir.path().join("audio.mp3"), b"ID3").unwrap();
        let config = AppConfig {
            store_dir: store_dir.path().to_path_buf(),
            engine: EngineConfig {
                ffmpeg_path: PathBuf::from("/nonexistent/coverreel/ffmpeg"),
                scratch_dir: None,
            },
            ..AppConfig::default()
        };

        // No engine is available, so the render itself fails.
        assert!(run(&config, bundle_dir.path().to_path_buf(), None)
            .await
            .is_err());

        let image = stored.load().unwrap().unwrap();
        assert_eq!(image.name, "saved.png");
        assert_eq!(image.bytes, b"SAVED");
    }
}
