//! Render a video from the stored cover and an audio file.

use std::path::PathBuf;

use coverreel_common::config::AppConfig;
use coverreel_session::{is_audio_name, AudioInput};

use super::Console;

pub async fn run(
    config: &AppConfig,
    audio: PathBuf,
    output_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let audio = AudioInput::from_path(&audio)?;
    if !is_audio_name(&audio.name) {
        println!(
            "Warning: {} does not have a known audio extension.",
            audio.name
        );
    }
    let output_dir = output_dir.unwrap_or_else(|| config.resolved_output_dir());

    let console = Console::open(config);
    println!("Audio: {} ({} bytes)", audio.name, audio.bytes.len());
    console.session.select_audio(audio).await;

    let result = console.session.produce_video().await;
    console.close().await;

    let artifact = result?;
    let path = artifact.save_to(&output_dir)?;
    println!("Video written: {}", path.display());
    println!("  Type: {}", artifact.media_type);
    println!("  Size: {} bytes", artifact.bytes.len());
    Ok(())
}
