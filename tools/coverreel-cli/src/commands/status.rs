//! Show session state.

use std::path::Path;

use coverreel_common::config::AppConfig;
use coverreel_image_store::ImageStatus;
use coverreel_transcode::ffmpeg::probe_ffmpeg;

use super::Console;

pub async fn run(config: &AppConfig, config_path: &Path) -> anyhow::Result<()> {
    let console = Console::open(config);
    let image = console.session.stored_image();
    let location = console.session.store_location();
    console.close().await;

    println!("Coverreel");
    println!("  Config: {}", config_path.display());
    match location {
        Some(location) => println!("  Store: {location}"),
        None => println!("  Store: unavailable"),
    }
    match probe_ffmpeg(&config.engine.ffmpeg_path).await {
        Some(version) => println!("  Engine: {version}"),
        None => println!("  Engine: not found ({})", config.engine.ffmpeg_path.display()),
    }

    let status = match image {
        Ok(Some(image)) => ImageStatus::of(&image),
        Ok(None) => ImageStatus::absent(),
        Err(e) => {
            println!("  Cover: unreadable ({e})");
            return Ok(());
        }
    };
    println!("  Cover: {}", status.label());
    println!(
        "  Ready to produce: {}",
        if status.present {
            "yes (pass --audio to `coverreel produce`)"
        } else {
            "no (run `coverreel image set <PATH>` first)"
        }
    );
    println!(
        "  Output directory: {}",
        config.resolved_output_dir().display()
    );

    Ok(())
}
