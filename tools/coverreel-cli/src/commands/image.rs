//! Manage the stored cover image.

use std::path::PathBuf;

use coverreel_common::config::AppConfig;
use coverreel_image_store::ImageInput;
use coverreel_session::is_image_name;

use super::Console;

pub async fn set(config: &AppConfig, path: PathBuf) -> anyhow::Result<()> {
    let image = ImageInput::from_path(&path)?;
    if !is_image_name(&image.name) {
        println!(
            "Warning: {} does not look like an image; storing it anyway.",
            image.name
        );
    }

    let console = Console::open(config);
    let result = console.session.store_image(image);
    console.close().await;

    let status = result?;
    println!("Stored cover: {}", status.label());
    Ok(())
}

pub async fn show(config: &AppConfig, export: Option<PathBuf>) -> anyhow::Result<()> {
    let console = Console::open(config);
    let result = console.session.stored_image();
    let location = console.session.store_location();
    console.close().await;

    match result? {
        Some(image) => {
            println!("Cover: {}", image.name);
            println!("  Size: {} bytes", image.bytes.len());
            if let Some(at) = image.stored_at {
                println!("  Stored: {}", at.to_rfc3339());
            }
            if let Some(location) = location {
                println!("  Location: {location}");
            }
            if let Some(path) = export {
                std::fs::write(&path, &image.bytes)?;
                println!("  Exported to: {}", path.display());
            }
        }
        None => println!("No cover image stored."),
    }
    Ok(())
}

pub async fn delete(config: &AppConfig) -> anyhow::Result<()> {
    let console = Console::open(config);
    let result = console.session.delete_image();
    console.close().await;

    result?;
    println!("Cover image deleted.");
    Ok(())
}
