//! Check that the transcoding engine can be started.

use coverreel_common::config::AppConfig;
use coverreel_transcode::ffmpeg::probe_ffmpeg;

pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Coverreel System Check");
    println!("{}", "=".repeat(50));

    let binary = &config.engine.ffmpeg_path;
    let engine_ok = match probe_ffmpeg(binary).await {
        Some(version) => {
            println!("[OK] Engine: {version}");
            true
        }
        None => {
            println!("[FAIL] Engine: {} not runnable", binary.display());
            println!("       Install ffmpeg or set engine.ffmpeg_path in the config file.");
            false
        }
    };

    match coverreel_image_store::DirFileStore::open(&config.store_dir) {
        Ok(store) => println!("[OK] Private file area: {}", store.root().display()),
        Err(e) => println!("[WARN] Private file area: {e} (covers will not be saved)"),
    }

    println!(
        "[OK] Encode template: {} / {} @ {}, {}",
        config.encode.video_codec,
        config.encode.audio_codec,
        config.encode.audio_bitrate,
        config.encode.pixel_format
    );

    println!();
    if engine_ok {
        println!("All required capabilities are available. Coverreel is ready.");
    } else {
        println!("The transcoding engine is missing. See above for fixes.");
    }

    Ok(())
}
