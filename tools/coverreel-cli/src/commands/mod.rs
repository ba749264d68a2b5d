//! Subcommands and the console front end they share.

pub mod bundle;
pub mod check;
pub mod image;
pub mod produce;
pub mod status;

use std::io::Write;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use coverreel_common::config::AppConfig;
use coverreel_image_store::{DirFileStore, FileStore};
use coverreel_session::{event_channel, SessionContext, SessionEvent};
use coverreel_transcode::ffmpeg::FfmpegEngineFactory;

/// A session wired to a terminal reporter.
pub struct Console {
    pub session: SessionContext,
    reporter: JoinHandle<()>,
}

impl Console {
    /// Open a session on the private file area from `config`.
    pub fn open(config: &AppConfig) -> Self {
        let store = match DirFileStore::open(&config.store_dir) {
            Ok(store) => Some(Arc::new(store) as Arc<dyn FileStore>),
            Err(e) => {
                tracing::warn!(error = %e, "Continuing without a private file area");
                None
            }
        };
        Self::with_store(config, store)
    }

    pub fn with_store(config: &AppConfig, store: Option<Arc<dyn FileStore>>) -> Self {
        let factory = Arc::new(FfmpegEngineFactory::new(&config.engine));
        let (tx, rx) = event_channel();
        let session = SessionContext::open(store, factory, config.encode.clone(), tx);
        Self {
            session,
            reporter: tokio::spawn(report(rx)),
        }
    }

    /// Drop the session and wait for the reporter to print what is left.
    pub async fn close(self) {
        drop(self.session);
        let _ = self.reporter.await;
    }
}

async fn report(mut events: UnboundedReceiver<SessionEvent>) {
    let mut progress_shown = false;
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Progress(ratio) => {
                print!("\r  Progress: {:>5.1}%  ", ratio * 100.0);
                let _ = std::io::stdout().flush();
                progress_shown = true;
            }
            SessionEvent::BusyChanged(false) if progress_shown => {
                println!();
                progress_shown = false;
            }
            SessionEvent::Status(message) => println!("{message}"),
            SessionEvent::Log(line) => tracing::trace!(target: "coverreel::engine", "{line}"),
            SessionEvent::ImageChanged(status) => {
                tracing::debug!(image = %status.label(), "Image state changed");
            }
            // Failures come back to the command as errors.
            _ => {}
        }
    }
}
