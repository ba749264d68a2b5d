//! Session context: gating state, engine memoization, and event relay.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::{Mutex, RwLock};

use coverreel_common::config::EncodeSettings;
use coverreel_common::error::{CoverreelError, CoverreelResult};
use coverreel_image_store::{FileStore, ImageInput, ImageStatus, ImageStore, StoredImage};
use coverreel_transcode::{
    produce_video, EngineFactory, MediaSource, OutputArtifact, TranscodeEngine, TranscodeEvent,
};

use crate::events::SessionEvent;

/// An audio file chosen for the next production. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioInput {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl AudioInput {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read an audio file from disk, naming it after the file.
    pub fn from_path(path: &Path) -> CoverreelResult<Self> {
        if !path.exists() {
            return Err(CoverreelError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());
        Ok(Self { name, bytes })
    }
}

/// State for one user session.
///
/// The engine handle is created lazily by [`ensure_engine`] and reused
/// for every later production. Only one production may be in flight;
/// a second trigger while busy is rejected with
/// [`CoverreelError::Busy`] and never reaches the engine.
///
/// [`ensure_engine`]: SessionContext::ensure_engine
pub struct SessionContext {
    images: Option<ImageStore>,
    factory: Arc<dyn EngineFactory>,
    settings: EncodeSettings,
    engine: Mutex<Option<Box<dyn TranscodeEngine>>>,
    audio: RwLock<Option<AudioInput>>,
    latest: RwLock<Option<OutputArtifact>>,
    image_present: AtomicBool,
    busy: AtomicBool,
    events: UnboundedSender<SessionEvent>,
}

impl SessionContext {
    /// Open a session. `store` is `None` when the private file area is
    /// unavailable; the session then works without image persistence.
    pub fn open(
        store: Option<Arc<dyn FileStore>>,
        factory: Arc<dyn EngineFactory>,
        settings: EncodeSettings,
        events: UnboundedSender<SessionEvent>,
    ) -> Self {
        let images = store.map(ImageStore::new);
        let status = match &images {
            Some(images) => images.status().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Could not read stored image");
                let _ = events.send(SessionEvent::Failed {
                    kind: e.kind(),
                    message: format!("Could not read stored image: {e}"),
                });
                ImageStatus::absent()
            }),
            None => {
                tracing::warn!("Private file area unavailable; images will not be saved");
                ImageStatus::absent()
            }
        };

        let session = Self {
            images,
            factory,
            settings,
            engine: Mutex::new(None),
            audio: RwLock::new(None),
            latest: RwLock::new(None),
            image_present: AtomicBool::new(status.present),
            busy: AtomicBool::new(false),
            events,
        };
        session.emit(SessionEvent::ImageChanged(status));
        session
    }

    /// Persist a newly picked cover image.
    pub fn store_image(&self, image: ImageInput) -> CoverreelResult<ImageStatus> {
        let result = self.image_store().and_then(|store| store.save(&image));
        match result {
            Ok(stored) => {
                let status = ImageStatus::of(&stored);
                self.image_present.store(true, Ordering::Release);
                self.emit(SessionEvent::ImageChanged(status.clone()));
                Ok(status)
            }
            Err(e) => Err(self.report("Saving image failed", e)),
        }
    }

    /// Remove the stored cover image.
    pub fn delete_image(&self) -> CoverreelResult<()> {
        match self.image_store().and_then(|store| store.delete()) {
            Ok(()) => {
                self.image_present.store(false, Ordering::Release);
                self.emit(SessionEvent::ImageChanged(ImageStatus::absent()));
                Ok(())
            }
            Err(e) => Err(self.report("Deleting image failed", e)),
        }
    }

    /// The stored cover image, if any.
    pub fn stored_image(&self) -> CoverreelResult<Option<StoredImage>> {
        self.image_store()?
            .load()
            .map_err(|e| self.report("Loading image failed", e))
    }

    /// Where stored images live, if persistence is available.
    pub fn store_location(&self) -> Option<String> {
        self.images.as_ref().map(ImageStore::location)
    }

    /// Choose the audio for the next production.
    pub async fn select_audio(&self, audio: AudioInput) {
        tracing::info!(name = %audio.name, bytes = audio.bytes.len(), "Audio selected");
        let name = audio.name.clone();
        *self.audio.write().await = Some(audio);
        self.emit(SessionEvent::AudioChanged(Some(name)));
    }

    /// Forget the selected audio.
    pub async fn clear_audio(&self) {
        *self.audio.write().await = None;
        self.emit(SessionEvent::AudioChanged(None));
    }

    pub fn image_present(&self) -> bool {
        self.image_present.load(Ordering::Acquire)
    }

    pub async fn audio_selected(&self) -> bool {
        self.audio.read().await.is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Whether the produce action should currently be enabled.
    pub async fn can_produce(&self) -> bool {
        self.image_present() && self.audio_selected().await && !self.is_busy()
    }

    /// Latest produced artifact of this session.
    pub async fn latest_artifact(&self) -> Option<OutputArtifact> {
        self.latest.read().await.clone()
    }

    /// Create and initialize the engine on first use. A failed
    /// initialization is not remembered, so the next call retries.
    pub async fn ensure_engine(&self) -> CoverreelResult<()> {
        let mut slot = self.engine.lock().await;
        self.ensure_engine_in(&mut slot).await.map(|_| ())
    }

    /// Produce a video from the stored cover and the selected audio.
    pub async fn produce_video(&self) -> CoverreelResult<OutputArtifact> {
        let mut guard = match BusyGuard::acquire(&self.busy, &self.events) {
            Some(guard) => guard,
            None => {
                tracing::warn!("Ignoring produce request while another is in flight");
                return Err(CoverreelError::Busy);
            }
        };

        let (image, audio) = match self.validated_inputs().await {
            Ok(inputs) => inputs,
            Err(e) => {
                tracing::info!(reason = %e, "Produce request rejected");
                self.emit(SessionEvent::Failed {
                    kind: e.kind(),
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        guard.announce();
        self.emit(SessionEvent::Status("Producing video...".to_string()));

        match self.run_production(&image, &audio).await {
            Ok(artifact) => {
                self.emit(SessionEvent::Completed {
                    file_name: artifact.file_name.clone(),
                    bytes: artifact.bytes.len(),
                });
                *self.latest.write().await = Some(artifact.clone());
                Ok(artifact)
            }
            Err(e) => {
                self.emit(SessionEvent::Failed {
                    kind: e.kind(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn validated_inputs(&self) -> CoverreelResult<(StoredImage, AudioInput)> {
        if !self.image_present() {
            return Err(CoverreelError::validation(
                "No image stored. Pick an image first.",
            ));
        }
        let Some(audio) = self.audio.read().await.clone() else {
            return Err(CoverreelError::validation("Choose an audio file first."));
        };

        let image = match self.image_store()?.load() {
            Ok(Some(image)) => image,
            Ok(None) => {
                self.image_present.store(false, Ordering::Release);
                self.emit(SessionEvent::ImageChanged(ImageStatus::absent()));
                return Err(CoverreelError::validation(
                    "No image stored. Pick an image first.",
                ));
            }
            Err(e) => return Err(self.report("Loading image failed", e)),
        };
        Ok((image, audio))
    }

    async fn run_production(
        &self,
        image: &StoredImage,
        audio: &AudioInput,
    ) -> CoverreelResult<OutputArtifact> {
        let mut slot = self.engine.lock().await;
        let engine = self.ensure_engine_in(&mut slot).await?;

        let (tx, mut rx) = mpsc::unbounded_channel::<TranscodeEvent>();
        let produce = async {
            let tx = tx;
            produce_video(
                &mut **engine,
                &self.settings,
                MediaSource::new(&image.name, &image.bytes),
                MediaSource::new(&audio.name, &audio.bytes),
                &tx,
            )
            .await
        };
        let relay = async {
            while let Some(event) = rx.recv().await {
                self.emit(match event {
                    TranscodeEvent::Progress(ratio) => SessionEvent::Progress(ratio),
                    TranscodeEvent::Log(line) => SessionEvent::Log(line),
                });
            }
        };
        let (result, ()) = tokio::join!(produce, relay);
        result
    }

    async fn ensure_engine_in<'a>(
        &self,
        slot: &'a mut Option<Box<dyn TranscodeEngine>>,
    ) -> CoverreelResult<&'a mut Box<dyn TranscodeEngine>> {
        if slot.is_none() {
            tracing::info!("Initializing transcoding engine");
            self.emit(SessionEvent::Status("Loading transcoding engine...".to_string()));
            let engine = self.factory.create().await.map_err(|e| {
                let e = match e {
                    e @ CoverreelError::EngineInit { .. } => e,
                    other => CoverreelError::engine_init(other.to_string()),
                };
                tracing::error!(error = %e, "Engine initialization failed");
                e
            })?;
            *slot = Some(engine);
        }
        slot.as_mut()
            .ok_or_else(|| CoverreelError::engine_init("engine unavailable"))
    }

    fn image_store(&self) -> CoverreelResult<&ImageStore> {
        self.images.as_ref().ok_or_else(|| {
            CoverreelError::store_unsupported("private file area is not available")
        })
    }

    /// Log a store failure and surface it to the front end.
    fn report(&self, context: &str, err: CoverreelError) -> CoverreelError {
        tracing::warn!(kind = err.kind(), error = %err, "{context}");
        self.emit(SessionEvent::Failed {
            kind: err.kind(),
            message: format!("{context}: {err}"),
        });
        err
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

/// Holds the busy flag for one production; clears it on every exit path.
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
    events: &'a UnboundedSender<SessionEvent>,
    announced: bool,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool, events: &'a UnboundedSender<SessionEvent>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                flag,
                events,
                announced: false,
            })
    }

    fn announce(&mut self) {
        self.announced = true;
        let _ = self.events.send(SessionEvent::BusyChanged(true));
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        if self.announced {
            let _ = self.events.send(SessionEvent::BusyChanged(false));
        }
    }
}
