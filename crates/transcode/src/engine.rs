//! The transcoding engine seam.

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use coverreel_common::error::CoverreelResult;

/// Asynchronous notification emitted while an encode runs.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscodeEvent {
    /// Completion ratio, nominally [0.0, 1.0].
    Progress(f64),
    /// One free-text line of engine output.
    Log(String),
}

impl TranscodeEvent {
    /// Same event with any progress ratio clamped to [0.0, 1.0].
    pub fn clamped(self) -> Self {
        match self {
            Self::Progress(ratio) if ratio.is_nan() => Self::Progress(0.0),
            Self::Progress(ratio) => Self::Progress(ratio.clamp(0.0, 1.0)),
            other => other,
        }
    }
}

/// Sender half used to relay engine events.
pub type EventSender = UnboundedSender<TranscodeEvent>;

/// An initialized transcoding engine with a private file namespace.
#[async_trait]
pub trait TranscodeEngine: Send {
    /// Place `bytes` under `name` in the engine's namespace.
    async fn write_input(&mut self, name: &str, bytes: &[u8]) -> CoverreelResult<()>;

    /// Run one encode with the given argument list. Progress and log
    /// lines are sent on `events` as they arrive.
    async fn run(&mut self, args: &[String], events: &EventSender) -> CoverreelResult<()>;

    /// Read a file produced by the last run.
    async fn read_output(&mut self, name: &str) -> CoverreelResult<Vec<u8>>;

    /// Remove a file from the namespace.
    async fn delete_file(&mut self, name: &str) -> CoverreelResult<()>;

    /// Engine name for logs.
    fn name(&self) -> &str;
}

/// Creates and initializes engines.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn create(&self) -> CoverreelResult<Box<dyn TranscodeEngine>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_clamped() {
        assert_eq!(
            TranscodeEvent::Progress(1.7).clamped(),
            TranscodeEvent::Progress(1.0)
        );
        assert_eq!(
            TranscodeEvent::Progress(-0.2).clamped(),
            TranscodeEvent::Progress(0.0)
        );
        assert_eq!(
            TranscodeEvent::Progress(f64::NAN).clamped(),
            TranscodeEvent::Progress(0.0)
        );
        assert_eq!(
            TranscodeEvent::Log("frame=1".into()).clamped(),
            TranscodeEvent::Log("frame=1".into())
        );
    }
}
