//! ffmpeg-backed transcoding engine.
//!
//! The engine's private namespace is a scratch directory; ffmpeg runs
//! with that directory as its working directory so staged names can be
//! referenced verbatim in the argument list.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use coverreel_common::config::EngineConfig;
use coverreel_common::error::{CoverreelError, CoverreelResult};

use crate::engine::{EngineFactory, EventSender, TranscodeEngine, TranscodeEvent};

/// Lines of stderr kept for error reports.
const LOG_TAIL_LINES: usize = 12;

/// Creates [`FfmpegEngine`]s from configuration.
#[derive(Debug, Clone)]
pub struct FfmpegEngineFactory {
    binary: PathBuf,
    scratch_dir: Option<PathBuf>,
}

impl FfmpegEngineFactory {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            binary: config.ffmpeg_path.clone(),
            scratch_dir: config.scratch_dir.clone(),
        }
    }
}

#[async_trait]
impl EngineFactory for FfmpegEngineFactory {
    async fn create(&self) -> CoverreelResult<Box<dyn TranscodeEngine>> {
        let version = probe_ffmpeg(&self.binary).await.ok_or_else(|| {
            CoverreelError::engine_init(format!(
                "{} is not runnable (expected ffmpeg in PATH)",
                self.binary.display()
            ))
        })?;

        let (scratch_dir, owns_scratch) = match &self.scratch_dir {
            Some(dir) => (dir.clone(), false),
            None => (
                std::env::temp_dir().join(format!("coverreel-engine-{}", std::process::id())),
                true,
            ),
        };
        tokio::fs::create_dir_all(&scratch_dir).await.map_err(|e| {
            CoverreelError::engine_init(format!(
                "cannot create engine workspace {}: {e}",
                scratch_dir.display()
            ))
        })?;

        tracing::info!(
            version = %version,
            workspace = %scratch_dir.display(),
            "ffmpeg engine ready"
        );

        Ok(Box::new(FfmpegEngine {
            binary: self.binary.clone(),
            scratch_dir,
            owns_scratch,
        }))
    }
}

/// An ffmpeg binary plus its private working directory.
#[derive(Debug)]
pub struct FfmpegEngine {
    binary: PathBuf,
    scratch_dir: PathBuf,
    owns_scratch: bool,
}

impl FfmpegEngine {
    /// Workspace directory acting as the engine's namespace.
    pub fn workspace(&self) -> &Path {
        &self.scratch_dir
    }

    fn entry_path(&self, name: &str) -> Option<PathBuf> {
        let single_component = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\']);
        single_component.then(|| self.scratch_dir.join(name))
    }
}

#[async_trait]
impl TranscodeEngine for FfmpegEngine {
    async fn write_input(&mut self, name: &str, bytes: &[u8]) -> CoverreelResult<()> {
        let path = self
            .entry_path(name)
            .ok_or_else(|| CoverreelError::staging(format!("invalid input name {name:?}")))?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| CoverreelError::staging(format!("failed to write {name}: {e}")))?;
        tracing::debug!(name, bytes = bytes.len(), "Staged engine input");
        Ok(())
    }

    async fn run(&mut self, args: &[String], events: &EventSender) -> CoverreelResult<()> {
        tracing::debug!(args = ?args, "Running ffmpeg");
        let mut cmd = Command::new(&self.binary);
        cmd.current_dir(&self.scratch_dir)
            .args(["-hide_banner", "-nostdin", "-nostats", "-progress", "pipe:1"])
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let start = std::time::Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|e| CoverreelError::encode(format!("Failed to start ffmpeg: {e}")))?;

        tracing::info!(pid = child.id(), args_len = args.len(), "ffmpeg process started");

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CoverreelError::encode("Failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| CoverreelError::encode("Failed to capture ffmpeg stderr"))?;

        let mut progress_lines = BufReader::new(stdout).lines();
        let mut log_lines = BufReader::new(stderr).lines();
        let mut progress = ProgressState::default();
        let mut tail: VecDeque<String> = VecDeque::with_capacity(LOG_TAIL_LINES);
        let mut stdout_open = true;
        let mut stderr_open = true;

        // Both pipes are drained in one loop so events keep arrival order
        // and ffmpeg never blocks on a full stderr pipe.
        while stdout_open || stderr_open {
            tokio::select! {
                line = progress_lines.next_line(), if stdout_open => match line {
                    Ok(Some(line)) => {
                        if let Some(ratio) = progress.update_line(&line) {
                            let _ = events.send(TranscodeEvent::Progress(ratio));
                        }
                    }
                    Ok(None) => stdout_open = false,
                    Err(e) => {
                        return Err(CoverreelError::encode(format!(
                            "Failed reading ffmpeg progress: {e}"
                        )));
                    }
                },
                line = log_lines.next_line(), if stderr_open => match line {
                    Ok(Some(line)) => {
                        progress.observe_log(&line);
                        tracing::debug!(target: "coverreel::ffmpeg", "{line}");
                        if tail.len() == LOG_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line.clone());
                        let _ = events.send(TranscodeEvent::Log(line));
                    }
                    Ok(None) => stderr_open = false,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed reading ffmpeg log output");
                        stderr_open = false;
                    }
                },
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| CoverreelError::encode(format!("Failed to wait on ffmpeg: {e}")))?;

        if !status.success() {
            let tail = tail.into_iter().collect::<Vec<_>>().join("\n");
            return Err(CoverreelError::encode(format!(
                "ffmpeg exited with {status}: {}",
                tail.trim()
            )));
        }

        tracing::info!(
            elapsed_secs = start.elapsed().as_secs_f64(),
            "ffmpeg finished"
        );
        Ok(())
    }

    async fn read_output(&mut self, name: &str) -> CoverreelResult<Vec<u8>> {
        let path = self
            .entry_path(name)
            .ok_or_else(|| CoverreelError::output_read(format!("invalid output name {name:?}")))?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| CoverreelError::output_read(format!("failed to read {name}: {e}")))
    }

    async fn delete_file(&mut self, name: &str) -> CoverreelResult<()> {
        let path = self
            .entry_path(name)
            .ok_or_else(|| CoverreelError::staging(format!("invalid file name {name:?}")))?;
        tokio::fs::remove_file(&path).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

impl Drop for FfmpegEngine {
    fn drop(&mut self) {
        if self.owns_scratch {
            let _ = std::fs::remove_dir_all(&self.scratch_dir);
        }
    }
}

/// Run `<binary> -version` and return its first line when it succeeds.
pub async fn probe_ffmpeg(binary: &Path) -> Option<String> {
    let output = Command::new(binary)
        .arg("-version")
        .stdin(Stdio::null())
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let raw = String::from_utf8_lossy(&output.stdout);
    Some(raw.lines().next().unwrap_or("ffmpeg").trim().to_string())
}

/// Running view of ffmpeg's `-progress` stream.
#[derive(Debug, Default)]
struct ProgressState {
    duration_secs: Option<f64>,
    out_time_secs: f64,
    complete: bool,
}

impl ProgressState {
    /// Feed one `key=value` progress line. Returns a ratio on every
    /// `progress=` checkpoint.
    fn update_line(&mut self, line: &str) -> Option<f64> {
        let (key, value) = line.trim().split_once('=')?;
        match key {
            // Despite the name, out_time_ms is reported in microseconds.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
                None
            }
            "progress" => {
                self.complete = value == "end";
                Some(self.ratio())
            }
            _ => None,
        }
    }

    /// Learn the longest finite input duration from a log line.
    fn observe_log(&mut self, line: &str) {
        if let Some(secs) = parse_duration_line(line) {
            if self.duration_secs.map_or(true, |d| secs > d) {
                self.duration_secs = Some(secs);
            }
        }
    }

    fn ratio(&self) -> f64 {
        if self.complete {
            return 1.0;
        }
        match self.duration_secs {
            Some(d) if d > 0.0 => (self.out_time_secs / d).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }
}

/// Parse `Duration: HH:MM:SS.ss, ...` into seconds.
fn parse_duration_line(line: &str) -> Option<f64> {
    let rest = line.trim_start().strip_prefix("Duration:")?;
    let stamp = rest.trim_start().split(',').next()?.trim();
    parse_timestamp(stamp)
}

fn parse_timestamp(stamp: &str) -> Option<f64> {
    let mut parts = stamp.splitn(3, ':');
    let hours = parts.next()?.parse::<f64>().ok()?;
    let minutes = parts.next()?.parse::<f64>().ok()?;
    let seconds = parts.next()?.parse::<f64>().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_line() {
        assert_eq!(
            parse_duration_line("  Duration: 00:03:05.50, start: 0.025057, bitrate: 192 kb/s"),
            Some(185.5)
        );
        assert_eq!(parse_duration_line("  Duration: N/A, bitrate: N/A"), None);
        assert_eq!(parse_duration_line("Stream #0:0: Audio: mp3"), None);
    }

    #[test]
    fn test_progress_uses_longest_duration() {
        let mut state = ProgressState::default();
        state.observe_log("  Duration: 00:00:00.04, start: 0.000000, bitrate: N/A");
        state.observe_log("  Duration: 00:00:10.00, start: 0.000000, bitrate: 128 kb/s");

        assert_eq!(state.update_line("out_time_us=2500000"), None);
        assert_eq!(state.update_line("progress=continue"), Some(0.25));
        state.update_line("out_time_ms=12000000");
        assert_eq!(state.update_line("progress=continue"), Some(1.0));
        assert_eq!(state.update_line("progress=end"), Some(1.0));
    }

    #[test]
    fn test_progress_without_duration_reports_zero_until_end() {
        let mut state = ProgressState::default();
        state.update_line("out_time_us=5000000");
        assert_eq!(state.update_line("progress=continue"), Some(0.0));
        assert_eq!(state.update_line("progress=end"), Some(1.0));
    }

    #[test]
    fn test_ignores_unrelated_progress_keys() {
        let mut state = ProgressState::default();
        assert_eq!(state.update_line("frame=42"), None);
        assert_eq!(state.update_line("no equals sign"), None);
        assert_eq!(state.update_line("out_time_us=N/A"), None);
    }

    #[tokio::test]
    async fn test_factory_reports_missing_binary_as_init_error() {
        let factory = FfmpegEngineFactory::new(&EngineConfig {
            ffmpeg_path: PathBuf::from("/nonexistent/coverreel/ffmpeg"),
            scratch_dir: None,
        });
        let err = factory.create().await.err().expect("creation should fail");
        assert!(matches!(err, CoverreelError::EngineInit { .. }));
    }

    #[tokio::test]
    async fn test_engine_namespace_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = FfmpegEngine {
            binary: PathBuf::from("ffmpeg"),
            scratch_dir: dir.path().to_path_buf(),
            owns_scratch: false,
        };

        engine.write_input("input.png", b"png").await.unwrap();
        assert_eq!(engine.read_output("input.png").await.unwrap(), b"png");
        engine.delete_file("input.png").await.unwrap();

        let err = engine.read_output("input.png").await.unwrap_err();
        assert!(matches!(err, CoverreelError::OutputRead { .. }));
        assert!(engine.delete_file("input.png").await.is_err());
        assert!(engine.write_input("../x", b"").await.is_err());
    }

    #[cfg(unix)]
    fn scripted_engine(dir: &Path, body: &str) -> FfmpegEngine {
        use std::os::unix::fs::PermissionsExt;

        let binary = dir.join("fake-ffmpeg.sh");
        std::fs::write(&binary, format!("#!/bin/sh\n{body}")).unwrap();
        std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();
        FfmpegEngine {
            binary,
            scratch_dir: dir.to_path_buf(),
            owns_scratch: false,
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_relays_log_and_progress_from_process() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = scripted_engine(
            dir.path(),
            "echo '  Duration: 00:00:10.00, start: 0.000000, bitrate: 128 kb/s' >&2\n\
             sleep 0.2\n\
             echo 'out_time_us=5000000'\n\
             echo 'progress=continue'\n\
             echo 'out_time_us=10000000'\n\
             echo 'progress=end'\n\
             exit 0\n",
        );
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        engine.run(&["-y".to_string()], &tx).await.unwrap();
        drop(tx);

        let mut logs = Vec::new();
        let mut ratios = Vec::new();
        while let Some(event) = rx.recv().await {
            match event {
                TranscodeEvent::Log(line) => logs.push(line),
                TranscodeEvent::Progress(ratio) => ratios.push(ratio),
            }
        }
        assert!(logs.iter().any(|l| l.contains("Duration: 00:00:10.00")));
        assert_eq!(ratios, vec![0.5, 1.0]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_maps_nonzero_exit_to_encode_with_log_tail() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = scripted_engine(
            dir.path(),
            "echo 'input.png: Invalid data found when processing input' >&2\n\
             exit 1\n",
        );
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();

        let err = engine.run(&[], &tx).await.unwrap_err();
        match err {
            CoverreelError::Encode { message } => {
                assert!(message.contains("Invalid data found when processing input"));
            }
            other => panic!("expected encode error, got {other:?}"),
        }
    }
}
