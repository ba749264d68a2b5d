//! Coverreel Transcode
//!
//! Turns one still image and one audio track into an MP4 by driving an
//! external transcoding engine.
//!
//! # Pipeline Architecture
//!
//! ```text
//! cover bytes ──► write_input("input.<ext>") ──┐
//!                                              ├── run(-loop 1 … -shortest output.mp4)
//! audio bytes ──► write_input("input.<ext>") ──┘         │
//!                                                        ├── Progress / Log events
//!                                                        ▼
//!                                            read_output("output.mp4")
//!                                                        │
//!                                                        ▼
//!                                  OutputArtifact "audio-video-<timestamp>.mp4"
//! ```
//!
//! Staged files are released on every exit path.

pub mod engine;
pub mod ffmpeg;
pub mod produce;

pub use engine::*;
pub use produce::*;
